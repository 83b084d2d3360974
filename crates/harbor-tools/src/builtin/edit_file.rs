// Copyright (c) 2024-2026 Harbor Contributors
//
// SPDX-License-Identifier: MIT
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use harbor_config::ToolCategory;

use crate::tool::{Tool, ToolCall, ToolOutput};
use crate::workspace::Workspace;

/// Search-and-replace editor.  The search text must be unique in the file
/// unless `replace_all` is set — an ambiguous match is an error, not a guess.
pub struct EditFileTool {
    pub ws: Arc<Workspace>,
}

#[async_trait]
impl Tool for EditFileTool {
    fn name(&self) -> &str {
        "edit_file"
    }

    fn description(&self) -> &str {
        "Replace text in a file. 'search' must match exactly once unless \
         replace_all is true. Include enough surrounding context in 'search' \
         to make it unique. Under dry-run the edit is previewed and the file \
         is untouched."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Absolute or workspace-relative path to the file"
                },
                "search": {
                    "type": "string",
                    "description": "Exact text to find"
                },
                "replace": {
                    "type": "string",
                    "description": "Replacement text"
                },
                "replace_all": {
                    "type": "boolean",
                    "description": "Replace every occurrence instead of requiring a unique match (default false)"
                }
            },
            "required": ["path", "search", "replace"]
        })
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::WriteFs
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let path = match call.args.get("path").and_then(|v| v.as_str()) {
            Some(p) => p.to_string(),
            None => return ToolOutput::err(&call.id, "missing required parameter 'path'"),
        };
        let search = match call.args.get("search").and_then(|v| v.as_str()) {
            Some(s) if !s.is_empty() => s.to_string(),
            Some(_) => return ToolOutput::err(&call.id, "'search' must not be empty"),
            None => return ToolOutput::err(&call.id, "missing required parameter 'search'"),
        };
        let replace = match call.args.get("replace").and_then(|v| v.as_str()) {
            Some(r) => r.to_string(),
            None => return ToolOutput::err(&call.id, "missing required parameter 'replace'"),
        };
        let replace_all = call
            .args
            .get("replace_all")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);

        let resolved = self.ws.resolve(&path);
        debug!(path = %resolved.display(), replace_all, "edit_file tool");

        let text = match tokio::fs::read_to_string(&resolved).await {
            Ok(t) => t,
            Err(e) => return ToolOutput::err(&call.id, format!("read error: {e}")),
        };

        let matches = text.matches(&search).count();
        if matches == 0 {
            return ToolOutput::err(&call.id, format!("search text not found in {path}"));
        }
        if matches > 1 && !replace_all {
            return ToolOutput::err(
                &call.id,
                format!(
                    "search text occurs {matches} times in {path}; add more context to make \
                     it unique, or set replace_all=true"
                ),
            );
        }

        let replacements = if replace_all { matches } else { 1 };

        if self.ws.dry_run() {
            return ToolOutput::ok(
                &call.id,
                json!({
                    "dryRun": true,
                    "path": path,
                    "replacements": replacements,
                }),
            );
        }

        let updated = if replace_all {
            text.replace(&search, &replace)
        } else {
            text.replacen(&search, &replace, 1)
        };

        match tokio::fs::write(&resolved, &updated).await {
            Ok(_) => ToolOutput::ok(
                &call.id,
                json!({ "path": path, "replacements": replacements }),
            ),
            Err(e) => ToolOutput::err(&call.id, format!("write error: {e}")),
        }
    }
}

/// Replace a 1-indexed inclusive line range with new content.
pub struct EditLinesTool {
    pub ws: Arc<Workspace>,
}

#[async_trait]
impl Tool for EditLinesTool {
    fn name(&self) -> &str {
        "edit_lines"
    }

    fn description(&self) -> &str {
        "Replace a 1-indexed inclusive line range with new content. The new \
         content may have a different number of lines than the range it \
         replaces."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "File to edit" },
                "start_line": { "type": "integer", "description": "First line to replace (1-indexed)" },
                "end_line": { "type": "integer", "description": "Last line to replace, inclusive" },
                "content": { "type": "string", "description": "Replacement lines" }
            },
            "required": ["path", "start_line", "end_line", "content"]
        })
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::WriteFs
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let path = match call.args.get("path").and_then(|v| v.as_str()) {
            Some(p) => p.to_string(),
            None => return ToolOutput::err(&call.id, "missing required parameter 'path'"),
        };
        let start = match call.args.get("start_line").and_then(|v| v.as_u64()) {
            Some(n) if n >= 1 => n as usize,
            _ => return ToolOutput::err(&call.id, "'start_line' must be an integer >= 1"),
        };
        let end = match call.args.get("end_line").and_then(|v| v.as_u64()) {
            Some(n) if n as usize >= start => n as usize,
            _ => return ToolOutput::err(&call.id, "'end_line' must be an integer >= start_line"),
        };
        let content = match call.args.get("content").and_then(|v| v.as_str()) {
            Some(c) => c.to_string(),
            None => return ToolOutput::err(&call.id, "missing required parameter 'content'"),
        };

        let resolved = self.ws.resolve(&path);
        debug!(path = %resolved.display(), start, end, "edit_lines tool");

        let text = match tokio::fs::read_to_string(&resolved).await {
            Ok(t) => t,
            Err(e) => return ToolOutput::err(&call.id, format!("read error: {e}")),
        };
        let lines: Vec<&str> = text.lines().collect();
        if end > lines.len() {
            return ToolOutput::err(
                &call.id,
                format!("end_line {end} is past the end of the file ({} lines)", lines.len()),
            );
        }

        let replaced = end - start + 1;

        if self.ws.dry_run() {
            return ToolOutput::ok(
                &call.id,
                json!({
                    "dryRun": true,
                    "path": path,
                    "replacedLines": replaced,
                    "newLines": content.lines().count(),
                }),
            );
        }

        let mut updated: Vec<&str> = Vec::with_capacity(lines.len());
        updated.extend(&lines[..start - 1]);
        updated.extend(content.lines());
        updated.extend(&lines[end..]);
        let mut body = updated.join("\n");
        if text.ends_with('\n') {
            body.push('\n');
        }

        match tokio::fs::write(&resolved, &body).await {
            Ok(_) => ToolOutput::ok(
                &call.id,
                json!({
                    "path": path,
                    "replacedLines": replaced,
                    "newLines": content.lines().count(),
                }),
            ),
            Err(e) => ToolOutput::err(&call.id, format!("write error: {e}")),
        }
    }
}

/// Insert content before a 1-indexed line; `line = len + 1` appends.
pub struct InsertAtLineTool {
    pub ws: Arc<Workspace>,
}

#[async_trait]
impl Tool for InsertAtLineTool {
    fn name(&self) -> &str {
        "insert_at_line"
    }

    fn description(&self) -> &str {
        "Insert content before the given 1-indexed line. Passing one past the \
         last line appends to the end of the file."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": { "type": "string", "description": "File to edit" },
                "line": { "type": "integer", "description": "1-indexed insertion point" },
                "content": { "type": "string", "description": "Lines to insert" }
            },
            "required": ["path", "line", "content"]
        })
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::WriteFs
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let path = match call.args.get("path").and_then(|v| v.as_str()) {
            Some(p) => p.to_string(),
            None => return ToolOutput::err(&call.id, "missing required parameter 'path'"),
        };
        let line = match call.args.get("line").and_then(|v| v.as_u64()) {
            Some(n) if n >= 1 => n as usize,
            _ => return ToolOutput::err(&call.id, "'line' must be an integer >= 1"),
        };
        let content = match call.args.get("content").and_then(|v| v.as_str()) {
            Some(c) => c.to_string(),
            None => return ToolOutput::err(&call.id, "missing required parameter 'content'"),
        };

        let resolved = self.ws.resolve(&path);
        debug!(path = %resolved.display(), line, "insert_at_line tool");

        let text = match tokio::fs::read_to_string(&resolved).await {
            Ok(t) => t,
            Err(e) => return ToolOutput::err(&call.id, format!("read error: {e}")),
        };
        let lines: Vec<&str> = text.lines().collect();
        if line > lines.len() + 1 {
            return ToolOutput::err(
                &call.id,
                format!(
                    "line {line} is past the end of the file ({} lines); use {} to append",
                    lines.len(),
                    lines.len() + 1
                ),
            );
        }

        if self.ws.dry_run() {
            return ToolOutput::ok(
                &call.id,
                json!({
                    "dryRun": true,
                    "path": path,
                    "line": line,
                    "insertedLines": content.lines().count(),
                }),
            );
        }

        let mut updated: Vec<&str> = Vec::with_capacity(lines.len() + 1);
        updated.extend(&lines[..line - 1]);
        updated.extend(content.lines());
        updated.extend(&lines[line - 1..]);
        let mut body = updated.join("\n");
        if text.ends_with('\n') || text.is_empty() {
            body.push('\n');
        }

        match tokio::fs::write(&resolved, &body).await {
            Ok(_) => ToolOutput::ok(
                &call.id,
                json!({
                    "path": path,
                    "line": line,
                    "insertedLines": content.lines().count(),
                }),
            ),
            Err(e) => ToolOutput::err(&call.id, format!("write error: {e}")),
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
