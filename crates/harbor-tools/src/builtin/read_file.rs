use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use harbor_config::ToolCategory;

use crate::tool::{Tool, ToolCall, ToolOutput};
use crate::workspace::Workspace;

const READ_LIMIT: usize = 200_000;

pub struct ReadFileTool {
    pub ws: Arc<Workspace>,
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Reads a file from the workspace. Optionally pass a 1-indexed inclusive \
         line range (start_line/end_line) for large files. The result reports \
         both the number of lines returned and the total line count of the file. \
         Reading a file that does not exist returns an error."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Absolute or workspace-relative path to the file"
                },
                "start_line": {
                    "type": "integer",
                    "description": "1-indexed first line to return (default 1)"
                },
                "end_line": {
                    "type": "integer",
                    "description": "1-indexed last line to return, inclusive (default: end of file)"
                }
            },
            "required": ["path"]
        })
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::ReadOnly
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let path = match call.args.get("path").and_then(|v| v.as_str()) {
            Some(p) => p.to_string(),
            None => {
                let args_preview =
                    serde_json::to_string(&call.args).unwrap_or_else(|_| "null".to_string());
                return ToolOutput::err(
                    &call.id,
                    format!("missing required parameter 'path'. Received: {args_preview}"),
                );
            }
        };
        let start = call
            .args
            .get("start_line")
            .and_then(|v| v.as_u64())
            .unwrap_or(1) as usize;
        let end = call.args.get("end_line").and_then(|v| v.as_u64());

        if start == 0 {
            return ToolOutput::err(&call.id, "start_line is 1-indexed; 0 is not a valid line");
        }

        let resolved = self.ws.resolve(&path);
        debug!(path = %resolved.display(), start, "read_file tool");

        match tokio::fs::read(&resolved).await {
            Ok(bytes) => {
                let text = String::from_utf8_lossy(&bytes);
                let capped = if text.len() > READ_LIMIT {
                    format!(
                        "{}...[file truncated at {} bytes]",
                        &text[..READ_LIMIT],
                        text.len()
                    )
                } else {
                    text.to_string()
                };

                let lines: Vec<&str> = capped.lines().collect();
                let total = lines.len();
                let end = end.map(|e| e as usize).unwrap_or(total).min(total);

                if start > total && total > 0 {
                    return ToolOutput::err(
                        &call.id,
                        format!("start_line {start} is past the end of the file ({total} lines)"),
                    );
                }

                let slice: Vec<&str> = lines
                    .into_iter()
                    .skip(start - 1)
                    .take(end.saturating_sub(start - 1))
                    .collect();

                ToolOutput::ok(
                    &call.id,
                    json!({
                        "path": path,
                        "content": slice.join("\n"),
                        "lines": slice.len(),
                        "totalLines": total,
                    }),
                )
            }
            Err(e) => ToolOutput::err(&call.id, format!("read error: {e}")),
        }
    }
}

pub struct ReadMultipleFilesTool {
    pub ws: Arc<Workspace>,
}

#[async_trait]
impl Tool for ReadMultipleFilesTool {
    fn name(&self) -> &str {
        "read_multiple_files"
    }

    fn description(&self) -> &str {
        "Reads several files in one call. Files that cannot be read are \
         reported individually; one bad path does not fail the whole call."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "paths": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Paths to read, absolute or workspace-relative"
                }
            },
            "required": ["paths"]
        })
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::ReadOnly
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let paths: Vec<String> = match call.args.get("paths").and_then(|v| v.as_array()) {
            Some(arr) => arr
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            None => {
                return ToolOutput::err(&call.id, "missing required parameter 'paths' (array of strings)");
            }
        };
        if paths.is_empty() {
            return ToolOutput::err(&call.id, "'paths' must contain at least one entry");
        }

        debug!(count = paths.len(), "read_multiple_files tool");

        let mut files = Vec::with_capacity(paths.len());
        for path in &paths {
            let resolved = self.ws.resolve(path);
            match tokio::fs::read_to_string(&resolved).await {
                Ok(text) => files.push(json!({
                    "path": path,
                    "content": text,
                    "lines": text.lines().count(),
                })),
                Err(e) => files.push(json!({
                    "path": path,
                    "error": format!("read error: {e}"),
                })),
            }
        }

        ToolOutput::ok(&call.id, json!({ "files": files, "count": paths.len() }))
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
