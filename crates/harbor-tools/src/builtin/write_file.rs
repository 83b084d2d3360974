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

pub struct WriteFileTool {
    pub ws: Arc<Workspace>,
}

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Writes a file, overwriting any existing content at the path. ALWAYS \
         prefer editing existing files with edit_file. Creates parent \
         directories automatically. Under dry-run the write is previewed and \
         nothing touches disk."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Absolute or workspace-relative path to the file"
                },
                "content": {
                    "type": "string",
                    "description": "Content to write to the file"
                }
            },
            "required": ["path", "content"]
        })
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::WriteFs
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
        let content = match call.args.get("content").and_then(|v| v.as_str()) {
            Some(c) => c.to_string(),
            None => {
                let args_preview =
                    serde_json::to_string(&call.args).unwrap_or_else(|_| "null".to_string());
                return ToolOutput::err(
                    &call.id,
                    format!("missing required parameter 'content'. Received: {args_preview}"),
                );
            }
        };

        let resolved = self.ws.resolve(&path);
        let lines = content.lines().count();
        debug!(path = %resolved.display(), bytes = content.len(), "write_file tool");

        if self.ws.dry_run() {
            return ToolOutput::ok(
                &call.id,
                json!({
                    "dryRun": true,
                    "path": path,
                    "lines": lines,
                    "bytes": content.len(),
                }),
            );
        }

        if let Some(parent) = resolved.parent() {
            if !parent.as_os_str().is_empty() {
                let _ = tokio::fs::create_dir_all(parent).await;
            }
        }

        match tokio::fs::write(&resolved, &content).await {
            Ok(_) => ToolOutput::ok(
                &call.id,
                json!({
                    "path": path,
                    "lines": lines,
                    "bytes": content.len(),
                }),
            ),
            Err(e) => ToolOutput::err(&call.id, format!("write error: {e}")),
        }
    }
}

pub struct CreateDirectoryTool {
    pub ws: Arc<Workspace>,
}

#[async_trait]
impl Tool for CreateDirectoryTool {
    fn name(&self) -> &str {
        "create_directory"
    }

    fn description(&self) -> &str {
        "Create a directory, including missing parents. Succeeds if the \
         directory already exists."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Absolute or workspace-relative directory path"
                }
            },
            "required": ["path"]
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

        let resolved = self.ws.resolve(&path);
        debug!(path = %resolved.display(), "create_directory tool");

        if self.ws.dry_run() {
            return ToolOutput::ok(&call.id, json!({ "dryRun": true, "path": path }));
        }

        match tokio::fs::create_dir_all(&resolved).await {
            Ok(_) => ToolOutput::ok(&call.id, json!({ "path": path, "created": true })),
            Err(e) => ToolOutput::err(&call.id, format!("mkdir error: {e}")),
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn setup() -> (tempfile::TempDir, Arc<Workspace>) {
        let dir = tempfile::tempdir().unwrap();
        let ws = Arc::new(Workspace::new(dir.path()));
        (dir, ws)
    }

    fn call(args: serde_json::Value) -> ToolCall {
        ToolCall {
            id: "w1".into(),
            name: "write_file".into(),
            args,
        }
    }

    #[tokio::test]
    async fn write_creates_file_and_reports_lines() {
        let (dir, ws) = setup();
        let t = WriteFileTool { ws };
        let out = t
            .execute(&call(json!({"path": "a.txt", "content": "one\ntwo\nthree\n"})))
            .await;
        assert!(!out.is_error, "{}", out.content());
        assert_eq!(out.value["lines"], json!(3));
        assert_eq!(
            std::fs::read_to_string(dir.path().join("a.txt")).unwrap(),
            "one\ntwo\nthree\n"
        );
    }

    #[tokio::test]
    async fn write_creates_parent_dirs() {
        let (dir, ws) = setup();
        let t = WriteFileTool { ws };
        let out = t
            .execute(&call(json!({"path": "sub/deep/file.txt", "content": "nested"})))
            .await;
        assert!(!out.is_error);
        assert!(dir.path().join("sub/deep/file.txt").exists());
    }

    #[tokio::test]
    async fn dry_run_previews_without_touching_disk() {
        let (dir, ws) = setup();
        ws.set_dry_run(true);
        let t = WriteFileTool { ws };
        let out = t
            .execute(&call(json!({"path": "src/a.ts", "content": "a\nb\nc"})))
            .await;
        assert!(!out.is_error);
        assert_eq!(out.value["dryRun"], json!(true));
        assert_eq!(out.value["lines"], json!(3));
        assert!(!dir.path().join("src/a.ts").exists(), "file must not exist");
    }

    #[tokio::test]
    async fn missing_content_is_error_without_side_effect() {
        let (dir, ws) = setup();
        let t = WriteFileTool { ws };
        let out = t.execute(&call(json!({"path": "a.txt"}))).await;
        assert!(out.is_error);
        assert!(out.message().unwrap().contains("'content'"));
        assert!(!dir.path().join("a.txt").exists());
    }

    #[tokio::test]
    async fn create_directory_is_idempotent() {
        let (dir, ws) = setup();
        let t = CreateDirectoryTool { ws };
        let args = json!({"path": "x/y"});
        let first = t
            .execute(&ToolCall {
                id: "c1".into(),
                name: "create_directory".into(),
                args: args.clone(),
            })
            .await;
        assert!(!first.is_error);
        let second = t
            .execute(&ToolCall {
                id: "c2".into(),
                name: "create_directory".into(),
                args,
            })
            .await;
        assert!(!second.is_error);
        assert!(dir.path().join("x/y").is_dir());
    }

    #[tokio::test]
    async fn create_directory_dry_run_creates_nothing() {
        let (dir, ws) = setup();
        ws.set_dry_run(true);
        let t = CreateDirectoryTool { ws };
        let out = t
            .execute(&ToolCall {
                id: "c1".into(),
                name: "create_directory".into(),
                args: json!({"path": "ghost"}),
            })
            .await;
        assert!(!out.is_error);
        assert_eq!(out.value["dryRun"], json!(true));
        assert!(!dir.path().join("ghost").exists());
    }
}
