// Copyright (c) 2024-2026 Harbor Contributors
//
// SPDX-License-Identifier: MIT
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::process::Command;
use tracing::debug;

use harbor_config::ToolCategory;

use crate::tool::{Tool, ToolCall, ToolOutput};
use crate::workspace::Workspace;

pub struct DeleteFileTool {
    pub ws: Arc<Workspace>,
}

#[async_trait]
impl Tool for DeleteFileTool {
    fn name(&self) -> &str {
        "delete_file"
    }

    fn description(&self) -> &str {
        "Delete a file or directory. Directories are removed recursively. \
         Permanent — no recovery. NEVER delete without explicit user request."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Absolute or workspace-relative path to delete"
                }
            },
            "required": ["path"],
            "additionalProperties": false
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

        let resolved = self.ws.resolve(&path);
        debug!(path = %resolved.display(), "delete_file tool");

        let meta = match tokio::fs::metadata(&resolved).await {
            Ok(m) => m,
            Err(e) => return ToolOutput::err(&call.id, format!("stat error: {e}")),
        };
        let is_dir = meta.is_dir();

        if self.ws.dry_run() {
            return ToolOutput::ok(
                &call.id,
                json!({
                    "dryRun": true,
                    "path": path,
                    "type": if is_dir { "directory" } else { "file" },
                }),
            );
        }

        let result = if is_dir {
            tokio::fs::remove_dir_all(&resolved).await
        } else {
            tokio::fs::remove_file(&resolved).await
        };

        match result {
            Ok(_) => ToolOutput::ok(
                &call.id,
                json!({
                    "path": path,
                    "type": if is_dir { "directory" } else { "file" },
                    "deleted": true,
                }),
            ),
            Err(e) => ToolOutput::err(&call.id, format!("delete error: {e}")),
        }
    }
}

pub struct MoveFileTool {
    pub ws: Arc<Workspace>,
}

#[async_trait]
impl Tool for MoveFileTool {
    fn name(&self) -> &str {
        "move_file"
    }

    fn description(&self) -> &str {
        "Move or rename a file or directory. Parent directories of the \
         destination are created automatically."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "source": { "type": "string", "description": "Existing path" },
                "destination": { "type": "string", "description": "New path" }
            },
            "required": ["source", "destination"]
        })
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::WriteFs
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let source = match call.args.get("source").and_then(|v| v.as_str()) {
            Some(s) => s.to_string(),
            None => return ToolOutput::err(&call.id, "missing required parameter 'source'"),
        };
        let destination = match call.args.get("destination").and_then(|v| v.as_str()) {
            Some(d) => d.to_string(),
            None => return ToolOutput::err(&call.id, "missing required parameter 'destination'"),
        };

        let from = self.ws.resolve(&source);
        let to = self.ws.resolve(&destination);
        debug!(from = %from.display(), to = %to.display(), "move_file tool");

        if tokio::fs::metadata(&from).await.is_err() {
            return ToolOutput::err(&call.id, format!("source does not exist: {source}"));
        }

        if self.ws.dry_run() {
            return ToolOutput::ok(
                &call.id,
                json!({
                    "dryRun": true,
                    "source": source,
                    "destination": destination,
                }),
            );
        }

        if let Some(parent) = to.parent() {
            if !parent.as_os_str().is_empty() {
                let _ = tokio::fs::create_dir_all(parent).await;
            }
        }

        match tokio::fs::rename(&from, &to).await {
            Ok(_) => ToolOutput::ok(
                &call.id,
                json!({ "source": source, "destination": destination }),
            ),
            Err(e) => ToolOutput::err(&call.id, format!("move error: {e}")),
        }
    }
}

/// Restore a file to its committed state (`git checkout HEAD -- <path>`).
pub struct RevertFileTool {
    pub ws: Arc<Workspace>,
}

#[async_trait]
impl Tool for RevertFileTool {
    fn name(&self) -> &str {
        "revert_file"
    }

    fn description(&self) -> &str {
        "Discard uncommitted changes to one file, restoring the version at \
         HEAD. The file must be tracked by git."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Workspace-relative path to restore"
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

        debug!(path = %path, "revert_file tool");

        if self.ws.dry_run() {
            return ToolOutput::ok(&call.id, json!({ "dryRun": true, "path": path }));
        }

        let output = Command::new("git")
            .args(["checkout", "HEAD", "--", path.as_str()])
            .current_dir(self.ws.root())
            .output()
            .await;

        match output {
            Ok(out) if out.status.success() => {
                ToolOutput::ok(&call.id, json!({ "path": path, "reverted": true }))
            }
            Ok(out) => {
                let stderr = String::from_utf8_lossy(&out.stderr);
                ToolOutput::err(&call.id, format!("revert failed: {}", stderr.trim()))
            }
            Err(e) => ToolOutput::err(&call.id, format!("git spawn error: {e}")),
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

    fn call(name: &str, args: serde_json::Value) -> ToolCall {
        ToolCall {
            id: "f1".into(),
            name: name.into(),
            args,
        }
    }

    // ── delete_file ───────────────────────────────────────────────────────────

    #[tokio::test]
    async fn deletes_a_file() {
        let (dir, ws) = setup();
        std::fs::write(dir.path().join("bye.txt"), "x").unwrap();
        let t = DeleteFileTool { ws };
        let out = t.execute(&call("delete_file", json!({"path": "bye.txt"}))).await;
        assert!(!out.is_error, "{}", out.content());
        assert_eq!(out.value["type"], json!("file"));
        assert!(!dir.path().join("bye.txt").exists());
    }

    #[tokio::test]
    async fn deletes_a_directory_recursively() {
        let (dir, ws) = setup();
        std::fs::create_dir_all(dir.path().join("d/sub")).unwrap();
        std::fs::write(dir.path().join("d/sub/f.txt"), "x").unwrap();
        let t = DeleteFileTool { ws };
        let out = t.execute(&call("delete_file", json!({"path": "d"}))).await;
        assert!(!out.is_error);
        assert_eq!(out.value["type"], json!("directory"));
        assert!(!dir.path().join("d").exists());
    }

    #[tokio::test]
    async fn missing_path_is_error() {
        let (_dir, ws) = setup();
        let t = DeleteFileTool { ws };
        let out = t.execute(&call("delete_file", json!({"path": "ghost"}))).await;
        assert!(out.is_error);
    }

    #[tokio::test]
    async fn delete_dry_run_keeps_the_file() {
        let (dir, ws) = setup();
        std::fs::write(dir.path().join("keep.txt"), "x").unwrap();
        ws.set_dry_run(true);
        let t = DeleteFileTool { ws };
        let out = t.execute(&call("delete_file", json!({"path": "keep.txt"}))).await;
        assert!(!out.is_error);
        assert_eq!(out.value["dryRun"], json!(true));
        assert!(dir.path().join("keep.txt").exists());
    }

    // ── move_file ─────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn moves_a_file_creating_parents() {
        let (dir, ws) = setup();
        std::fs::write(dir.path().join("a.txt"), "content").unwrap();
        let t = MoveFileTool { ws };
        let out = t
            .execute(&call(
                "move_file",
                json!({"source": "a.txt", "destination": "sub/b.txt"}),
            ))
            .await;
        assert!(!out.is_error, "{}", out.content());
        assert!(!dir.path().join("a.txt").exists());
        assert_eq!(
            std::fs::read_to_string(dir.path().join("sub/b.txt")).unwrap(),
            "content"
        );
    }

    #[tokio::test]
    async fn missing_source_is_error() {
        let (_dir, ws) = setup();
        let t = MoveFileTool { ws };
        let out = t
            .execute(&call(
                "move_file",
                json!({"source": "nope.txt", "destination": "x.txt"}),
            ))
            .await;
        assert!(out.is_error);
        assert!(out.message().unwrap().contains("does not exist"));
    }

    #[tokio::test]
    async fn move_dry_run_moves_nothing() {
        let (dir, ws) = setup();
        std::fs::write(dir.path().join("a.txt"), "x").unwrap();
        ws.set_dry_run(true);
        let t = MoveFileTool { ws };
        let out = t
            .execute(&call(
                "move_file",
                json!({"source": "a.txt", "destination": "b.txt"}),
            ))
            .await;
        assert!(!out.is_error);
        assert!(dir.path().join("a.txt").exists());
        assert!(!dir.path().join("b.txt").exists());
    }

    // ── revert_file ───────────────────────────────────────────────────────────

    #[tokio::test]
    async fn revert_outside_a_repo_is_error() {
        let (_dir, ws) = setup();
        let t = RevertFileTool { ws };
        let out = t.execute(&call("revert_file", json!({"path": "a.txt"}))).await;
        assert!(out.is_error);
    }

    #[tokio::test]
    async fn revert_dry_run_runs_no_git() {
        let (_dir, ws) = setup();
        ws.set_dry_run(true);
        let t = RevertFileTool { ws };
        let out = t.execute(&call("revert_file", json!({"path": "a.txt"}))).await;
        assert!(!out.is_error);
        assert_eq!(out.value["dryRun"], json!(true));
    }
}
