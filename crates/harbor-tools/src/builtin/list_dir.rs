use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use harbor_config::ToolCategory;

use crate::tool::{Tool, ToolCall, ToolOutput};
use crate::workspace::Workspace;

pub struct ListDirectoryTool {
    pub ws: Arc<Workspace>,
}

#[async_trait]
impl Tool for ListDirectoryTool {
    fn name(&self) -> &str {
        "list_directory"
    }

    fn description(&self) -> &str {
        "List the entries of a directory, directories first, sorted by name. \
         Defaults to the workspace root when no path is given."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Directory to list (default: workspace root)"
                }
            }
        })
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::ReadOnly
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let path = call
            .args
            .get("path")
            .and_then(|v| v.as_str())
            .unwrap_or(".")
            .to_string();

        let resolved = self.ws.resolve(&path);
        debug!(path = %resolved.display(), "list_directory tool");

        let mut rd = match tokio::fs::read_dir(&resolved).await {
            Ok(rd) => rd,
            Err(e) => return ToolOutput::err(&call.id, format!("list error: {e}")),
        };

        let mut entries = Vec::new();
        while let Ok(Some(entry)) = rd.next_entry().await {
            let name = entry.file_name().to_string_lossy().to_string();
            let meta = entry.metadata().await.ok();
            let is_dir = meta.as_ref().map(|m| m.is_dir()).unwrap_or(false);
            entries.push(json!({
                "name": name,
                "type": if is_dir { "directory" } else { "file" },
                "size": if is_dir { Value::Null } else {
                    json!(meta.map(|m| m.len()).unwrap_or(0))
                },
            }));
        }

        entries.sort_by(|a, b| {
            let a_dir = a["type"] == "directory";
            let b_dir = b["type"] == "directory";
            b_dir
                .cmp(&a_dir)
                .then_with(|| a["name"].as_str().cmp(&b["name"].as_str()))
        });

        ToolOutput::ok(
            &call.id,
            json!({ "path": path, "entries": entries, "count": entries.len() }),
        )
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[tokio::test]
    async fn lists_directories_before_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("zdir")).unwrap();
        std::fs::write(dir.path().join("afile.txt"), "x").unwrap();
        let t = ListDirectoryTool {
            ws: Arc::new(Workspace::new(dir.path())),
        };
        let out = t
            .execute(&ToolCall {
                id: "l1".into(),
                name: "list_directory".into(),
                args: json!({}),
            })
            .await;
        assert!(!out.is_error, "{}", out.content());
        let entries = out.value["entries"].as_array().unwrap();
        assert_eq!(entries[0]["name"], json!("zdir"));
        assert_eq!(entries[1]["name"], json!("afile.txt"));
        assert_eq!(out.value["count"], json!(2));
    }

    #[tokio::test]
    async fn files_report_sizes_directories_do_not() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("f.txt"), "12345").unwrap();
        std::fs::create_dir(dir.path().join("d")).unwrap();
        let t = ListDirectoryTool {
            ws: Arc::new(Workspace::new(dir.path())),
        };
        let out = t
            .execute(&ToolCall {
                id: "l1".into(),
                name: "list_directory".into(),
                args: json!({}),
            })
            .await;
        let entries = out.value["entries"].as_array().unwrap();
        assert!(entries[0]["size"].is_null());
        assert_eq!(entries[1]["size"], json!(5));
    }

    #[tokio::test]
    async fn missing_directory_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let t = ListDirectoryTool {
            ws: Arc::new(Workspace::new(dir.path())),
        };
        let out = t
            .execute(&ToolCall {
                id: "l1".into(),
                name: "list_directory".into(),
                args: json!({"path": "ghost"}),
            })
            .await;
        assert!(out.is_error);
    }
}
