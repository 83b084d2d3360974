use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Value};
use tracing::debug;
use walkdir::WalkDir;

use harbor_config::ToolCategory;

use crate::tool::{Tool, ToolCall, ToolOutput};
use crate::workspace::Workspace;

const DEFAULT_MAX_RESULTS: usize = 100;

/// Directories that are never worth searching.
const SKIP_DIRS: &[&str] = &[".git", "target", "node_modules", ".venv", "dist", "build"];

pub struct SearchFilesTool {
    pub ws: Arc<Workspace>,
}

#[async_trait]
impl Tool for SearchFilesTool {
    fn name(&self) -> &str {
        "search_files"
    }

    fn description(&self) -> &str {
        "Search file contents under a directory with a regular expression. \
         Binary files and dependency/build directories are skipped. Results \
         are capped at max_results matches."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "pattern": {
                    "type": "string",
                    "description": "Regular expression to search for"
                },
                "path": {
                    "type": "string",
                    "description": "Directory to search (default: workspace root)"
                },
                "max_results": {
                    "type": "integer",
                    "description": "Maximum matches to return (default 100)"
                }
            },
            "required": ["pattern"]
        })
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::ReadOnly
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let pattern = match call.args.get("pattern").and_then(|v| v.as_str()) {
            Some(p) => p.to_string(),
            None => return ToolOutput::err(&call.id, "missing required parameter 'pattern'"),
        };
        let path = call
            .args
            .get("path")
            .and_then(|v| v.as_str())
            .unwrap_or(".")
            .to_string();
        let max_results = call
            .args
            .get("max_results")
            .and_then(|v| v.as_u64())
            .unwrap_or(DEFAULT_MAX_RESULTS as u64) as usize;

        let re = match Regex::new(&pattern) {
            Ok(re) => re,
            Err(e) => return ToolOutput::err(&call.id, format!("invalid regex: {e}")),
        };

        let root = self.ws.resolve(&path);
        let ws_root = self.ws.root().to_path_buf();
        debug!(pattern = %pattern, root = %root.display(), "search_files tool");

        // File walking and line scanning are blocking; hand them off.
        let result = tokio::task::spawn_blocking(move || {
            let mut matches = Vec::new();
            let mut truncated = false;

            'outer: for entry in WalkDir::new(&root)
                .into_iter()
                .filter_entry(|e| {
                    let name = e.file_name().to_string_lossy();
                    !(e.file_type().is_dir() && SKIP_DIRS.contains(&name.as_ref()))
                })
                .filter_map(Result::ok)
                .filter(|e| e.file_type().is_file())
            {
                let Ok(text) = std::fs::read_to_string(entry.path()) else {
                    continue; // binary or unreadable
                };
                for (i, line) in text.lines().enumerate() {
                    if re.is_match(line) {
                        if matches.len() >= max_results {
                            truncated = true;
                            break 'outer;
                        }
                        let file = entry
                            .path()
                            .strip_prefix(&ws_root)
                            .unwrap_or(entry.path())
                            .display()
                            .to_string();
                        matches.push(json!({
                            "file": file,
                            "line": i + 1,
                            "text": line.trim_end(),
                        }));
                    }
                }
            }
            (matches, truncated)
        })
        .await;

        match result {
            Ok((matches, truncated)) => ToolOutput::ok(
                &call.id,
                json!({
                    "pattern": pattern,
                    "matches": matches,
                    "count": matches.len(),
                    "truncated": truncated,
                }),
            ),
            Err(e) => ToolOutput::err(&call.id, format!("search task failed: {e}")),
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
