use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;
use serde_json::{json, Value};
use tracing::debug;
use walkdir::WalkDir;

use harbor_config::ToolCategory;

use crate::tool::{Tool, ToolCall, ToolOutput};
use crate::workspace::Workspace;

/// Rough bytes-per-token divisor for the cost estimate.
const BYTES_PER_TOKEN: usize = 4;

const SKIP_DIRS: &[&str] = &[".git", "target", "node_modules", ".venv", "dist", "build"];

/// Build a bundle of files related to a seed set, by import statements and
/// naming conventions.  A best-effort heuristic: missing resolutions are
/// silently skipped, and the token cost is an estimate, not a count.
pub struct GetContextTool {
    pub ws: Arc<Workspace>,
}

#[async_trait]
impl Tool for GetContextTool {
    fn name(&self) -> &str {
        "get_context"
    }

    fn description(&self) -> &str {
        "Collect files related to the given ones — modules they import plus \
         same-stem siblings such as tests — and estimate the token cost of \
         including the bundle in the conversation."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "files": {
                    "type": "array",
                    "items": { "type": "string" },
                    "description": "Seed files to expand from"
                }
            },
            "required": ["files"]
        })
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Context
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let seeds: Vec<String> = match call.args.get("files").and_then(|v| v.as_array()) {
            Some(arr) => arr
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            None => {
                return ToolOutput::err(&call.id, "missing required parameter 'files' (array of paths)")
            }
        };
        if seeds.is_empty() {
            return ToolOutput::err(&call.id, "'files' must contain at least one entry");
        }

        debug!(seeds = seeds.len(), "get_context tool");

        let root = self.ws.root().to_path_buf();
        let ws = self.ws.clone();

        let result = tokio::task::spawn_blocking(move || {
            // Index workspace files by stem once; used to resolve imports and
            // naming-convention siblings.
            let mut index: Vec<(String, String)> = Vec::new(); // (stem, rel path)
            for entry in WalkDir::new(&root)
                .into_iter()
                .filter_entry(|e| {
                    let name = e.file_name().to_string_lossy();
                    !(e.file_type().is_dir() && SKIP_DIRS.contains(&name.as_ref()))
                })
                .filter_map(Result::ok)
                .filter(|e| e.file_type().is_file())
            {
                let rel = entry
                    .path()
                    .strip_prefix(&root)
                    .unwrap_or(entry.path())
                    .display()
                    .to_string();
                if let Some(stem) = entry.path().file_stem().and_then(|s| s.to_str()) {
                    index.push((stem.to_string(), rel));
                }
            }

            let mut files = Vec::new();
            let mut related = BTreeSet::new();
            let mut total_bytes = 0usize;

            for seed in &seeds {
                let resolved = ws.resolve(seed);
                let Ok(text) = std::fs::read_to_string(&resolved) else {
                    files.push(json!({ "path": seed, "error": "unreadable" }));
                    continue;
                };
                total_bytes += text.len();
                files.push(json!({
                    "path": seed,
                    "lines": text.lines().count(),
                    "bytes": text.len(),
                }));

                let seed_stem = Path::new(seed)
                    .file_stem()
                    .and_then(|s| s.to_str())
                    .unwrap_or("");

                for stem in imported_stems(&text) {
                    for (s, rel) in &index {
                        if *s == stem && rel != seed {
                            related.insert(rel.clone());
                        }
                    }
                }
                // Naming-convention siblings: foo_test, foo.test, test_foo.
                for (s, rel) in &index {
                    if rel == seed || seed_stem.is_empty() {
                        continue;
                    }
                    if s == &format!("{seed_stem}_test")
                        || s == &format!("{seed_stem}.test")
                        || s == &format!("test_{seed_stem}")
                    {
                        related.insert(rel.clone());
                    }
                }
            }

            for rel in &related {
                if let Ok(meta) = std::fs::metadata(root.join(rel)) {
                    total_bytes += meta.len() as usize;
                }
            }

            json!({
                "files": files,
                "related": related.into_iter().collect::<Vec<_>>(),
                "estimatedTokens": total_bytes / BYTES_PER_TOKEN,
            })
        })
        .await;

        match result {
            Ok(bundle) => ToolOutput::ok(&call.id, bundle),
            Err(e) => ToolOutput::err(&call.id, format!("context task failed: {e}")),
        }
    }
}

/// Module stems referenced by import-like statements, across the handful of
/// languages the heuristic understands.
fn imported_stems(text: &str) -> Vec<String> {
    let patterns = [
        // rust: `mod foo;`, `use crate::foo`, `use crate::foo::bar`
        r"(?m)^\s*mod\s+([a-zA-Z_][a-zA-Z0-9_]*)\s*;",
        r"(?m)^\s*use\s+crate::([a-zA-Z_][a-zA-Z0-9_]*)",
        // js/ts: `import ... from './foo'`, `require('./foo')`
        r#"from\s+['"]\.{1,2}/([a-zA-Z0-9_./-]+)['"]"#,
        r#"require\(['"]\.{1,2}/([a-zA-Z0-9_./-]+)['"]\)"#,
        // python: `import foo`, `from foo import`
        r"(?m)^\s*import\s+([a-zA-Z_][a-zA-Z0-9_]*)",
        r"(?m)^\s*from\s+([a-zA-Z_][a-zA-Z0-9_]*)\s+import",
    ];

    let mut stems = Vec::new();
    for pat in patterns {
        let re = Regex::new(pat).unwrap();
        for cap in re.captures_iter(text) {
            let target = cap[1].to_string();
            // Keep only the final path component as the stem.
            let stem = target.rsplit('/').next().unwrap_or(&target).to_string();
            if !stems.contains(&stem) {
                stems.push(stem);
            }
        }
    }
    stems
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn rust_imports_are_extracted() {
        let stems = imported_stems("mod parser;\nuse crate::lexer::Token;\n");
        assert!(stems.contains(&"parser".to_string()));
        assert!(stems.contains(&"lexer".to_string()));
    }

    #[test]
    fn js_relative_imports_are_extracted() {
        let stems = imported_stems("import { x } from './util/helpers';\n");
        assert!(stems.contains(&"helpers".to_string()));
    }

    #[tokio::test]
    async fn bundle_includes_imported_and_test_siblings() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("main.rs"), "mod helper;\nfn main() {}\n").unwrap();
        std::fs::write(dir.path().join("helper.rs"), "pub fn x() {}\n").unwrap();
        std::fs::write(dir.path().join("main_test.rs"), "#[test] fn t() {}\n").unwrap();

        let t = GetContextTool {
            ws: Arc::new(Workspace::new(dir.path())),
        };
        let out = t
            .execute(&ToolCall {
                id: "x1".into(),
                name: "get_context".into(),
                args: json!({"files": ["main.rs"]}),
            })
            .await;
        assert!(!out.is_error, "{}", out.content());
        let related: Vec<String> = out.value["related"]
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_str().unwrap().to_string())
            .collect();
        assert!(related.contains(&"helper.rs".to_string()));
        assert!(related.contains(&"main_test.rs".to_string()));
        assert!(out.value["estimatedTokens"].as_u64().unwrap() > 0);
    }

    #[tokio::test]
    async fn unreadable_seed_is_reported_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let t = GetContextTool {
            ws: Arc::new(Workspace::new(dir.path())),
        };
        let out = t
            .execute(&ToolCall {
                id: "x1".into(),
                name: "get_context".into(),
                args: json!({"files": ["ghost.rs"]}),
            })
            .await;
        assert!(!out.is_error);
        assert_eq!(out.value["files"][0]["error"], json!("unreadable"));
    }

    #[tokio::test]
    async fn empty_files_array_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let t = GetContextTool {
            ws: Arc::new(Workspace::new(dir.path())),
        };
        let out = t
            .execute(&ToolCall {
                id: "x1".into(),
                name: "get_context".into(),
                args: json!({"files": []}),
            })
            .await;
        assert!(out.is_error);
    }
}
