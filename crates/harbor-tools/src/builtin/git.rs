// Copyright (c) 2024-2026 Harbor Contributors
//
// SPDX-License-Identifier: Apache-2.0
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::process::Command;
use tracing::debug;

use harbor_config::ToolCategory;

use crate::builtin::shell::head_tail_truncate;
use crate::tool::{Tool, ToolCall, ToolOutput};
use crate::workspace::Workspace;

/// Run `git <args>` in `root`, returning (stdout, stderr, exit code).
async fn run_git(root: &Path, args: &[&str]) -> std::io::Result<(String, String, i32)> {
    let out = Command::new("git")
        .args(args)
        .current_dir(root)
        .output()
        .await?;
    Ok((
        String::from_utf8_lossy(&out.stdout).to_string(),
        String::from_utf8_lossy(&out.stderr).to_string(),
        out.status.code().unwrap_or(-1),
    ))
}

fn git_error(call_id: &str, what: &str, stderr: &str) -> ToolOutput {
    ToolOutput::err(call_id, format!("{what}: {}", stderr.trim()))
}

// ── get_git_status ────────────────────────────────────────────────────────────

pub struct GitStatusTool {
    pub ws: Arc<Workspace>,
}

#[async_trait]
impl Tool for GitStatusTool {
    fn name(&self) -> &str {
        "get_git_status"
    }

    fn description(&self) -> &str {
        "Current branch plus staged, modified, and untracked file counts."
    }

    fn parameters_schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::GitRead
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let root = self.ws.root();
        let (branch, _, code) = match run_git(root, &["rev-parse", "--abbrev-ref", "HEAD"]).await {
            Ok(r) => r,
            Err(e) => return ToolOutput::err(&call.id, format!("git spawn error: {e}")),
        };
        if code != 0 {
            return ToolOutput::err(&call.id, "not a git repository");
        }

        let (porcelain, stderr, code) = match run_git(root, &["status", "--porcelain"]).await {
            Ok(r) => r,
            Err(e) => return ToolOutput::err(&call.id, format!("git spawn error: {e}")),
        };
        if code != 0 {
            return git_error(&call.id, "git status failed", &stderr);
        }

        let mut staged = 0u32;
        let mut modified = 0u32;
        let mut untracked = 0u32;
        for line in porcelain.lines() {
            let mut chars = line.chars();
            let x = chars.next().unwrap_or(' ');
            let y = chars.next().unwrap_or(' ');
            if x == '?' {
                untracked += 1;
            } else {
                if x != ' ' {
                    staged += 1;
                }
                if y != ' ' {
                    modified += 1;
                }
            }
        }

        ToolOutput::ok(
            &call.id,
            json!({
                "branch": branch.trim(),
                "staged": staged,
                "modified": modified,
                "untracked": untracked,
                "clean": porcelain.trim().is_empty(),
            }),
        )
    }
}

// ── get_git_diff_summary ──────────────────────────────────────────────────────

pub struct GitDiffSummaryTool {
    pub ws: Arc<Workspace>,
}

#[async_trait]
impl Tool for GitDiffSummaryTool {
    fn name(&self) -> &str {
        "get_git_diff_summary"
    }

    fn description(&self) -> &str {
        "Per-file change statistics for the working tree (diff --stat), \
         including staged changes."
    }

    fn parameters_schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::GitRead
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let root = self.ws.root();
        let (unstaged, stderr, code) = match run_git(root, &["diff", "--stat"]).await {
            Ok(r) => r,
            Err(e) => return ToolOutput::err(&call.id, format!("git spawn error: {e}")),
        };
        if code != 0 {
            return git_error(&call.id, "git diff failed", &stderr);
        }
        let (staged, _, _) = run_git(root, &["diff", "--cached", "--stat"])
            .await
            .unwrap_or_default();

        ToolOutput::ok(
            &call.id,
            json!({
                "unstaged": unstaged.trim_end(),
                "staged": staged.trim_end(),
            }),
        )
    }
}

// ── get_git_changed_files ─────────────────────────────────────────────────────

pub struct GitChangedFilesTool {
    pub ws: Arc<Workspace>,
}

#[async_trait]
impl Tool for GitChangedFilesTool {
    fn name(&self) -> &str {
        "get_git_changed_files"
    }

    fn description(&self) -> &str {
        "List every changed file with its two-letter porcelain status code."
    }

    fn parameters_schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::GitRead
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let (porcelain, stderr, code) =
            match run_git(self.ws.root(), &["status", "--porcelain"]).await {
                Ok(r) => r,
                Err(e) => return ToolOutput::err(&call.id, format!("git spawn error: {e}")),
            };
        if code != 0 {
            return git_error(&call.id, "git status failed", &stderr);
        }

        let files: Vec<Value> = porcelain
            .lines()
            .filter(|l| l.len() > 3)
            .map(|l| {
                json!({
                    "status": l[..2].trim(),
                    "path": l[3..].trim(),
                })
            })
            .collect();

        ToolOutput::ok(&call.id, json!({ "files": files, "count": files.len() }))
    }
}

// ── create_git_checkpoint ─────────────────────────────────────────────────────

/// Create a restore point before risky operations.
///
/// Two strategies: `stash` records the working tree as a stash entry without
/// disturbing it (`git stash create` + `store`); `commit` stages everything
/// and commits it on the current branch.
pub struct GitCheckpointTool {
    pub ws: Arc<Workspace>,
}

#[async_trait]
impl Tool for GitCheckpointTool {
    fn name(&self) -> &str {
        "create_git_checkpoint"
    }

    fn description(&self) -> &str {
        "Create a restore point. strategy='stash' (default) snapshots the \
         working tree without changing it; strategy='commit' stages and \
         commits everything. Returns the checkpoint id to pass to \
         revert_to_git_checkpoint."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "label": {
                    "type": "string",
                    "description": "Human-readable checkpoint label"
                },
                "strategy": {
                    "type": "string",
                    "enum": ["stash", "commit"],
                    "description": "How to record the checkpoint (default stash)"
                }
            },
            "required": ["label"]
        })
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::GitMutation
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let label = match call.args.get("label").and_then(|v| v.as_str()) {
            Some(l) => l.to_string(),
            None => return ToolOutput::err(&call.id, "missing required parameter 'label'"),
        };
        let strategy = call
            .args
            .get("strategy")
            .and_then(|v| v.as_str())
            .unwrap_or("stash")
            .to_string();
        if strategy != "stash" && strategy != "commit" {
            return ToolOutput::err(
                &call.id,
                format!("unknown strategy '{strategy}'; expected 'stash' or 'commit'"),
            );
        }

        debug!(%label, %strategy, "create_git_checkpoint tool");

        if self.ws.dry_run() {
            return ToolOutput::ok(
                &call.id,
                json!({ "dryRun": true, "label": label, "strategy": strategy }),
            );
        }

        let root = self.ws.root();
        match strategy.as_str() {
            "stash" => {
                let (sha, stderr, code) = match run_git(root, &["stash", "create", label.as_str()]).await {
                    Ok(r) => r,
                    Err(e) => return ToolOutput::err(&call.id, format!("git spawn error: {e}")),
                };
                if code != 0 {
                    return git_error(&call.id, "stash create failed", &stderr);
                }
                let sha = sha.trim().to_string();
                if sha.is_empty() {
                    return ToolOutput::err(
                        &call.id,
                        "nothing to checkpoint: working tree is clean",
                    );
                }
                // Store the dangling stash commit so gc does not reap it.
                let (_, stderr, code) =
                    match run_git(root, &["stash", "store", "-m", label.as_str(), sha.as_str()]).await {
                        Ok(r) => r,
                        Err(e) => {
                            return ToolOutput::err(&call.id, format!("git spawn error: {e}"))
                        }
                    };
                if code != 0 {
                    return git_error(&call.id, "stash store failed", &stderr);
                }
                ToolOutput::ok(
                    &call.id,
                    json!({ "checkpointId": sha, "strategy": "stash", "label": label }),
                )
            }
            _ => {
                let (_, stderr, code) = match run_git(root, &["add", "-A"]).await {
                    Ok(r) => r,
                    Err(e) => return ToolOutput::err(&call.id, format!("git spawn error: {e}")),
                };
                if code != 0 {
                    return git_error(&call.id, "git add failed", &stderr);
                }
                let msg = format!("checkpoint: {label}");
                let (_, stderr, code) =
                    match run_git(root, &["commit", "-m", msg.as_str(), "--no-verify"]).await {
                        Ok(r) => r,
                        Err(e) => {
                            return ToolOutput::err(&call.id, format!("git spawn error: {e}"))
                        }
                    };
                if code != 0 {
                    return git_error(&call.id, "git commit failed", &stderr);
                }
                let (sha, _, _) = run_git(root, &["rev-parse", "HEAD"]).await.unwrap_or_default();
                ToolOutput::ok(
                    &call.id,
                    json!({
                        "checkpointId": sha.trim(),
                        "strategy": "commit",
                        "label": label,
                    }),
                )
            }
        }
    }
}

// ── revert_to_git_checkpoint ──────────────────────────────────────────────────

/// Destructive restore.  `confirm: true` is required — its absence is a
/// validation error, not a warning.
pub struct GitRevertCheckpointTool {
    pub ws: Arc<Workspace>,
}

#[async_trait]
impl Tool for GitRevertCheckpointTool {
    fn name(&self) -> &str {
        "revert_to_git_checkpoint"
    }

    fn description(&self) -> &str {
        "Restore the working tree to a checkpoint created by \
         create_git_checkpoint. Destructive: requires confirm=true. For \
         stash checkpoints the stash is applied; for commit checkpoints the \
         branch is hard-reset to the checkpoint commit."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "checkpoint_id": {
                    "type": "string",
                    "description": "Id returned by create_git_checkpoint"
                },
                "strategy": {
                    "type": "string",
                    "enum": ["stash", "commit"],
                    "description": "Strategy the checkpoint was created with (default stash)"
                },
                "confirm": {
                    "type": "boolean",
                    "description": "Must be true; reverting discards current changes"
                }
            },
            "required": ["checkpoint_id", "confirm"]
        })
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::GitMutation
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let checkpoint_id = match call.args.get("checkpoint_id").and_then(|v| v.as_str()) {
            Some(c) => c.to_string(),
            None => return ToolOutput::err(&call.id, "missing required parameter 'checkpoint_id'"),
        };
        // Explicit confirmation gate: absent or false both refuse, before
        // any git command runs.
        if !call
            .args
            .get("confirm")
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
        {
            return ToolOutput::err(
                &call.id,
                "reverting to a checkpoint discards current changes; pass confirm=true to proceed",
            );
        }
        let strategy = call
            .args
            .get("strategy")
            .and_then(|v| v.as_str())
            .unwrap_or("stash");

        debug!(%checkpoint_id, %strategy, "revert_to_git_checkpoint tool");

        if self.ws.dry_run() {
            return ToolOutput::ok(
                &call.id,
                json!({
                    "dryRun": true,
                    "checkpointId": checkpoint_id,
                    "strategy": strategy,
                }),
            );
        }

        let root = self.ws.root();
        let args: Vec<&str> = match strategy {
            "commit" => vec!["reset", "--hard", checkpoint_id.as_str()],
            _ => vec!["stash", "apply", checkpoint_id.as_str()],
        };
        let (_, stderr, code) = match run_git(root, &args).await {
            Ok(r) => r,
            Err(e) => return ToolOutput::err(&call.id, format!("git spawn error: {e}")),
        };
        if code != 0 {
            return git_error(&call.id, "revert failed", &stderr);
        }

        ToolOutput::ok(
            &call.id,
            json!({ "checkpointId": checkpoint_id, "strategy": strategy, "reverted": true }),
        )
    }
}

// ── git_show_diff ─────────────────────────────────────────────────────────────

pub struct GitShowDiffTool {
    pub ws: Arc<Workspace>,
}

#[async_trait]
impl Tool for GitShowDiffTool {
    fn name(&self) -> &str {
        "git_show_diff"
    }

    fn description(&self) -> &str {
        "Full unified diff of the working tree, optionally limited to one \
         file or to staged changes. Large diffs are head/tail truncated."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "file": {
                    "type": "string",
                    "description": "Limit the diff to this path"
                },
                "staged": {
                    "type": "boolean",
                    "description": "Show staged changes instead of unstaged (default false)"
                }
            }
        })
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::GitRead
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let file = call.args.get("file").and_then(|v| v.as_str());
        let staged = call
            .args
            .get("staged")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);

        let mut args = vec!["diff"];
        if staged {
            args.push("--cached");
        }
        if let Some(f) = file {
            args.push("--");
            args.push(f);
        }

        let (diff, stderr, code) = match run_git(self.ws.root(), &args).await {
            Ok(r) => r,
            Err(e) => return ToolOutput::err(&call.id, format!("git spawn error: {e}")),
        };
        if code != 0 {
            return git_error(&call.id, "git diff failed", &stderr);
        }

        ToolOutput::ok(
            &call.id,
            json!({
                "diff": head_tail_truncate(&diff),
                "staged": staged,
                "empty": diff.trim().is_empty(),
            }),
        )
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    /// Initialize a throwaway repo with one committed file.
    fn init_repo() -> (tempfile::TempDir, Arc<Workspace>) {
        let dir = tempfile::tempdir().unwrap();
        let run = |args: &[&str]| {
            let status = std::process::Command::new("git")
                .args(args)
                .current_dir(dir.path())
                .env("GIT_AUTHOR_NAME", "test")
                .env("GIT_AUTHOR_EMAIL", "t@t")
                .env("GIT_COMMITTER_NAME", "test")
                .env("GIT_COMMITTER_EMAIL", "t@t")
                .output()
                .unwrap();
            assert!(status.status.success(), "git {args:?} failed");
        };
        run(&["init", "-q"]);
        std::fs::write(dir.path().join("base.txt"), "base\n").unwrap();
        run(&["add", "-A"]);
        run(&["commit", "-q", "-m", "init", "--no-verify"]);
        let ws = Arc::new(Workspace::new(dir.path()));
        (dir, ws)
    }

    fn call(name: &str, args: serde_json::Value) -> ToolCall {
        ToolCall {
            id: "g1".into(),
            name: name.into(),
            args,
        }
    }

    #[tokio::test]
    async fn status_reports_clean_repo() {
        let (_dir, ws) = init_repo();
        let t = GitStatusTool { ws };
        let out = t.execute(&call("get_git_status", json!({}))).await;
        assert!(!out.is_error, "{}", out.content());
        assert_eq!(out.value["clean"], json!(true));
        assert_eq!(out.value["untracked"], json!(0));
    }

    #[tokio::test]
    async fn status_counts_untracked_and_modified() {
        let (dir, ws) = init_repo();
        std::fs::write(dir.path().join("new.txt"), "new\n").unwrap();
        std::fs::write(dir.path().join("base.txt"), "changed\n").unwrap();
        let t = GitStatusTool { ws };
        let out = t.execute(&call("get_git_status", json!({}))).await;
        assert_eq!(out.value["untracked"], json!(1));
        assert_eq!(out.value["modified"], json!(1));
        assert_eq!(out.value["clean"], json!(false));
    }

    #[tokio::test]
    async fn status_outside_repo_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let t = GitStatusTool {
            ws: Arc::new(Workspace::new(dir.path())),
        };
        let out = t.execute(&call("get_git_status", json!({}))).await;
        assert!(out.is_error);
    }

    #[tokio::test]
    async fn changed_files_lists_paths_with_status() {
        let (dir, ws) = init_repo();
        std::fs::write(dir.path().join("new.txt"), "x\n").unwrap();
        let t = GitChangedFilesTool { ws };
        let out = t.execute(&call("get_git_changed_files", json!({}))).await;
        assert_eq!(out.value["count"], json!(1));
        assert_eq!(out.value["files"][0]["path"], json!("new.txt"));
        assert_eq!(out.value["files"][0]["status"], json!("??"));
    }

    #[tokio::test]
    async fn stash_checkpoint_keeps_working_tree_intact() {
        let (dir, ws) = init_repo();
        std::fs::write(dir.path().join("base.txt"), "dirty\n").unwrap();
        let t = GitCheckpointTool { ws };
        let out = t
            .execute(&call(
                "create_git_checkpoint",
                json!({"label": "before-refactor"}),
            ))
            .await;
        assert!(!out.is_error, "{}", out.content());
        assert_eq!(out.value["strategy"], json!("stash"));
        assert!(out.value["checkpointId"].as_str().unwrap().len() >= 7);
        // The stash strategy must not touch the working tree.
        assert_eq!(
            std::fs::read_to_string(dir.path().join("base.txt")).unwrap(),
            "dirty\n"
        );
    }

    #[tokio::test]
    async fn checkpoint_on_clean_tree_is_error() {
        let (_dir, ws) = init_repo();
        let t = GitCheckpointTool { ws };
        let out = t
            .execute(&call("create_git_checkpoint", json!({"label": "noop"})))
            .await;
        assert!(out.is_error);
        assert!(out.message().unwrap().contains("clean"));
    }

    #[tokio::test]
    async fn commit_checkpoint_advances_head() {
        let (dir, ws) = init_repo();
        std::fs::write(dir.path().join("new.txt"), "x\n").unwrap();
        let t = GitCheckpointTool { ws };
        let out = t
            .execute(&call(
                "create_git_checkpoint",
                json!({"label": "wip", "strategy": "commit"}),
            ))
            .await;
        assert!(!out.is_error, "{}", out.content());
        assert_eq!(out.value["strategy"], json!("commit"));
    }

    #[tokio::test]
    async fn checkpoint_dry_run_records_nothing() {
        let (dir, ws) = init_repo();
        std::fs::write(dir.path().join("base.txt"), "dirty\n").unwrap();
        ws.set_dry_run(true);
        let t = GitCheckpointTool { ws };
        let out = t
            .execute(&call("create_git_checkpoint", json!({"label": "x"})))
            .await;
        assert!(!out.is_error);
        assert_eq!(out.value["dryRun"], json!(true));
        let stashes = std::process::Command::new("git")
            .args(["stash", "list"])
            .current_dir(dir.path())
            .output()
            .unwrap();
        assert!(stashes.stdout.is_empty(), "no stash may be created");
    }

    #[tokio::test]
    async fn revert_without_confirm_is_error_and_mutates_nothing() {
        let (dir, ws) = init_repo();
        std::fs::write(dir.path().join("base.txt"), "precious\n").unwrap();
        let t = GitRevertCheckpointTool { ws };
        for args in [
            json!({"checkpoint_id": "deadbeef"}),
            json!({"checkpoint_id": "deadbeef", "confirm": false}),
        ] {
            let out = t.execute(&call("revert_to_git_checkpoint", args)).await;
            assert!(out.is_error);
            assert!(out.message().unwrap().contains("confirm=true"));
        }
        assert_eq!(
            std::fs::read_to_string(dir.path().join("base.txt")).unwrap(),
            "precious\n"
        );
    }

    #[tokio::test]
    async fn stash_checkpoint_round_trips_through_revert() {
        let (dir, ws) = init_repo();
        std::fs::write(dir.path().join("base.txt"), "checkpointed\n").unwrap();

        let cp = GitCheckpointTool { ws: ws.clone() };
        let out = cp
            .execute(&call("create_git_checkpoint", json!({"label": "cp"})))
            .await;
        let id = out.value["checkpointId"].as_str().unwrap().to_string();

        // Wipe the change, then revert to the checkpoint.
        let run = |args: &[&str]| {
            std::process::Command::new("git")
                .args(args)
                .current_dir(dir.path())
                .output()
                .unwrap()
        };
        run(&["checkout", "--", "base.txt"]);
        assert_eq!(
            std::fs::read_to_string(dir.path().join("base.txt")).unwrap(),
            "base\n"
        );

        let rv = GitRevertCheckpointTool { ws };
        let out = rv
            .execute(&call(
                "revert_to_git_checkpoint",
                json!({"checkpoint_id": id, "confirm": true}),
            ))
            .await;
        assert!(!out.is_error, "{}", out.content());
        assert_eq!(
            std::fs::read_to_string(dir.path().join("base.txt")).unwrap(),
            "checkpointed\n"
        );
    }

    #[tokio::test]
    async fn show_diff_reports_empty_on_clean_tree() {
        let (_dir, ws) = init_repo();
        let t = GitShowDiffTool { ws };
        let out = t.execute(&call("git_show_diff", json!({}))).await;
        assert!(!out.is_error);
        assert_eq!(out.value["empty"], json!(true));
    }

    #[tokio::test]
    async fn show_diff_contains_changed_lines() {
        let (dir, ws) = init_repo();
        std::fs::write(dir.path().join("base.txt"), "edited\n").unwrap();
        let t = GitShowDiffTool { ws };
        let out = t.execute(&call("git_show_diff", json!({}))).await;
        let diff = out.value["diff"].as_str().unwrap();
        assert!(diff.contains("-base"));
        assert!(diff.contains("+edited"));
    }
}
