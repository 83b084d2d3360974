// Copyright (c) 2024-2026 Harbor Contributors
//
// SPDX-License-Identifier: Apache-2.0
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::debug;

use harbor_config::ToolCategory;

use crate::builtin::shell::{head_tail_truncate, run_with_timeout};
use crate::tool::{Tool, ToolCall, ToolOutput};
use crate::workspace::{TestReport, Workspace};

/// Run the project's test suite and cache the parsed result.
pub struct RunTestsTool {
    pub ws: Arc<Workspace>,
    pub timeout_secs: u64,
}

#[async_trait]
impl Tool for RunTestsTool {
    fn name(&self) -> &str {
        "run_tests"
    }

    fn description(&self) -> &str {
        "Run the project's test suite. The runner is auto-detected from the \
         project layout (cargo, npm, pytest, make) unless 'command' overrides \
         it. Pass/fail counts and failure excerpts are parsed from the output \
         and cached for get_test_status."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "Explicit test command (overrides auto-detection)"
                },
                "filter": {
                    "type": "string",
                    "description": "Test name filter appended to the command"
                }
            }
        })
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Tests
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let command = match call.args.get("command").and_then(|v| v.as_str()) {
            Some(c) => c.to_string(),
            None => match detect_test_command(self.ws.root()) {
                Some(c) => c,
                None => {
                    return ToolOutput::err(
                        &call.id,
                        "could not detect a test runner (no Cargo.toml, package.json, \
                         pyproject.toml, or Makefile); pass 'command' explicitly",
                    );
                }
            },
        };
        let command = match call.args.get("filter").and_then(|v| v.as_str()) {
            Some(f) => format!("{command} {f}"),
            None => command,
        };

        debug!(cmd = %command, "run_tests tool");

        let run = match run_with_timeout(
            &command,
            self.ws.root(),
            None,
            Duration::from_secs(self.timeout_secs),
        )
        .await
        {
            Ok(r) => r,
            Err(e) => return ToolOutput::err(&call.id, format!("spawn error: {e}")),
        };

        let combined = format!("{}\n{}", run.stdout, run.stderr);

        if run.timed_out {
            let mut out = ToolOutput::err(
                &call.id,
                format!("test run timed out after {}s and was terminated", self.timeout_secs),
            );
            out.value["timedOut"] = json!(true);
            out.value["output"] = json!(head_tail_truncate(&combined));
            return out;
        }

        let (passed, failed) = parse_test_counts(&combined);
        let failures = extract_failures(&combined);
        let success = run.exit_code == Some(0);

        self.ws.record_test_report(TestReport {
            command: command.clone(),
            passed,
            failed,
            success,
            failures: failures.clone(),
            completed_at: chrono::Utc::now(),
        });

        ToolOutput::ok(
            &call.id,
            json!({
                "command": command,
                "passed": passed,
                "failed": failed,
                "testsPassed": success,
                "failures": failures,
                "output": head_tail_truncate(&combined),
            }),
        )
    }
}

/// Query the cached result of the most recent run.  Asking before any run is
/// an error, not an empty success.
pub struct GetTestStatusTool {
    pub ws: Arc<Workspace>,
}

#[async_trait]
impl Tool for GetTestStatusTool {
    fn name(&self) -> &str {
        "get_test_status"
    }

    fn description(&self) -> &str {
        "Summary of the most recent run_tests invocation in this session."
    }

    fn parameters_schema(&self) -> Value {
        json!({ "type": "object", "properties": {} })
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::Tests
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        match self.ws.last_test_report() {
            Some(report) => ToolOutput::ok(
                &call.id,
                json!({
                    "command": report.command,
                    "passed": report.passed,
                    "failed": report.failed,
                    "testsPassed": report.success,
                    "failures": report.failures,
                    "completedAt": report.completed_at.to_rfc3339(),
                }),
            ),
            None => ToolOutput::err(
                &call.id,
                "no test run recorded in this session; call run_tests first",
            ),
        }
    }
}

/// Pick a test command from the project layout.
fn detect_test_command(root: &std::path::Path) -> Option<String> {
    if root.join("Cargo.toml").exists() {
        return Some("cargo test".to_string());
    }
    if root.join("package.json").exists() {
        return Some("npm test --silent".to_string());
    }
    if root.join("pyproject.toml").exists()
        || root.join("pytest.ini").exists()
        || root.join("setup.py").exists()
    {
        return Some("python -m pytest -q".to_string());
    }
    if root.join("Makefile").exists() {
        return Some("make test".to_string());
    }
    None
}

/// Parse pass/fail counts from combined runner output.  Understands the
/// cargo, pytest, and jest/mocha summary formats; unknown formats yield
/// zeros rather than an error.
fn parse_test_counts(output: &str) -> (u32, u32) {
    let mut passed = 0u32;
    let mut failed = 0u32;

    // cargo: "test result: ok. 12 passed; 0 failed; ..." (one line per suite)
    let cargo = regex::Regex::new(r"(\d+) passed; (\d+) failed").unwrap();
    for cap in cargo.captures_iter(output) {
        passed += cap[1].parse::<u32>().unwrap_or(0);
        failed += cap[2].parse::<u32>().unwrap_or(0);
    }
    if passed > 0 || failed > 0 {
        return (passed, failed);
    }

    // pytest: "3 passed", "1 failed, 2 passed" / jest: "Tests: 1 failed, 3 passed"
    let re_passed = regex::Regex::new(r"(\d+) passed").unwrap();
    let re_failed = regex::Regex::new(r"(\d+) failed").unwrap();
    if let Some(cap) = re_passed.captures(output) {
        passed = cap[1].parse().unwrap_or(0);
    }
    if let Some(cap) = re_failed.captures(output) {
        failed = cap[1].parse().unwrap_or(0);
    }
    (passed, failed)
}

/// Collect failure excerpts: test names and assertion lines, capped.
fn extract_failures(output: &str) -> Vec<String> {
    const MAX_EXCERPTS: usize = 20;
    output
        .lines()
        .filter(|l| {
            let t = l.trim();
            t.contains("FAILED")
                || t.ends_with("... FAILED")
                || t.starts_with("FAIL ")
                || t.starts_with("AssertionError")
                || t.starts_with("assertion `")
                || t.starts_with("Error:")
        })
        .take(MAX_EXCERPTS)
        .map(|l| l.trim().to_string())
        .collect()
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn call(name: &str, args: serde_json::Value) -> ToolCall {
        ToolCall {
            id: "t1".into(),
            name: name.into(),
            args,
        }
    }

    // ── Runner detection ──────────────────────────────────────────────────────

    #[test]
    fn detects_cargo_before_anything_else() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Cargo.toml"), "[package]").unwrap();
        std::fs::write(dir.path().join("Makefile"), "test:").unwrap();
        assert_eq!(detect_test_command(dir.path()).unwrap(), "cargo test");
    }

    #[test]
    fn detects_npm_and_pytest() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("package.json"), "{}").unwrap();
        assert!(detect_test_command(dir.path()).unwrap().starts_with("npm"));

        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("pyproject.toml"), "").unwrap();
        assert!(detect_test_command(dir.path()).unwrap().contains("pytest"));
    }

    #[test]
    fn empty_dir_detects_nothing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(detect_test_command(dir.path()).is_none());
    }

    // ── Output parsing ────────────────────────────────────────────────────────

    #[test]
    fn parses_cargo_summary_lines() {
        let out = "test result: ok. 12 passed; 0 failed; 0 ignored\n\
                   test result: FAILED. 3 passed; 2 failed; 0 ignored\n";
        assert_eq!(parse_test_counts(out), (15, 2));
    }

    #[test]
    fn parses_pytest_summary() {
        let out = "==== 1 failed, 7 passed in 0.21s ====";
        assert_eq!(parse_test_counts(out), (7, 1));
    }

    #[test]
    fn unknown_format_yields_zeros() {
        assert_eq!(parse_test_counts("All good, trust me"), (0, 0));
    }

    #[test]
    fn failure_excerpts_capture_cargo_failures() {
        let out = "test mode::commits ... FAILED\ntest gate::allows ... ok\n";
        let failures = extract_failures(out);
        assert_eq!(failures.len(), 1);
        assert!(failures[0].contains("mode::commits"));
    }

    // ── Execution ─────────────────────────────────────────────────────────────

    #[tokio::test]
    async fn explicit_command_runs_and_caches_report() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Arc::new(Workspace::new(dir.path()));
        let t = RunTestsTool {
            ws: ws.clone(),
            timeout_secs: 30,
        };
        let out = t
            .execute(&call(
                "run_tests",
                json!({"command": "echo '2 passed, 0 failed'"}),
            ))
            .await;
        assert!(!out.is_error, "{}", out.content());
        assert_eq!(out.value["passed"], json!(2));
        assert_eq!(out.value["testsPassed"], json!(true));
        assert!(ws.last_test_report().is_some());
    }

    #[tokio::test]
    async fn no_runner_detected_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let t = RunTestsTool {
            ws: Arc::new(Workspace::new(dir.path())),
            timeout_secs: 30,
        };
        let out = t.execute(&call("run_tests", json!({}))).await;
        assert!(out.is_error);
        assert!(out.message().unwrap().contains("detect"));
    }

    #[tokio::test]
    async fn status_before_any_run_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let t = GetTestStatusTool {
            ws: Arc::new(Workspace::new(dir.path())),
        };
        let out = t.execute(&call("get_test_status", json!({}))).await;
        assert!(out.is_error);
        assert!(out.message().unwrap().contains("run_tests first"));
    }

    #[tokio::test]
    async fn status_reflects_the_cached_run() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Arc::new(Workspace::new(dir.path()));
        ws.record_test_report(TestReport {
            command: "cargo test".into(),
            passed: 9,
            failed: 1,
            success: false,
            failures: vec!["test a ... FAILED".into()],
            completed_at: chrono::Utc::now(),
        });
        let t = GetTestStatusTool { ws };
        let out = t.execute(&call("get_test_status", json!({}))).await;
        assert!(!out.is_error);
        assert_eq!(out.value["passed"], json!(9));
        assert_eq!(out.value["failed"], json!(1));
        assert_eq!(out.value["testsPassed"], json!(false));
    }
}
