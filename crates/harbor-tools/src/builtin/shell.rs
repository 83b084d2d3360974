// Copyright (c) 2024-2026 Harbor Contributors
//
// SPDX-License-Identifier: Apache-2.0
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tracing::debug;

use harbor_config::ToolCategory;

use crate::tool::{Tool, ToolCall, ToolOutput};
use crate::workspace::Workspace;

/// Hard byte ceiling for combined stdout + stderr returned to the model.
/// 20 KB ≈ 5,000 tokens — keeps output well within the context window.
const OUTPUT_LIMIT_BYTES: usize = 20_000;

/// Number of lines to keep from the head of oversized output.
const HEAD_LINES: usize = 100;

/// Number of lines to keep from the tail of oversized output.
/// Errors and summaries almost always appear at the end of build/test output,
/// so preserving the tail is at least as important as preserving the head.
const TAIL_LINES: usize = 100;

pub struct RunCommandTool {
    pub ws: Arc<Workspace>,
    pub default_timeout_secs: u64,
}

#[async_trait]
impl Tool for RunCommandTool {
    fn name(&self) -> &str {
        "run_command"
    }

    fn description(&self) -> &str {
        "Execute a shell command in the workspace and return stdout, stderr, \
         and the exit code. Prefer non-interactive flags; commands that wait \
         for a TTY will hit the timeout. Pass 'stdin' to feed input to the \
         process (literal \\n sequences become newlines). Output is capped at \
         ~20 KB with the first and last 100 lines preserved."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "command": {
                    "type": "string",
                    "description": "The shell command to execute"
                },
                "stdin": {
                    "type": "string",
                    "description": "Input written to the process's stdin, then closed"
                },
                "timeout": {
                    "type": "integer",
                    "description": "Wall-clock timeout in seconds (default 120)"
                }
            },
            "required": ["command"]
        })
    }

    fn category(&self) -> ToolCategory {
        ToolCategory::ShellCommand
    }

    async fn execute(&self, call: &ToolCall) -> ToolOutput {
        let command = match call.args.get("command").and_then(|v| v.as_str()) {
            Some(c) => c.to_string(),
            None => {
                return ToolOutput::err(
                    &call.id,
                    "missing required parameter 'command'. Provide the shell command to execute",
                );
            }
        };
        let stdin = call
            .args
            .get("stdin")
            .and_then(|v| v.as_str())
            .map(|s| s.replace("\\n", "\n"));
        let timeout = call
            .args
            .get("timeout")
            .and_then(|v| v.as_u64())
            .unwrap_or(self.default_timeout_secs);

        debug!(cmd = %command, timeout, has_stdin = stdin.is_some(), "run_command tool");

        let run = run_with_timeout(
            &command,
            self.ws.root(),
            stdin,
            Duration::from_secs(timeout),
        )
        .await;

        let run = match run {
            Ok(r) => r,
            Err(e) => return ToolOutput::err(&call.id, format!("spawn error: {e}")),
        };

        let stdout = head_tail_truncate(&run.stdout);
        let stderr = head_tail_truncate(&run.stderr);
        let platform = std::env::consts::OS;

        if run.timed_out {
            // Whatever the process printed before the kill is still returned.
            let mut out = ToolOutput::err(
                &call.id,
                format!(
                    "command timed out after {timeout}s and was terminated; use \
                     non-interactive flags (e.g. --yes, --no-pager) or raise 'timeout'"
                ),
            );
            out.value["timedOut"] = json!(true);
            out.value["stdout"] = json!(stdout);
            out.value["stderr"] = json!(stderr);
            out.value["platform"] = json!(platform);
            return out;
        }

        let code = run.exit_code.unwrap_or(-1);
        if code == 0 {
            ToolOutput::ok(
                &call.id,
                json!({
                    "stdout": stdout,
                    "stderr": stderr,
                    "exitCode": 0,
                    "platform": platform,
                }),
            )
        } else {
            let mut out = ToolOutput::err(&call.id, format!("command exited with code {code}"));
            out.value["stdout"] = json!(stdout);
            out.value["stderr"] = json!(stderr);
            out.value["exitCode"] = json!(code);
            out.value["platform"] = json!(platform);
            out
        }
    }
}

/// Raw result of a subprocess run.
pub(crate) struct CommandRun {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
    pub timed_out: bool,
}

/// Spawn `bash -c <command>` and race completion against a wall-clock timer.
///
/// Output is drained by reader tasks while the process runs, so on timeout
/// the bytes captured so far survive the kill.  With `stdin` supplied the
/// process gets a piped stdin which is written and then closed; otherwise
/// stdin is /dev/null so TTY-probing programs skip interactive paths.
pub(crate) async fn run_with_timeout(
    command: &str,
    workdir: &std::path::Path,
    stdin: Option<String>,
    timeout: Duration,
) -> std::io::Result<CommandRun> {
    let mut cmd = Command::new("bash");
    cmd.arg("-c")
        .arg(command)
        .current_dir(workdir)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);
    if stdin.is_some() {
        cmd.stdin(Stdio::piped());
    } else {
        cmd.stdin(Stdio::null());
    }

    let mut child = cmd.spawn()?;

    if let (Some(input), Some(mut handle)) = (stdin, child.stdin.take()) {
        // Write then drop: closing stdin lets line-reading programs terminate.
        tokio::spawn(async move {
            let _ = handle.write_all(input.as_bytes()).await;
            let _ = handle.shutdown().await;
        });
    }

    let mut stdout_pipe = child.stdout.take().expect("stdout piped");
    let mut stderr_pipe = child.stderr.take().expect("stderr piped");
    let stdout_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        let _ = stdout_pipe.read_to_end(&mut buf).await;
        buf
    });
    let stderr_task = tokio::spawn(async move {
        let mut buf = Vec::new();
        let _ = stderr_pipe.read_to_end(&mut buf).await;
        buf
    });

    let (exit_code, timed_out) = match tokio::time::timeout(timeout, child.wait()).await {
        Ok(Ok(status)) => (status.code(), false),
        Ok(Err(e)) => return Err(e),
        Err(_) => {
            let _ = child.start_kill();
            let _ = child.wait().await;
            (None, true)
        }
    };

    // Pipes close once the child is gone, so the readers finish promptly.
    let stdout = stdout_task.await.unwrap_or_default();
    let stderr = stderr_task.await.unwrap_or_default();

    Ok(CommandRun {
        stdout: String::from_utf8_lossy(&stdout).to_string(),
        stderr: String::from_utf8_lossy(&stderr).to_string(),
        exit_code,
        timed_out,
    })
}

/// Truncate `s` to fit within `OUTPUT_LIMIT_BYTES`.
///
/// When truncation is needed the first `HEAD_LINES` and last `TAIL_LINES`
/// are kept verbatim, with an omission marker in the middle showing how much
/// was dropped.  The model always sees both the beginning of the output and
/// the end, where errors and summaries live.
pub(crate) fn head_tail_truncate(s: &str) -> String {
    if s.len() <= OUTPUT_LIMIT_BYTES {
        return s.to_string();
    }

    let lines: Vec<&str> = s.lines().collect();
    let total = lines.len();

    if total <= HEAD_LINES + TAIL_LINES {
        // Byte budget exceeded by very long lines; fall back to byte windows.
        let tail_start = s.len().saturating_sub(OUTPUT_LIMIT_BYTES / 2);
        let tail_str = &s[tail_start..];
        let head_end = (OUTPUT_LIMIT_BYTES / 2).min(s.len());
        let head_str = &s[..head_end];
        let omitted_bytes = s.len() - head_str.len() - tail_str.len();
        return format!("{head_str}\n...[{omitted_bytes} bytes omitted]...\n{tail_str}");
    }

    let head = lines[..HEAD_LINES].join("\n");
    let tail = lines[total - TAIL_LINES..].join("\n");
    let omitted_lines = total - HEAD_LINES - TAIL_LINES;
    let omitted_bytes = s.len().saturating_sub(head.len() + tail.len());

    format!("{head}\n...[{omitted_lines} lines / ~{omitted_bytes} bytes omitted]...\n{tail}")
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
