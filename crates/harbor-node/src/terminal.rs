// Copyright (c) 2024-2026 Harbor Contributors
//
// SPDX-License-Identifier: Apache-2.0
//!
//! Raw interactive-shell pass-through.
//!
//! Each browser connection on this endpoint gets its own freshly spawned
//! PTY-backed shell: full-duplex byte streaming plus a resize signal path.
//! Nothing here touches the agent loop or the tool dispatcher — this is a
//! real terminal, not an agent action.
//!
//! Lifecycle: the first frame must be `terminal:create`; on socket close the
//! PTY master is dropped (the child sees EOF/SIGHUP) and, if the child is
//! still alive after the configured grace period, it is force-killed.

use std::io::{Read, Write};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use portable_pty::{native_pty_system, CommandBuilder, PtySize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::BridgeError;
use crate::protocol::{ClientFrame, ServerFrame};
use crate::ws::send_frame;

#[derive(Debug, Clone)]
pub struct TerminalSettings {
    /// Shell to spawn; `None` falls back to $SHELL, then /bin/sh
    pub shell: Option<String>,
    /// Grace period between the hangup and a forced kill
    pub kill_grace: Duration,
}

impl TerminalSettings {
    pub fn from_config(cfg: &harbor_config::NodeConfig) -> Self {
        Self {
            shell: cfg.terminal_shell.clone(),
            kill_grace: Duration::from_millis(cfg.terminal_kill_grace_ms),
        }
    }

    fn shell_program(&self) -> String {
        self.shell
            .clone()
            .or_else(|| std::env::var("SHELL").ok())
            .unwrap_or_else(|| "/bin/sh".to_string())
    }
}

/// HTTP handler for GET /terminal.
pub async fn terminal_handler(
    ws: WebSocketUpgrade,
    State(settings): State<Arc<TerminalSettings>>,
) -> Response {
    ws.on_upgrade(move |socket| handle_terminal(socket, settings))
}

pub async fn handle_terminal(mut socket: WebSocket, settings: Arc<TerminalSettings>) {
    info!("terminal client connected");

    // The first frame must create the PTY.
    let (cwd, cols, rows) = loop {
        match socket.recv().await {
            Some(Ok(Message::Text(text))) => match serde_json::from_str::<ClientFrame>(&text) {
                Ok(ClientFrame::TerminalCreate { cwd, cols, rows }) => break (cwd, cols, rows),
                Ok(_) => {
                    send_frame(&mut socket, &ServerFrame::Error {
                        message: "expected terminal:create as the first frame".to_string(),
                        busy: None,
                    })
                    .await;
                }
                Err(e) => {
                    send_frame(&mut socket, &ServerFrame::Error {
                        message: format!("invalid JSON frame: {e}"),
                        busy: None,
                    })
                    .await;
                }
            },
            Some(Ok(Message::Close(_))) | None => return,
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                debug!("terminal recv error: {e}");
                return;
            }
        }
    };

    let session = match PtySession::spawn(&settings, cwd, cols, rows) {
        Ok(s) => s,
        Err(e) => {
            warn!("PTY spawn failed: {e}");
            send_frame(&mut socket, &ServerFrame::Error {
                message: format!("failed to start terminal: {e}"),
                busy: None,
            })
            .await;
            return;
        }
    };

    send_frame(&mut socket, &ServerFrame::TerminalCreated { pid: session.pid }).await;

    run_duplex(socket, session, settings.kill_grace).await;
    info!("terminal client disconnected");
}

/// One live PTY with its child shell.
struct PtySession {
    master: Box<dyn portable_pty::MasterPty + Send>,
    child: Box<dyn portable_pty::Child + Send + Sync>,
    /// Bytes from the shell, pumped by a blocking reader task
    output_rx: mpsc::Receiver<Vec<u8>>,
    /// Bytes to the shell, drained by a blocking writer task
    input_tx: mpsc::Sender<Vec<u8>>,
    pid: Option<u32>,
}

impl PtySession {
    fn spawn(
        settings: &TerminalSettings,
        cwd: Option<String>,
        cols: u16,
        rows: u16,
    ) -> Result<Self, BridgeError> {
        let pty_system = native_pty_system();
        let pair = pty_system
            .openpty(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| BridgeError::Terminal(e.to_string()))?;

        let mut cmd = CommandBuilder::new(settings.shell_program());
        if let Some(dir) = cwd {
            cmd.cwd(dir);
        }
        let child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| BridgeError::Terminal(e.to_string()))?;
        let pid = child.process_id();
        // The slave side belongs to the child now.
        drop(pair.slave);

        let mut reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| BridgeError::Terminal(e.to_string()))?;
        let mut writer = pair
            .master
            .take_writer()
            .map_err(|e| BridgeError::Terminal(e.to_string()))?;

        // PTY I/O is blocking; pump it through channels from blocking tasks.
        let (output_tx, output_rx) = mpsc::channel::<Vec<u8>>(64);
        tokio::task::spawn_blocking(move || {
            let mut buf = [0u8; 8192];
            loop {
                match reader.read(&mut buf) {
                    Ok(0) | Err(_) => break,
                    Ok(n) => {
                        if output_tx.blocking_send(buf[..n].to_vec()).is_err() {
                            break;
                        }
                    }
                }
            }
        });

        let (input_tx, mut input_rx) = mpsc::channel::<Vec<u8>>(64);
        tokio::task::spawn_blocking(move || {
            while let Some(bytes) = input_rx.blocking_recv() {
                if writer.write_all(&bytes).is_err() {
                    break;
                }
                let _ = writer.flush();
            }
        });

        Ok(Self {
            master: pair.master,
            child,
            output_rx,
            input_tx,
            pid,
        })
    }

    fn resize(&self, cols: u16, rows: u16) {
        let _ = self.master.resize(PtySize {
            rows,
            cols,
            pixel_width: 0,
            pixel_height: 0,
        });
    }
}

async fn run_duplex(mut socket: WebSocket, mut session: PtySession, kill_grace: Duration) {
    loop {
        tokio::select! {
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ClientFrame>(&text) {
                            Ok(ClientFrame::TerminalInput { data }) => {
                                if session.input_tx.send(data.into_bytes()).await.is_err() {
                                    break;
                                }
                            }
                            Ok(ClientFrame::TerminalResize { cols, rows }) => {
                                session.resize(cols, rows);
                            }
                            Ok(_) => {} // agent frames have no meaning here
                            Err(e) => debug!("bad terminal frame: {e}"),
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!("terminal recv error: {e}");
                        break;
                    }
                }
            }
            chunk = session.output_rx.recv() => {
                match chunk {
                    Some(bytes) => {
                        let frame = ServerFrame::TerminalOutput {
                            data: String::from_utf8_lossy(&bytes).to_string(),
                        };
                        if let Ok(json) = serde_json::to_string(&frame) {
                            if socket.send(Message::Text(json)).await.is_err() {
                                break;
                            }
                        }
                    }
                    // Shell exited; tell the client by closing.
                    None => break,
                }
            }
        }
    }

    shutdown_child(session, kill_grace).await;
}

/// Hang up the PTY and reap the child: drop the master first (EOF/SIGHUP to
/// the foreground process group), then force-kill if it outlives the grace
/// period.
async fn shutdown_child(session: PtySession, kill_grace: Duration) {
    let PtySession {
        master,
        mut child,
        input_tx,
        ..
    } = session;
    drop(input_tx);
    drop(master);

    let deadline = tokio::time::Instant::now() + kill_grace;
    loop {
        match child.try_wait() {
            Ok(Some(status)) => {
                debug!(?status, "terminal child exited");
                return;
            }
            Ok(None) => {
                if tokio::time::Instant::now() >= deadline {
                    warn!("terminal child survived hangup; killing");
                    let _ = child.kill();
                    let _ = child.wait();
                    return;
                }
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
            Err(e) => {
                debug!("terminal child wait error: {e}");
                return;
            }
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> TerminalSettings {
        TerminalSettings {
            shell: Some("/bin/sh".to_string()),
            kill_grace: Duration::from_millis(500),
        }
    }

    #[tokio::test]
    async fn pty_spawn_reports_a_pid() {
        let s = PtySession::spawn(&settings(), None, 80, 24).unwrap();
        assert!(s.pid.is_some());
        shutdown_child(s, Duration::from_millis(500)).await;
    }

    #[tokio::test]
    async fn shell_output_reaches_the_channel() {
        let mut s = PtySession::spawn(&settings(), None, 80, 24).unwrap();
        s.input_tx
            .send(b"echo pty_works_here\n".to_vec())
            .await
            .unwrap();

        let mut seen = String::new();
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        while tokio::time::Instant::now() < deadline {
            match tokio::time::timeout(Duration::from_millis(500), s.output_rx.recv()).await {
                Ok(Some(bytes)) => {
                    seen.push_str(&String::from_utf8_lossy(&bytes));
                    if seen.contains("pty_works_here") {
                        break;
                    }
                }
                _ => break,
            }
        }
        assert!(seen.contains("pty_works_here"), "got: {seen}");
        shutdown_child(s, Duration::from_millis(500)).await;
    }

    #[tokio::test]
    async fn shutdown_terminates_the_child() {
        let s = PtySession::spawn(&settings(), None, 80, 24).unwrap();
        let pid = s.pid.unwrap();
        shutdown_child(s, Duration::from_millis(800)).await;

        // After shutdown the process must be gone (kill -0 fails).
        let alive = std::process::Command::new("kill")
            .args(["-0", &pid.to_string()])
            .status()
            .map(|s| s.success())
            .unwrap_or(false);
        assert!(!alive, "child {pid} still alive after shutdown");
    }

    #[tokio::test]
    async fn resize_does_not_error_on_live_pty() {
        let s = PtySession::spawn(&settings(), None, 80, 24).unwrap();
        s.resize(120, 40);
        shutdown_child(s, Duration::from_millis(500)).await;
    }

    #[test]
    fn shell_program_falls_back_to_sh() {
        let s = TerminalSettings {
            shell: None,
            kill_grace: Duration::from_millis(1),
        };
        // Whatever $SHELL is, the result is a non-empty program path.
        assert!(!s.shell_program().is_empty());
    }
}
