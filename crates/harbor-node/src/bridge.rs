// Copyright (c) 2024-2026 Harbor Contributors
//
// SPDX-License-Identifier: Apache-2.0
//!
//! `SessionBridge` — one agent session, observable and drivable from a
//! terminal interface and any number of browser sockets.
//!
//! # Design
//!
//! ```text
//!   terminal listener ──┐
//!                       ├──► mpsc::Sender<BridgeCommand> ──► SessionBridge
//!   WS handler × N ─────┘                                         │
//!                                                      owns Agent │
//!                                                       runs turn │
//!   terminal listener ◄──┐                                        │
//!                        ├── broadcast::Receiver<ServerFrame> ◄───┘
//!   WS handler × N ◄─────┘
//!
//!   spawned run task ──► completion_tx ──► bridge (clears `running`)
//! ```
//!
//! Transport handlers send commands through a shared mpsc channel; the
//! bridge processes them sequentially (the agent is not re-entrant) and
//! broadcasts frames to every subscriber.  Delivery is per-client
//! best-effort: a lagged or closed receiver never blocks the agent loop.
//!
//! Only one user turn may be in flight.  A `user_message` arriving while
//! `running` is answered with `error {busy: true}` and dropped — busy
//! rejection, not queuing.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot, Mutex};
use tracing::{debug, info, warn};

use harbor_config::AgentMode;
use harbor_core::{Agent, AgentEvent};

use crate::error::BridgeError;
use crate::protocol::{frame_from_event, MessageSource, ServerFrame};

/// Broadcast capacity: frames are small; slow clients older than this many
/// frames see a lag notice instead of stalling everyone else.
const EVENT_CAPACITY: usize = 1024;

#[derive(Debug)]
pub enum BridgeCommand {
    UserMessage {
        content: String,
        source: MessageSource,
    },
    ModeRequest {
        mode: AgentMode,
        reason: Option<String>,
    },
    ConfirmMode {
        approve: bool,
    },
    Cancel,
}

/// Cheap-to-clone handle held by every transport.
#[derive(Clone)]
pub struct BridgeHandle {
    cmd_tx: mpsc::Sender<BridgeCommand>,
    event_tx: broadcast::Sender<ServerFrame>,
}

impl BridgeHandle {
    pub async fn send(&self, cmd: BridgeCommand) -> Result<(), BridgeError> {
        self.cmd_tx
            .send(cmd)
            .await
            .map_err(|_| BridgeError::BridgeClosed)
    }

    /// The single ingress point for a new user turn, whichever interface it
    /// came from.
    pub async fn submit_user_message(
        &self,
        content: impl Into<String>,
        source: MessageSource,
    ) -> Result<(), BridgeError> {
        self.send(BridgeCommand::UserMessage {
            content: content.into(),
            source,
        })
        .await
    }

    /// Register a client: a subscription on the broadcast stream.  Dropping
    /// the receiver unregisters it; the bridge holds no other client state.
    pub fn subscribe(&self) -> broadcast::Receiver<ServerFrame> {
        self.event_tx.subscribe()
    }
}

pub struct SessionBridge {
    agent: Arc<Mutex<Agent>>,
    cmd_rx: mpsc::Receiver<BridgeCommand>,
    event_tx: broadcast::Sender<ServerFrame>,
    /// Run tasks report back here so the bridge can accept the next turn.
    completion_tx: mpsc::Sender<()>,
    completion_rx: mpsc::Receiver<()>,
    running: bool,
    cancel_tx: Option<oneshot::Sender<()>>,
}

impl SessionBridge {
    /// Construct the bridge and a handle for transports.  Distribute clones
    /// of the handle **before** calling [`SessionBridge::run`].
    pub fn new(agent: Agent) -> (Self, BridgeHandle) {
        let (cmd_tx, cmd_rx) = mpsc::channel(256);
        let (event_tx, _) = broadcast::channel(EVENT_CAPACITY);
        let (completion_tx, completion_rx) = mpsc::channel(8);

        let handle = BridgeHandle {
            cmd_tx,
            event_tx: event_tx.clone(),
        };

        let bridge = Self {
            agent: Arc::new(Mutex::new(agent)),
            cmd_rx,
            event_tx,
            completion_tx,
            completion_rx,
            running: false,
            cancel_tx: None,
        };

        (bridge, handle)
    }

    /// Bridge event loop.  Returns when every handle is dropped.
    pub async fn run(mut self) {
        info!("session bridge started");
        loop {
            tokio::select! {
                cmd = self.cmd_rx.recv() => {
                    let Some(cmd) = cmd else { break };
                    self.handle_command(cmd).await;
                }
                Some(()) = self.completion_rx.recv() => {
                    self.running = false;
                    self.cancel_tx = None;
                }
            }
        }
        info!("session bridge stopped");
    }

    async fn handle_command(&mut self, cmd: BridgeCommand) {
        match cmd {
            BridgeCommand::UserMessage { content, source } => {
                self.handle_user_message(content, source).await;
            }
            BridgeCommand::ModeRequest { mode, reason } => {
                // Mode changes apply between turns; while a turn holds the
                // agent, taking the lock here would stall cancel handling.
                if self.running {
                    self.broadcast(ServerFrame::Error {
                        message: "a turn is running; switch modes after it completes".to_string(),
                        busy: Some(true),
                    });
                    return;
                }
                let reason = reason.unwrap_or_else(|| "user request".to_string());
                let mut agent = self.agent.lock().await;
                agent.set_mode_from_user(mode, &reason);
                self.broadcast(ServerFrame::ModeChanged { mode, reason });
            }
            BridgeCommand::ConfirmMode { approve } => {
                if self.running {
                    self.broadcast(ServerFrame::Error {
                        message: "a turn is running; confirm after it completes".to_string(),
                        busy: Some(true),
                    });
                    return;
                }
                let mut agent = self.agent.lock().await;
                match agent.confirm_pending_transition(approve) {
                    Some(mode) => self.broadcast(ServerFrame::ModeChanged {
                        mode,
                        reason: "confirmed by user".to_string(),
                    }),
                    None => self.broadcast(ServerFrame::Warning {
                        message: if approve {
                            "no mode transition was pending".to_string()
                        } else {
                            "mode transition rejected".to_string()
                        },
                    }),
                }
            }
            BridgeCommand::Cancel => {
                if let Some(tx) = self.cancel_tx.take() {
                    info!("turn cancelled by user");
                    let _ = tx.send(());
                } else {
                    self.broadcast(ServerFrame::Warning {
                        message: "nothing to cancel".to_string(),
                    });
                }
            }
        }
    }

    async fn handle_user_message(&mut self, content: String, source: MessageSource) {
        if self.running {
            // The one true concurrency hazard: a second turn while one is in
            // flight.  Chosen policy is rejection, not queuing.
            warn!(%source, "user message rejected: turn already running");
            self.broadcast(ServerFrame::Error {
                message: "a turn is already running; wait for it to complete".to_string(),
                busy: Some(true),
            });
            return;
        }

        self.running = true;
        self.broadcast(ServerFrame::UserMessage {
            content: content.clone(),
            source,
        });

        let (cancel_tx, cancel_rx) = oneshot::channel();
        self.cancel_tx = Some(cancel_tx);

        let (event_tx, mut event_rx) = mpsc::channel::<AgentEvent>(512);
        let agent = self.agent.clone();

        // The run goes to its own task so the bridge loop stays responsive
        // (cancel and busy replies must not wait for the turn).
        tokio::spawn(async move {
            let mut agent = agent.lock().await;
            if let Err(e) = agent.run_with_cancel(&content, event_tx, cancel_rx).await {
                warn!("agent run error: {e}");
            }
        });

        // Fan agent events out to every subscriber, then report completion.
        let broadcast_tx = self.event_tx.clone();
        let completion_tx = self.completion_tx.clone();
        tokio::spawn(async move {
            while let Some(ev) = event_rx.recv().await {
                if let AgentEvent::ToolCall { ref name, .. } = ev {
                    debug!(tool = %name, "tool call");
                }
                let _ = broadcast_tx.send(frame_from_event(ev));
            }
            let _ = completion_tx.send(()).await;
        });
    }

    fn broadcast(&self, frame: ServerFrame) {
        // No subscribers is fine — nobody connected yet.
        let _ = self.event_tx.send(frame);
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
