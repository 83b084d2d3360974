// Copyright (c) 2024-2026 Harbor Contributors
//
// SPDX-License-Identifier: MIT
use std::sync::Arc;

use serde_json::json;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use harbor_config::{AgentConfig, AgentMode};
use harbor_tools::Dispatcher;

use crate::events::AgentEvent;
use crate::mode::{
    self, Evaluation, ModeState, TransitionSource,
};
use crate::provider::{ChatMessage, ModelProvider};

/// Counters exposed to interfaces for the session footer.
#[derive(Debug, Clone, Copy, Default)]
pub struct AgentStats {
    pub turns: usize,
    pub tool_calls: usize,
    pub tool_errors: usize,
    pub mode_changes: usize,
}

/// The agent loop: owns the conversation, drives model ↔ tool rounds, and is
/// the single writer of the session's [`ModeState`].
///
/// Single-threaded per session: tool calls within one run are awaited
/// sequentially, and callers must serialize calls to [`Agent::run`].
pub struct Agent {
    provider: Arc<dyn ModelProvider>,
    dispatcher: Arc<Dispatcher>,
    config: Arc<AgentConfig>,
    mode_state: ModeState,
    messages: Vec<ChatMessage>,
    stats: AgentStats,
    /// Session-wide dry-run requested by config/CLI; a mode's
    /// default_dry_run is OR-ed on top of this
    base_dry_run: bool,
}

impl Agent {
    pub fn new(
        provider: Arc<dyn ModelProvider>,
        dispatcher: Arc<Dispatcher>,
        config: Arc<AgentConfig>,
        base_dry_run: bool,
    ) -> Self {
        let mode_state = ModeState::new(config.default_mode);
        let agent = Self {
            provider,
            dispatcher,
            config,
            mode_state,
            messages: Vec::new(),
            stats: AgentStats::default(),
            base_dry_run,
        };
        agent.apply_mode_dry_run();
        agent
    }

    pub fn mode(&self) -> AgentMode {
        self.mode_state.current
    }

    pub fn mode_state(&self) -> &ModeState {
        &self.mode_state
    }

    pub fn stats(&self) -> AgentStats {
        self.stats
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn set_messages(&mut self, messages: Vec<ChatMessage>) {
        self.messages = messages;
    }

    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Switch modes on behalf of the user.  User intent is authoritative, so
    /// this commits immediately; the returned evaluation still carries
    /// `requires_confirmation` for interfaces that want to double-announce.
    pub fn set_mode_from_user(&mut self, mode: AgentMode, reason: &str) -> Evaluation {
        let state = self.mode_state.clone();
        let state = mode::request_change(state, mode, reason, TransitionSource::User);
        let eval = mode::evaluate(&state, self.config.auto_approval);
        self.mode_state = mode::commit(state, mode, reason);
        self.stats.mode_changes += 1;
        self.apply_mode_dry_run();
        info!(%mode, %reason, "mode changed by user");
        eval
    }

    /// Resolve a transition left pending because it required confirmation.
    /// Returns the committed mode on approval, `None` on rejection or when
    /// nothing was pending.
    pub fn confirm_pending_transition(&mut self, approve: bool) -> Option<AgentMode> {
        let pending = self.mode_state.pending_request.clone()?;
        let state = self.mode_state.clone();
        if approve {
            self.mode_state = mode::commit(state, pending.target_mode, &pending.reason);
            self.stats.mode_changes += 1;
            self.apply_mode_dry_run();
            Some(pending.target_mode)
        } else {
            let mut state = state;
            state.pending_request = None;
            state.transition_in_progress = None;
            self.mode_state = state;
            None
        }
    }

    /// Run one user turn to completion, emitting events on `tx`.
    pub async fn run(&mut self, user_text: &str, tx: mpsc::Sender<AgentEvent>) -> anyhow::Result<()> {
        let (_cancel_tx, cancel_rx) = tokio::sync::oneshot::channel();
        self.run_with_cancel(user_text, tx, cancel_rx).await
    }

    /// Like [`Agent::run`] but interruptible: when `cancel` resolves (sent or
    /// dropped), the loop stops at the next await point.  Text already
    /// streamed has been delivered through `tx`.
    pub async fn run_with_cancel(
        &mut self,
        user_text: &str,
        tx: mpsc::Sender<AgentEvent>,
        mut cancel: tokio::sync::oneshot::Receiver<()>,
    ) -> anyhow::Result<()> {
        if self.messages.is_empty() {
            self.messages.push(ChatMessage::system(
                self.mode_state.current.capabilities().prompt,
            ));
        }
        self.messages.push(ChatMessage::user(user_text));
        self.stats.turns += 1;

        let mut rounds = 0usize;
        loop {
            // Both an explicit cancel and a dropped sender stop the run.
            match cancel.try_recv() {
                Err(tokio::sync::oneshot::error::TryRecvError::Empty) => {}
                _ => {
                    let _ = tx.send(AgentEvent::Warning("turn cancelled".into())).await;
                    let _ = tx.send(AgentEvent::Complete).await;
                    return Ok(());
                }
            }

            rounds += 1;
            if rounds > self.config.max_turns {
                let _ = tx
                    .send(AgentEvent::Warning(format!(
                        "tool-call budget exhausted after {} rounds",
                        self.config.max_turns
                    )))
                    .await;
                let _ = tx.send(AgentEvent::Complete).await;
                return Ok(());
            }

            let mode = self.mode_state.current;
            // Recomputed every round: dynamic tool availability may have
            // changed, and a mode switch narrows the manifest.
            let manifest = self.dispatcher.tool_manifest(mode);

            let turn = tokio::select! {
                biased;
                _ = &mut cancel => {
                    let _ = tx.send(AgentEvent::Warning("turn cancelled".into())).await;
                    let _ = tx.send(AgentEvent::Complete).await;
                    return Ok(());
                }
                result = self.provider.complete(&self.messages, &manifest) => result,
            };

            let turn = match turn {
                Ok(t) => t,
                Err(e) => {
                    let _ = tx.send(AgentEvent::Error(format!("model error: {e}"))).await;
                    return Err(e);
                }
            };

            if let Some(thinking) = &turn.thinking {
                let _ = tx.send(AgentEvent::Thinking(thinking.clone())).await;
            }

            let _ = tx.send(AgentEvent::StreamStart).await;
            if !turn.text.is_empty() {
                let _ = tx.send(AgentEvent::StreamText(turn.text.clone())).await;
            }
            let _ = tx.send(AgentEvent::StreamEnd).await;

            self.handle_directive(&turn.text, &tx).await;

            let display = mode::strip_directives(&turn.text);
            if !display.is_empty() {
                let _ = tx.send(AgentEvent::Response(display.clone())).await;
                self.messages.push(ChatMessage::assistant(display));
            }

            if turn.tool_calls.is_empty() {
                let _ = tx.send(AgentEvent::Complete).await;
                return Ok(());
            }

            // Sequential by design: no two tool calls from one run overlap.
            let mode = self.mode_state.current;
            for call in &turn.tool_calls {
                let _ = tx
                    .send(AgentEvent::ToolCall {
                        id: call.id.clone(),
                        name: call.name.clone(),
                        args: call.args.clone(),
                    })
                    .await;

                let out = self
                    .dispatcher
                    .execute(mode, &call.id, &call.name, Some(call.args.clone()))
                    .await;

                self.stats.tool_calls += 1;
                if out.is_error {
                    self.stats.tool_errors += 1;
                    debug!(tool = %call.name, "tool error: {}", out.content());
                }

                let _ = tx
                    .send(AgentEvent::ToolResult {
                        id: call.id.clone(),
                        name: call.name.clone(),
                        output: out.value.clone(),
                        is_error: out.is_error,
                    })
                    .await;

                self.messages.push(ChatMessage::tool(
                    json!({ "tool": call.name, "result": out.value }).to_string(),
                ));
            }
        }
    }

    /// Apply an embedded mode directive from model text, honoring the
    /// auto-approval policy and the confirmation rule.
    async fn handle_directive(&mut self, text: &str, tx: &mpsc::Sender<AgentEvent>) {
        let Some(directive) = mode::parse_directive(text) else {
            return;
        };

        let state = self.mode_state.clone();
        let state = mode::request_change(
            state,
            directive.mode,
            &directive.reason,
            TransitionSource::Model,
        );
        let eval = mode::evaluate(&state, self.config.auto_approval);

        if eval.approved && !eval.requires_confirmation {
            self.mode_state = mode::commit(state, directive.mode, &directive.reason);
            self.stats.mode_changes += 1;
            self.apply_mode_dry_run();
            let _ = tx
                .send(AgentEvent::ModeChanged {
                    mode: directive.mode,
                    reason: directive.reason,
                })
                .await;
        } else if eval.approved {
            // Approved but gated on confirmation: leave the request pending
            // for confirm_pending_transition and tell the interfaces.
            self.mode_state = mode::mark_in_progress(state, directive.mode, true);
            let _ = tx
                .send(AgentEvent::Warning(format!(
                    "mode change to {} awaits confirmation: {}",
                    directive.mode, directive.reason
                )))
                .await;
        } else {
            self.mode_state = state;
            let reason = eval
                .reason
                .unwrap_or_else(|| "denied by policy".to_string());
            warn!(target_mode = %directive.mode, "mode change denied: {reason}");
            let _ = tx
                .send(AgentEvent::Warning(format!(
                    "mode change to {} denied: {reason}",
                    directive.mode
                )))
                .await;
        }
    }

    /// Dry-run is session-wide: the CLI/config base OR the current mode's
    /// default.
    fn apply_mode_dry_run(&self) {
        let caps = self.mode_state.current.capabilities();
        self.dispatcher
            .workspace()
            .set_dry_run(self.base_dry_run || caps.default_dry_run);
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
