// Copyright (c) 2024-2026 Harbor Contributors
//
// SPDX-License-Identifier: MIT
//!
//! Wire protocol between the bridge and its transport clients.
//!
//! Every frame is a JSON envelope `{type, data}`: `type` carries the agent
//! event tag (or a bridge/terminal-specific tag), `data` the payload.  The
//! same frames flow to the in-process terminal listener and to every browser
//! WebSocket — one serialization, N deliveries.
//!
//! # Typical session flow
//!
//! ```text
//! Client                               Bridge / Agent
//!    │                                     │
//!    │── user_message {content, source} ──►│  user_message echoed to all
//!    │                                     │  ... stream_text × N ...
//!    │◄─ stream_text {text} ───────────────│
//!    │◄─ tool_call {id, name} ─────────────│  (if tools needed)
//!    │◄─ tool_result {id, output} ─────────│
//!    │◄─ response {text} ──────────────────│
//!    │◄─ complete ─────────────────────────│
//!    │                                     │
//!    │── user_message {..} while running ─►│
//!    │◄─ error {busy: true} ───────────────│  (turn already in flight)
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

use harbor_config::AgentMode;
use harbor_core::AgentEvent;

/// Which interface a user message came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageSource {
    Tui,
    Webui,
}

impl std::fmt::Display for MessageSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MessageSource::Tui => write!(f, "tui"),
            MessageSource::Webui => write!(f, "webui"),
        }
    }
}

// ── Client → bridge frames ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ClientFrame {
    /// A new user turn, from any interface.
    UserMessage {
        content: String,
        source: MessageSource,
    },

    /// Explicit user request to switch modes.
    ModeRequest {
        mode: AgentMode,
        reason: Option<String>,
    },

    /// Resolve a mode transition that was parked awaiting confirmation.
    ConfirmMode { approve: bool },

    /// Interrupt the in-flight turn.
    Cancel,

    /// Raw-terminal transport: spawn a PTY-backed shell.
    #[serde(rename = "terminal:create")]
    TerminalCreate {
        cwd: Option<String>,
        cols: u16,
        rows: u16,
    },

    /// Raw-terminal transport: bytes for the shell's stdin.
    #[serde(rename = "terminal:input")]
    TerminalInput { data: String },

    /// Raw-terminal transport: window size change.
    #[serde(rename = "terminal:resize")]
    TerminalResize { cols: u16, rows: u16 },
}

// ── Bridge → client frames ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ServerFrame {
    Thinking { text: String },
    StreamStart,
    StreamText { text: String },
    StreamEnd,
    ToolCall { id: String, name: String, args: Value },
    ToolResult {
        id: String,
        name: String,
        output: Value,
        is_error: bool,
    },
    Response { text: String },
    ModeChanged { mode: AgentMode, reason: String },
    Warning { message: String },
    Error {
        message: String,
        /// Set when a user turn was rejected because one is already running
        #[serde(skip_serializing_if = "Option::is_none")]
        busy: Option<bool>,
    },
    Complete,

    /// Echo of an accepted user turn, so every interface can render it with
    /// its true origin (e.g. "(from webui)").
    UserMessage {
        content: String,
        source: MessageSource,
    },

    /// Raw-terminal transport: shell output bytes.
    #[serde(rename = "terminal:output")]
    TerminalOutput { data: String },

    /// Raw-terminal transport: the PTY child is alive.
    #[serde(rename = "terminal:created")]
    TerminalCreated { pid: Option<u32> },
}

/// Map an agent event onto its wire frame.
pub fn frame_from_event(ev: AgentEvent) -> ServerFrame {
    match ev {
        AgentEvent::Thinking(text) => ServerFrame::Thinking { text },
        AgentEvent::StreamStart => ServerFrame::StreamStart,
        AgentEvent::StreamText(text) => ServerFrame::StreamText { text },
        AgentEvent::StreamEnd => ServerFrame::StreamEnd,
        AgentEvent::ToolCall { id, name, args } => ServerFrame::ToolCall { id, name, args },
        AgentEvent::ToolResult {
            id,
            name,
            output,
            is_error,
        } => ServerFrame::ToolResult {
            id,
            name,
            output,
            is_error,
        },
        AgentEvent::Response(text) => ServerFrame::Response { text },
        AgentEvent::ModeChanged { mode, reason } => ServerFrame::ModeChanged { mode, reason },
        AgentEvent::Error(message) => ServerFrame::Error {
            message,
            busy: None,
        },
        AgentEvent::Warning(message) => ServerFrame::Warning { message },
        AgentEvent::Complete => ServerFrame::Complete,
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
