// Copyright (c) 2024-2026 Harbor Contributors
//
// SPDX-License-Identifier: MIT
use serde_json::Value;

use harbor_config::AgentMode;

/// Events emitted by the agent during a single turn.
/// Consumers (terminal renderer, session bridge) subscribe to these to drive
/// their output.  Ephemeral — never persisted as-is.
#[derive(Debug, Clone)]
pub enum AgentEvent {
    /// A reasoning block from the model, shown dimmed by interfaces
    Thinking(String),
    /// The model started producing a response
    StreamStart,
    /// A chunk of streamed response text
    StreamText(String),
    /// The model finished streaming the current response
    StreamEnd,
    /// The model requested a tool call
    ToolCall {
        id: String,
        name: String,
        args: Value,
    },
    /// A tool call finished
    ToolResult {
        id: String,
        name: String,
        output: Value,
        is_error: bool,
    },
    /// The finished, directive-stripped response text for display
    Response(String),
    /// The operating mode changed
    ModeChanged { mode: AgentMode, reason: String },
    /// A recoverable error occurred (the turn continues or ends cleanly)
    Error(String),
    /// Advisory condition: denied mode switch, budget exhaustion, etc.
    Warning(String),
    /// The agent has finished processing the current user turn
    Complete,
}
