// Copyright (c) 2024-2026 Harbor Contributors
//
// SPDX-License-Identifier: MIT
use async_trait::async_trait;
use serde_json::{json, Value};

use harbor_config::ToolCategory;

/// A single tool invocation requested by the model.
#[derive(Debug, Clone)]
pub struct ToolCall {
    /// Opaque identifier returned by the model (forwarded verbatim)
    pub id: String,
    pub name: String,
    /// Normalized JSON arguments — always an object by the time a handler
    /// sees it (see `Dispatcher::normalize_input`)
    pub args: Value,
}

/// The result of executing a tool.
///
/// Every handler returns exactly one of two envelope shapes — there is no
/// partial third shape:
/// - success: a JSON object with `success: true` plus tool-specific fields;
/// - error: `{"error": true, "success": false, "message": "...",
///   "blocked": true?}`.
///
/// `value` is the envelope itself; `is_error` and `blocked` mirror the
/// envelope flags so callers can branch without re-reading JSON.
#[derive(Debug, Clone)]
pub struct ToolOutput {
    pub call_id: String,
    pub value: Value,
    pub is_error: bool,
    /// Policy sub-case: the call was refused before any execution
    pub blocked: bool,
}

impl ToolOutput {
    /// Successful result.  `fields` is merged with `success: true`.
    pub fn ok(call_id: impl Into<String>, fields: Value) -> Self {
        let mut value = match fields {
            Value::Object(m) => Value::Object(m),
            other => json!({ "value": other }),
        };
        value["success"] = json!(true);
        Self {
            call_id: call_id.into(),
            value,
            is_error: false,
            blocked: false,
        }
    }

    /// Error envelope containing a plain-text message.
    pub fn err(call_id: impl Into<String>, msg: impl Into<String>) -> Self {
        let msg = msg.into();
        Self {
            call_id: call_id.into(),
            value: json!({ "error": true, "success": false, "message": msg }),
            is_error: true,
            blocked: false,
        }
    }

    /// Policy refusal: like [`ToolOutput::err`] but tagged `blocked: true`.
    pub fn blocked(call_id: impl Into<String>, msg: impl Into<String>) -> Self {
        let msg = msg.into();
        Self {
            call_id: call_id.into(),
            value: json!({
                "error": true,
                "success": false,
                "blocked": true,
                "message": msg,
            }),
            is_error: true,
            blocked: true,
        }
    }

    /// Validation error naming the offending parameter and showing a usage
    /// example.  No side effect has occurred when this is returned.
    pub fn invalid(
        call_id: impl Into<String>,
        field: &str,
        usage: &str,
    ) -> Self {
        Self::err(
            call_id,
            format!("missing or invalid parameter '{field}'. Usage: {usage}"),
        )
    }

    /// Plain-text rendering of the envelope, fed back into the model context.
    pub fn content(&self) -> String {
        serde_json::to_string(&self.value).unwrap_or_else(|_| "{}".to_string())
    }

    /// The human-readable failure message, when this is an error envelope.
    pub fn message(&self) -> Option<&str> {
        self.value.get("message").and_then(|v| v.as_str())
    }
}

/// Trait that every built-in tool implements.
///
/// Built-ins carry a static [`ToolCategory`] used by the permission gate.
/// Dynamically discovered tools (MCP servers, plugins) implement
/// [`DynamicTool`] instead and are not gated.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str;
    /// JSON Schema for parameters.  The dispatcher rejects calls missing a
    /// field listed in `required`, so the schema and the handler's own
    /// validation must agree.
    fn parameters_schema(&self) -> Value;
    fn category(&self) -> ToolCategory;
    /// Execute the tool.  Failures are wrapped in [`ToolOutput::err`];
    /// handlers never panic across this boundary.
    async fn execute(&self, call: &ToolCall) -> ToolOutput;
}

/// An externally provided tool (`server::tool` naming convention, or a
/// plugin).  No category — the dispatcher routes these before the gate runs.
#[async_trait]
pub trait DynamicTool: Send + Sync {
    fn name(&self) -> &str;
    fn description(&self) -> &str {
        ""
    }
    fn parameters_schema(&self) -> Value {
        json!({ "type": "object" })
    }
    async fn execute(&self, call: &ToolCall) -> ToolOutput;
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
