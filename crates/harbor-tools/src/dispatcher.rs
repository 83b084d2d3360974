// Copyright (c) 2024-2026 Harbor Contributors
//
// SPDX-License-Identifier: MIT
use std::sync::Arc;

use serde_json::{json, Value};
use tracing::{debug, warn};

use harbor_config::{AgentMode, ToolsConfig};

use crate::builtin;
use crate::gate::ToolPermissionGate;
use crate::registry::{DynamicRegistry, ToolRegistry, ToolSchema};
use crate::safety::CommandPolicy;
use crate::workspace::Workspace;
use crate::{ToolCall, ToolOutput};

/// The single choke point through which every effectful action reaches the
/// host filesystem, shell, or version-control state.
///
/// Dispatch is two-path: built-in tools go through the permission gate,
/// safety assessment, and schema validation; dynamically discovered tools
/// (`server::tool`, plugins) are routed directly to their external handler
/// and none of those steps apply.
pub struct Dispatcher {
    builtin: ToolRegistry,
    dynamic: Arc<DynamicRegistry>,
    policy: CommandPolicy,
    workspace: Arc<Workspace>,
}

impl Dispatcher {
    pub fn new(
        workspace: Arc<Workspace>,
        cfg: &ToolsConfig,
        dynamic: Arc<DynamicRegistry>,
    ) -> Self {
        let builtin = builtin::registry(workspace.clone(), cfg, dynamic.clone());
        Self {
            builtin,
            dynamic,
            policy: CommandPolicy::from_config(cfg),
            workspace,
        }
    }

    pub fn workspace(&self) -> &Arc<Workspace> {
        &self.workspace
    }

    pub fn dynamic(&self) -> &Arc<DynamicRegistry> {
        &self.dynamic
    }

    /// The tool manifest offered to the model for one completion call:
    /// static schemas allowed in `mode` plus every *currently* registered
    /// dynamic schema.  Rebuilt on every call — dynamic availability changes
    /// between agent turns.
    pub fn tool_manifest(&self, mode: AgentMode) -> Vec<ToolSchema> {
        let mut schemas = self.builtin.schemas_for_mode(mode);
        schemas.extend(self.dynamic.schemas());
        schemas
    }

    /// Normalize raw model-supplied arguments to an object.
    ///
    /// The raw input may arrive as a JSON-encoded string, a structured
    /// object, null, or absent; anything that does not parse to an object
    /// becomes the empty object.
    pub fn normalize_input(raw: Option<Value>) -> Value {
        match raw {
            Some(Value::Object(m)) => Value::Object(m),
            Some(Value::String(s)) => match serde_json::from_str::<Value>(&s) {
                Ok(Value::Object(m)) => Value::Object(m),
                _ => json!({}),
            },
            _ => json!({}),
        }
    }

    /// Execute one tool call under `mode`.  Never panics or returns `Err`
    /// across this boundary — every failure is an error envelope.
    pub async fn execute(
        &self,
        mode: AgentMode,
        call_id: &str,
        name: &str,
        raw_input: Option<Value>,
    ) -> ToolOutput {
        let call = ToolCall {
            id: call_id.to_string(),
            name: name.to_string(),
            args: Self::normalize_input(raw_input),
        };

        // Dynamic tools bypass the gate, the safety assessment, and schema
        // validation entirely; their result is returned unchanged.
        if call.name.contains("::") || self.dynamic.contains(&call.name) {
            debug!(tool = %call.name, "dynamic dispatch");
            return self.dynamic.execute(&call).await;
        }

        let decision = ToolPermissionGate::is_allowed(mode, &call.name);
        if !decision.allowed {
            let reason = decision
                .reason
                .unwrap_or_else(|| "not allowed".to_string());
            warn!(tool = %call.name, %mode, "denied: {reason}");
            return ToolOutput::err(&call.id, reason);
        }

        // Safety assessment.  Deny-listed shell commands are refused before
        // any execution; high-risk commands run but carry a safer-alternative
        // suggestion in the result metadata.
        let mut safety_meta = None;
        if call.name == "run_command" {
            if let Some(command) = call.args.get("command").and_then(|v| v.as_str()) {
                if self.policy.is_denied(command) {
                    return ToolOutput::blocked(
                        &call.id,
                        format!("command matches the deny-list and was not executed: {command}"),
                    );
                }
                safety_meta = self.policy.assess_command(command).metadata();
            }
        }

        let Some(tool) = self.builtin.get(&call.name) else {
            // Gate and registry are built from the same table; a miss here
            // means the registry was constructed without this tool.
            return ToolOutput::err(&call.id, format!("Unknown tool: {}", call.name));
        };

        // Schema-level required check.  Handlers re-validate types, but a
        // parameter marked required in the published schema is rejected here
        // so the schema and dispatcher can never drift apart.
        let schema = tool.parameters_schema();
        if let Some(missing) = first_missing_required(&schema, &call.args) {
            return ToolOutput::invalid(&call.id, &missing, &usage_example(&call.name, &schema));
        }

        debug!(tool = %call.name, %mode, "executing");
        let mut out = tool.execute(&call).await;

        if let (Some(meta), false) = (safety_meta, out.is_error) {
            out.value["safety"] = meta;
        }
        out
    }
}

/// First schema-required field absent from `args`, if any.
fn first_missing_required(schema: &Value, args: &Value) -> Option<String> {
    let required = schema.get("required")?.as_array()?;
    for field in required {
        let name = field.as_str()?;
        if args.get(name).is_none() {
            return Some(name.to_string());
        }
    }
    None
}

/// Render a usage example from a tool's parameter schema, e.g.
/// `read_file {"path": <string>, "start_line": <integer>}`.
fn usage_example(name: &str, schema: &Value) -> String {
    let mut parts = Vec::new();
    if let Some(props) = schema.get("properties").and_then(|p| p.as_object()) {
        for (field, spec) in props {
            let ty = spec.get("type").and_then(|t| t.as_str()).unwrap_or("value");
            parts.push(format!("\"{field}\": <{ty}>"));
        }
    }
    format!("{name} {{{}}}", parts.join(", "))
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
