// Copyright (c) 2024-2026 Harbor Contributors
//
// SPDX-License-Identifier: MIT
use harbor_config::{AgentMode, ToolCategory};

/// Outcome of a permission check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateDecision {
    pub allowed: bool,
    pub reason: Option<String>,
}

impl GateDecision {
    fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
        }
    }
}

/// Static capability table: every built-in tool name and its category.
///
/// Dynamically discovered tools (`server::tool`, plugins) are not listed
/// here and never pass through the gate — the dispatcher routes them first.
pub const BUILTIN_TOOLS: &[(&str, ToolCategory)] = &[
    ("read_file", ToolCategory::ReadOnly),
    ("read_multiple_files", ToolCategory::ReadOnly),
    ("list_directory", ToolCategory::ReadOnly),
    ("search_files", ToolCategory::ReadOnly),
    ("get_mcp_status", ToolCategory::ReadOnly),
    ("write_file", ToolCategory::WriteFs),
    ("edit_file", ToolCategory::WriteFs),
    ("edit_lines", ToolCategory::WriteFs),
    ("insert_at_line", ToolCategory::WriteFs),
    ("create_directory", ToolCategory::WriteFs),
    ("delete_file", ToolCategory::WriteFs),
    ("move_file", ToolCategory::WriteFs),
    ("revert_file", ToolCategory::WriteFs),
    ("get_git_status", ToolCategory::GitRead),
    ("get_git_diff_summary", ToolCategory::GitRead),
    ("get_git_changed_files", ToolCategory::GitRead),
    ("git_show_diff", ToolCategory::GitRead),
    ("create_git_checkpoint", ToolCategory::GitMutation),
    ("revert_to_git_checkpoint", ToolCategory::GitMutation),
    ("run_command", ToolCategory::ShellCommand),
    ("run_tests", ToolCategory::Tests),
    ("get_test_status", ToolCategory::Tests),
    ("get_context", ToolCategory::Context),
    ("web_fetch", ToolCategory::Network),
];

/// Mode × category permission gate over the static tool table.
pub struct ToolPermissionGate;

impl ToolPermissionGate {
    /// Category of a built-in tool name, if known.
    pub fn category_of(tool_name: &str) -> Option<ToolCategory> {
        BUILTIN_TOOLS
            .iter()
            .find(|(name, _)| *name == tool_name)
            .map(|(_, cat)| *cat)
    }

    /// Whether `tool_name` may run in `mode`.
    pub fn is_allowed(mode: AgentMode, tool_name: &str) -> GateDecision {
        let Some(category) = Self::category_of(tool_name) else {
            return GateDecision::deny(format!("Unknown tool: {tool_name}"));
        };
        let caps = mode.capabilities();
        if caps.allowed_categories.contains(&category) {
            GateDecision::allow()
        } else {
            GateDecision::deny(format!(
                "tool '{tool_name}' (category {category}) is not allowed in {mode} mode"
            ))
        }
    }

    /// Inverse projection: every built-in tool name usable in `mode`.
    /// Used to build the per-call tool manifest offered to the model.
    pub fn allowed_tools(mode: AgentMode) -> Vec<&'static str> {
        let caps = mode.capabilities();
        BUILTIN_TOOLS
            .iter()
            .filter(|(_, cat)| caps.allowed_categories.contains(cat))
            .map(|(name, _)| *name)
            .collect()
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
