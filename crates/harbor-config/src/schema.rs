// Copyright (c) 2024-2026 Harbor Contributors
//
// SPDX-License-Identifier: Apache-2.0
use serde::{Deserialize, Serialize};

/// Serde default helper — returns `true`.
///
/// `#[serde(default)]` on a `bool` always falls back to `bool::default()`
/// (i.e. `false`), so fields that should be enabled unless explicitly
/// disabled need a named function.
fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub tools: ToolsConfig,
    #[serde(default)]
    pub node: NodeConfig,
}

// ── Modes ─────────────────────────────────────────────────────────────────────

/// Operating persona of the agent.  The mode constrains which tool
/// categories the dispatcher will allow; see [`ModeCapabilities`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentMode {
    /// Design approaches and structured plans — read-only
    Plan,
    /// Full agent with read/write tools
    Agent,
    /// Run and analyze test suites; no source edits
    Tester,
    /// Investigate failures; may patch files and run commands
    Debugger,
    /// Read-only security audit
    Security,
    /// Read-only code review
    Review,
}

impl std::fmt::Display for AgentMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AgentMode::Plan => write!(f, "plan"),
            AgentMode::Agent => write!(f, "agent"),
            AgentMode::Tester => write!(f, "tester"),
            AgentMode::Debugger => write!(f, "debugger"),
            AgentMode::Security => write!(f, "security"),
            AgentMode::Review => write!(f, "review"),
        }
    }
}

impl std::str::FromStr for AgentMode {
    type Err = String;

    /// Case-insensitive parse; this is what directive parsing and the CLI use.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "plan" => Ok(AgentMode::Plan),
            "agent" => Ok(AgentMode::Agent),
            "tester" => Ok(AgentMode::Tester),
            "debugger" => Ok(AgentMode::Debugger),
            "security" => Ok(AgentMode::Security),
            "review" => Ok(AgentMode::Review),
            other => Err(format!("unknown mode: {other}")),
        }
    }
}

impl AgentMode {
    pub const ALL: &'static [AgentMode] = &[
        AgentMode::Plan,
        AgentMode::Agent,
        AgentMode::Tester,
        AgentMode::Debugger,
        AgentMode::Security,
        AgentMode::Review,
    ];

    /// The immutable capability record for this mode.
    ///
    /// Capability data is pure configuration — the returned reference points
    /// into a static table and is never mutated at runtime.
    pub fn capabilities(self) -> &'static ModeCapabilities {
        match self {
            AgentMode::Plan => &PLAN_CAPS,
            AgentMode::Agent => &AGENT_CAPS,
            AgentMode::Tester => &TESTER_CAPS,
            AgentMode::Debugger => &DEBUGGER_CAPS,
            AgentMode::Security => &SECURITY_CAPS,
            AgentMode::Review => &REVIEW_CAPS,
        }
    }
}

/// Coarse capability tag attached to every built-in tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolCategory {
    ReadOnly,
    WriteFs,
    GitRead,
    GitMutation,
    ShellCommand,
    Tests,
    Network,
    Context,
}

impl std::fmt::Display for ToolCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ToolCategory::ReadOnly => "read_only",
            ToolCategory::WriteFs => "write_fs",
            ToolCategory::GitRead => "git_read",
            ToolCategory::GitMutation => "git_mutation",
            ToolCategory::ShellCommand => "shell_command",
            ToolCategory::Tests => "tests",
            ToolCategory::Network => "network",
            ToolCategory::Context => "context",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskTolerance {
    Low,
    Medium,
    High,
}

/// Immutable per-mode capability record.
#[derive(Debug, Clone)]
pub struct ModeCapabilities {
    pub display_name: &'static str,
    pub allowed_categories: &'static [ToolCategory],
    /// Whether this mode may change files, git state, or run mutating commands
    pub can_modify: bool,
    /// Whether mutating tools start in dry-run for this mode
    pub default_dry_run: bool,
    pub risk_tolerance: RiskTolerance,
    /// Entering this mode needs an explicit user confirmation
    pub requires_confirmation: bool,
    /// Persona fragment injected into the system prompt
    pub prompt: &'static str,
}

static PLAN_CAPS: ModeCapabilities = ModeCapabilities {
    display_name: "Plan",
    allowed_categories: &[
        ToolCategory::ReadOnly,
        ToolCategory::GitRead,
        ToolCategory::Context,
    ],
    can_modify: false,
    default_dry_run: true,
    risk_tolerance: RiskTolerance::Low,
    requires_confirmation: false,
    prompt: "You are in plan mode. Explore the codebase, design an approach, and \
             produce a structured plan. You cannot modify files or run commands.",
};

static AGENT_CAPS: ModeCapabilities = ModeCapabilities {
    display_name: "Agent",
    allowed_categories: &[
        ToolCategory::ReadOnly,
        ToolCategory::WriteFs,
        ToolCategory::GitRead,
        ToolCategory::GitMutation,
        ToolCategory::ShellCommand,
        ToolCategory::Tests,
        ToolCategory::Network,
        ToolCategory::Context,
    ],
    can_modify: true,
    default_dry_run: false,
    risk_tolerance: RiskTolerance::Medium,
    requires_confirmation: false,
    prompt: "You are in agent mode. Make code changes, run commands, and verify \
             your work with the available tools.",
};

static TESTER_CAPS: ModeCapabilities = ModeCapabilities {
    display_name: "Tester",
    allowed_categories: &[
        ToolCategory::ReadOnly,
        ToolCategory::GitRead,
        ToolCategory::ShellCommand,
        ToolCategory::Tests,
        ToolCategory::Context,
    ],
    can_modify: false,
    default_dry_run: false,
    risk_tolerance: RiskTolerance::Medium,
    requires_confirmation: false,
    prompt: "You are in tester mode. Run test suites, analyze failures, and \
             report coverage gaps. Do not edit source files.",
};

static DEBUGGER_CAPS: ModeCapabilities = ModeCapabilities {
    display_name: "Debugger",
    allowed_categories: &[
        ToolCategory::ReadOnly,
        ToolCategory::WriteFs,
        ToolCategory::GitRead,
        ToolCategory::ShellCommand,
        ToolCategory::Tests,
        ToolCategory::Context,
    ],
    can_modify: true,
    default_dry_run: false,
    risk_tolerance: RiskTolerance::High,
    requires_confirmation: true,
    prompt: "You are in debugger mode. Reproduce the failure, instrument the \
             code, and apply the smallest fix that makes the tests pass.",
};

static SECURITY_CAPS: ModeCapabilities = ModeCapabilities {
    display_name: "Security",
    allowed_categories: &[
        ToolCategory::ReadOnly,
        ToolCategory::GitRead,
        ToolCategory::Context,
    ],
    can_modify: false,
    default_dry_run: true,
    risk_tolerance: RiskTolerance::Low,
    requires_confirmation: false,
    prompt: "You are in security mode. Audit the code for vulnerabilities and \
             unsafe patterns. You cannot modify anything.",
};

static REVIEW_CAPS: ModeCapabilities = ModeCapabilities {
    display_name: "Review",
    allowed_categories: &[
        ToolCategory::ReadOnly,
        ToolCategory::GitRead,
        ToolCategory::Context,
    ],
    can_modify: false,
    default_dry_run: true,
    risk_tolerance: RiskTolerance::Low,
    requires_confirmation: false,
    prompt: "You are in review mode. Read the changes and report defects, \
             style issues, and missing tests. You cannot modify anything.",
};

// ── Agent config ──────────────────────────────────────────────────────────────

/// Policy applied when the *model* requests a mode change.
/// User- and system-initiated requests are always authoritative.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AutoApprovalPolicy {
    /// Deny every model-initiated transition
    Never,
    /// Approve only transitions into debugger mode
    AlwaysForDebugger,
    /// Approve only transitions that do not change the can_modify privilege
    PromptOnly,
    /// Approve unconditionally
    Always,
}

impl Default for AutoApprovalPolicy {
    fn default() -> Self {
        AutoApprovalPolicy::PromptOnly
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Mode a new session starts in
    #[serde(default = "default_mode")]
    pub default_mode: AgentMode,
    #[serde(default)]
    pub auto_approval: AutoApprovalPolicy,
    /// Hard ceiling on model↔tool round-trips within one user turn
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,
}

fn default_mode() -> AgentMode {
    AgentMode::Agent
}

fn default_max_turns() -> usize {
    24
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            default_mode: default_mode(),
            auto_approval: AutoApprovalPolicy::default(),
            max_turns: default_max_turns(),
        }
    }
}

// ── Tools config ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Shell commands matching any of these globs are blocked before spawn.
    #[serde(default = "default_deny_patterns")]
    pub deny_patterns: Vec<String>,
    /// Shell commands matching any of these globs are considered low risk.
    #[serde(default = "default_auto_approve_patterns")]
    pub auto_approve_patterns: Vec<String>,
    /// Wall-clock timeout for run_command (seconds)
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: u64,
    /// Wall-clock timeout for run_tests (seconds)
    #[serde(default = "default_test_timeout")]
    pub test_timeout_secs: u64,
    /// Start the session with mutating tools in dry-run
    #[serde(default)]
    pub dry_run: bool,
}

fn default_deny_patterns() -> Vec<String> {
    [
        "rm -rf /*",
        "rm -rf ~*",
        "mkfs*",
        "dd if=*of=/dev/*",
        ":(){*",
        "shutdown*",
        "reboot*",
        "chmod -R 777 /*",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_auto_approve_patterns() -> Vec<String> {
    ["ls*", "cat *", "pwd", "git status*", "git diff*", "git log*"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_command_timeout() -> u64 {
    120
}

fn default_test_timeout() -> u64 {
    600
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            deny_patterns: default_deny_patterns(),
            auto_approve_patterns: default_auto_approve_patterns(),
            command_timeout_secs: default_command_timeout(),
            test_timeout_secs: default_test_timeout(),
            dry_run: false,
        }
    }
}

// ── Node config ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    /// Bind address for the WebSocket server
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Shell spawned for raw terminal connections; `None` uses $SHELL or sh
    #[serde(default)]
    pub terminal_shell: Option<String>,
    /// Grace period between SIGTERM and SIGKILL for PTY children (ms)
    #[serde(default = "default_kill_grace")]
    pub terminal_kill_grace_ms: u64,
    /// Serve the agent bridge endpoint (`/ws`)
    #[serde(default = "default_true")]
    pub enable_bridge: bool,
    /// Serve the raw terminal endpoint (`/terminal`)
    #[serde(default = "default_true")]
    pub enable_terminal: bool,
}

fn default_bind() -> String {
    "127.0.0.1:8787".to_string()
}

fn default_kill_grace() -> u64 {
    1500
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            terminal_shell: None,
            terminal_kill_grace_ms: default_kill_grace(),
            enable_bridge: true,
            enable_terminal: true,
        }
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
