// Copyright (c) 2024-2026 Harbor Contributors
//
// SPDX-License-Identifier: MIT
use regex::Regex;
use serde_json::{json, Value};

use harbor_config::ToolsConfig;

/// Risk classification attached to a tool call before execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

/// Result of the pre-execution safety assessment.
#[derive(Debug, Clone)]
pub struct SafetyAssessment {
    pub risk: RiskLevel,
    pub warnings: Vec<String>,
    /// Suggested lower-risk replacement; attached to the result metadata,
    /// never used to block
    pub safer_alternative: Option<String>,
}

impl SafetyAssessment {
    pub fn metadata(&self) -> Option<Value> {
        if self.risk < RiskLevel::High && self.warnings.is_empty() {
            return None;
        }
        let mut m = json!({
            "risk": match self.risk {
                RiskLevel::Low => "low",
                RiskLevel::Medium => "medium",
                RiskLevel::High => "high",
            },
        });
        if !self.warnings.is_empty() {
            m["warnings"] = json!(self.warnings);
        }
        if let Some(alt) = &self.safer_alternative {
            m["saferAlternative"] = json!(alt);
        }
        Some(m)
    }
}

/// Shell-command policy compiled from the config glob lists.
/// Deny patterns block before any execution; auto-approve patterns mark a
/// command low risk.
#[derive(Debug)]
pub struct CommandPolicy {
    deny_patterns: Vec<Regex>,
    auto_patterns: Vec<Regex>,
}

impl CommandPolicy {
    pub fn from_config(cfg: &ToolsConfig) -> Self {
        let compile = |patterns: &[String]| -> Vec<Regex> {
            patterns.iter().filter_map(|p| glob_to_regex(p)).collect()
        };
        Self {
            deny_patterns: compile(&cfg.deny_patterns),
            auto_patterns: compile(&cfg.auto_approve_patterns),
        }
    }

    /// Whether the command matches the deny-list.
    pub fn is_denied(&self, command: &str) -> bool {
        self.deny_patterns.iter().any(|re| re.is_match(command))
    }

    /// Assess a shell command: deny-list is checked separately by the
    /// dispatcher; this grades the residual risk.
    pub fn assess_command(&self, command: &str) -> SafetyAssessment {
        if self.auto_patterns.iter().any(|re| re.is_match(command)) {
            return SafetyAssessment {
                risk: RiskLevel::Low,
                warnings: Vec::new(),
                safer_alternative: None,
            };
        }

        let mut warnings = Vec::new();
        let mut safer_alternative = None;
        let mut risk = RiskLevel::Medium;

        for (needle, warning, alt) in HIGH_RISK_MARKERS {
            if command.contains(needle) {
                risk = RiskLevel::High;
                warnings.push((*warning).to_string());
                if safer_alternative.is_none() {
                    safer_alternative = Some((*alt).to_string());
                }
            }
        }

        SafetyAssessment {
            risk,
            warnings,
            safer_alternative,
        }
    }
}

/// Substrings that escalate a command to high risk, with the warning text
/// and a suggested safer alternative.
const HIGH_RISK_MARKERS: &[(&str, &str, &str)] = &[
    (
        "rm -rf",
        "recursive force-delete",
        "use delete_file for individual paths so dry-run and previews apply",
    ),
    (
        "sudo ",
        "privilege escalation",
        "run the command without sudo inside the workspace",
    ),
    (
        "git push --force",
        "force push rewrites remote history",
        "use git push --force-with-lease",
    ),
    (
        "> /dev/",
        "writes directly to a device node",
        "write to a regular file in the workspace instead",
    ),
    (
        "curl | sh",
        "pipes a remote script into a shell",
        "download first with web_fetch, inspect, then run",
    ),
];

/// Convert a simple shell glob pattern to a [`Regex`].
/// Only `*` (match anything) and `?` (match one char) are supported.
fn glob_to_regex(pattern: &str) -> Option<Regex> {
    let mut re = String::from("^");
    for ch in pattern.chars() {
        match ch {
            '*' => re.push_str(".*"),
            '?' => re.push('.'),
            c => {
                for esc in regex::escape(&c.to_string()).chars() {
                    re.push(esc);
                }
            }
        }
    }
    re.push('$');
    Regex::new(&re).ok()
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
