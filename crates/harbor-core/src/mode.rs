// Copyright (c) 2024-2026 Harbor Contributors
//
// SPDX-License-Identifier: MIT
//!
//! Mode state machine.
//!
//! All operations here are pure, synchronous transformations of a
//! [`ModeState`] passed by value — no locking, no side effects.  The owning
//! session is the single writer; concurrency safety is the caller's
//! responsibility (one session, one thread of mutation).

use std::str::FromStr;
use std::sync::OnceLock;

use chrono::{DateTime, Utc};
use regex::Regex;

use harbor_config::{AgentMode, AutoApprovalPolicy};

/// Who asked for a mode transition.  Human and system intent is
/// authoritative; model intent goes through the auto-approval policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionSource {
    Model,
    User,
    System,
}

#[derive(Debug, Clone)]
pub struct ModeHistoryEntry {
    pub mode: AgentMode,
    pub timestamp: DateTime<Utc>,
    pub reason: String,
}

#[derive(Debug, Clone)]
pub struct ModeTransitionRequest {
    pub target_mode: AgentMode,
    pub reason: String,
    pub source: TransitionSource,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct TransitionInProgress {
    pub from: AgentMode,
    pub to: AgentMode,
    pub awaiting_confirmation: bool,
}

/// Per-session mode record.  Mutated only through the functions in this
/// module; the history is append-only and never truncated.
#[derive(Debug, Clone)]
pub struct ModeState {
    pub current: AgentMode,
    pub previous: Option<AgentMode>,
    pub history: Vec<ModeHistoryEntry>,
    /// At most one request may be pending; a new one overwrites an
    /// unresolved one (last-write-wins)
    pub pending_request: Option<ModeTransitionRequest>,
    pub transition_in_progress: Option<TransitionInProgress>,
}

impl ModeState {
    pub fn new(initial: AgentMode) -> Self {
        Self {
            current: initial,
            previous: None,
            history: vec![ModeHistoryEntry {
                mode: initial,
                timestamp: Utc::now(),
                reason: "session start".to_string(),
            }],
            pending_request: None,
            transition_in_progress: None,
        }
    }
}

/// Result of evaluating a pending transition request.
///
/// `approved` and `requires_confirmation` are orthogonal: an approved
/// transition may still require the caller to collect a confirmation before
/// committing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub approved: bool,
    pub requires_confirmation: bool,
    pub reason: Option<String>,
}

/// Store a transition request in the pending slot (last-write-wins).
pub fn request_change(
    mut state: ModeState,
    target_mode: AgentMode,
    reason: impl Into<String>,
    source: TransitionSource,
) -> ModeState {
    state.pending_request = Some(ModeTransitionRequest {
        target_mode,
        reason: reason.into(),
        source,
        timestamp: Utc::now(),
    });
    state
}

/// Evaluate the pending request against the auto-approval policy.
pub fn evaluate(state: &ModeState, policy: AutoApprovalPolicy) -> Evaluation {
    let Some(req) = &state.pending_request else {
        return Evaluation {
            approved: false,
            requires_confirmation: false,
            reason: None,
        };
    };

    let from = state.current.capabilities();
    let to = req.target_mode.capabilities();

    // Orthogonal confirmation rule: entering a mode that demands it, or
    // escalating from non-modifying to modifying, always surfaces
    // requires_confirmation regardless of how approval comes out.
    let mut requires_confirmation =
        to.requires_confirmation || (!from.can_modify && to.can_modify);

    let (approved, reason) = match req.source {
        // Human and system intent is authoritative.
        TransitionSource::User | TransitionSource::System => (true, None),
        TransitionSource::Model => match policy {
            AutoApprovalPolicy::Never => (
                false,
                Some("model-initiated mode changes are disabled".to_string()),
            ),
            AutoApprovalPolicy::AlwaysForDebugger => {
                if req.target_mode == AgentMode::Debugger {
                    (true, None)
                } else {
                    (
                        false,
                        Some(format!(
                            "auto-approval only covers debugger mode, not {}",
                            req.target_mode
                        )),
                    )
                }
            }
            AutoApprovalPolicy::PromptOnly => {
                if from.can_modify == to.can_modify {
                    (true, None)
                } else {
                    // A privilege change needs the user; deny and ask.
                    requires_confirmation = true;
                    (
                        false,
                        Some(format!(
                            "switching {} -> {} changes write privileges",
                            state.current, req.target_mode
                        )),
                    )
                }
            }
            AutoApprovalPolicy::Always => (true, None),
        },
    };

    Evaluation {
        approved,
        requires_confirmation,
        reason,
    }
}

/// Record that a transition is underway, optionally waiting on the user.
pub fn mark_in_progress(mut state: ModeState, to: AgentMode, awaiting: bool) -> ModeState {
    state.transition_in_progress = Some(TransitionInProgress {
        from: state.current,
        to,
        awaiting_confirmation: awaiting,
    });
    state
}

/// Commit a transition: append history, rotate current/previous, clear the
/// pending slot.  Committing the mode already current still appends a
/// history row — that is deliberate, not a bug to dedup away.
pub fn commit(mut state: ModeState, new_mode: AgentMode, reason: impl Into<String>) -> ModeState {
    state.history.push(ModeHistoryEntry {
        mode: new_mode,
        timestamp: Utc::now(),
        reason: reason.into(),
    });
    state.previous = Some(state.current);
    state.current = new_mode;
    state.pending_request = None;
    state.transition_in_progress = None;
    state
}

// ── Directive parsing ─────────────────────────────────────────────────────────

/// A mode-switch directive embedded in model output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedDirective {
    pub mode: AgentMode,
    pub reason: String,
}

fn directive_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"\[\[\s*REQUEST_MODE:\s*([A-Za-z_]+)\s*\|\s*reason=([^\]]*)\]\]")
            .expect("directive regex is valid")
    })
}

/// Extract the first embedded `[[REQUEST_MODE: <mode> | reason=<text>]]`
/// directive.  The mode token is case-insensitive; an unrecognized mode
/// yields `None`, same as no directive at all.
pub fn parse_directive(text: &str) -> Option<ParsedDirective> {
    let caps = directive_regex().captures(text)?;
    let mode = AgentMode::from_str(&caps[1]).ok()?;
    Some(ParsedDirective {
        mode,
        reason: caps[2].trim().to_string(),
    })
}

/// Remove all directive substrings for user-facing display, trimming the
/// whitespace they leave behind.
pub fn strip_directives(text: &str) -> String {
    directive_regex().replace_all(text, "").trim().to_string()
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn state(mode: AgentMode) -> ModeState {
        ModeState::new(mode)
    }

    // ── State creation ────────────────────────────────────────────────────────

    #[test]
    fn new_state_has_one_history_entry() {
        let s = state(AgentMode::Agent);
        assert_eq!(s.current, AgentMode::Agent);
        assert_eq!(s.history.len(), 1);
        assert!(s.previous.is_none());
        assert!(s.pending_request.is_none());
    }

    // ── request_change ────────────────────────────────────────────────────────

    #[test]
    fn request_fills_the_pending_slot() {
        let s = request_change(
            state(AgentMode::Agent),
            AgentMode::Plan,
            "think first",
            TransitionSource::Model,
        );
        let req = s.pending_request.as_ref().unwrap();
        assert_eq!(req.target_mode, AgentMode::Plan);
        assert_eq!(req.reason, "think first");
    }

    #[test]
    fn second_request_overwrites_the_first() {
        let s = request_change(
            state(AgentMode::Agent),
            AgentMode::Plan,
            "first",
            TransitionSource::Model,
        );
        let s = request_change(s, AgentMode::Review, "second", TransitionSource::User);
        let req = s.pending_request.as_ref().unwrap();
        assert_eq!(req.target_mode, AgentMode::Review);
        assert_eq!(req.reason, "second");
    }

    // ── evaluate ──────────────────────────────────────────────────────────────

    #[test]
    fn no_pending_request_is_not_approved() {
        let e = evaluate(&state(AgentMode::Agent), AutoApprovalPolicy::Always);
        assert!(!e.approved);
        assert!(!e.requires_confirmation);
    }

    #[test]
    fn user_source_is_always_approved() {
        let s = request_change(
            state(AgentMode::Plan),
            AgentMode::Agent,
            "go",
            TransitionSource::User,
        );
        let e = evaluate(&s, AutoApprovalPolicy::Never);
        assert!(e.approved, "user intent beats the policy");
    }

    #[test]
    fn system_source_is_always_approved() {
        let s = request_change(
            state(AgentMode::Agent),
            AgentMode::Review,
            "post-run review",
            TransitionSource::System,
        );
        assert!(evaluate(&s, AutoApprovalPolicy::Never).approved);
    }

    #[test]
    fn never_policy_denies_model_requests() {
        let s = request_change(
            state(AgentMode::Agent),
            AgentMode::Plan,
            "x",
            TransitionSource::Model,
        );
        let e = evaluate(&s, AutoApprovalPolicy::Never);
        assert!(!e.approved);
        assert!(e.reason.is_some());
    }

    #[test]
    fn always_for_debugger_approves_only_debugger() {
        let s = request_change(
            state(AgentMode::Agent),
            AgentMode::Debugger,
            "x",
            TransitionSource::Model,
        );
        assert!(evaluate(&s, AutoApprovalPolicy::AlwaysForDebugger).approved);

        let s = request_change(
            state(AgentMode::Agent),
            AgentMode::Plan,
            "x",
            TransitionSource::Model,
        );
        let e = evaluate(&s, AutoApprovalPolicy::AlwaysForDebugger);
        assert!(!e.approved);
        assert!(e.reason.unwrap().contains("debugger"));
    }

    #[test]
    fn prompt_only_approves_when_privileges_match() {
        // plan -> review: both non-modifying
        let s = request_change(
            state(AgentMode::Plan),
            AgentMode::Review,
            "x",
            TransitionSource::Model,
        );
        assert!(evaluate(&s, AutoApprovalPolicy::PromptOnly).approved);
    }

    #[test]
    fn prompt_only_denies_privilege_escalation_and_asks() {
        let s = request_change(
            state(AgentMode::Plan),
            AgentMode::Agent,
            "x",
            TransitionSource::Model,
        );
        let e = evaluate(&s, AutoApprovalPolicy::PromptOnly);
        assert!(!e.approved);
        assert!(e.requires_confirmation);
    }

    #[test]
    fn prompt_only_denies_de_escalation_too() {
        // agent -> plan changes can_modify; PromptOnly treats any privilege
        // change the same way.
        let s = request_change(
            state(AgentMode::Agent),
            AgentMode::Plan,
            "x",
            TransitionSource::Model,
        );
        let e = evaluate(&s, AutoApprovalPolicy::PromptOnly);
        assert!(!e.approved);
        assert!(e.requires_confirmation);
    }

    #[test]
    fn always_policy_approves_model_requests() {
        let s = request_change(
            state(AgentMode::Agent),
            AgentMode::Plan,
            "x",
            TransitionSource::Model,
        );
        assert!(evaluate(&s, AutoApprovalPolicy::Always).approved);
    }

    #[test]
    fn entering_confirmation_mode_flags_confirmation_even_for_user() {
        // Debugger carries requires_confirmation in its capabilities.
        let s = request_change(
            state(AgentMode::Agent),
            AgentMode::Debugger,
            "x",
            TransitionSource::User,
        );
        let e = evaluate(&s, AutoApprovalPolicy::Never);
        assert!(e.approved);
        assert!(e.requires_confirmation, "confirmation is additive, not gated by approval");
    }

    #[test]
    fn escalation_to_modifying_mode_flags_confirmation() {
        let s = request_change(
            state(AgentMode::Review),
            AgentMode::Agent,
            "x",
            TransitionSource::Model,
        );
        let e = evaluate(&s, AutoApprovalPolicy::Always);
        assert!(e.approved);
        assert!(e.requires_confirmation);
    }

    // ── commit ────────────────────────────────────────────────────────────────

    #[test]
    fn commit_rotates_modes_and_clears_pending() {
        let s = request_change(
            state(AgentMode::Agent),
            AgentMode::Plan,
            "x",
            TransitionSource::User,
        );
        let s = commit(s, AgentMode::Plan, "approved");
        assert_eq!(s.current, AgentMode::Plan);
        assert_eq!(s.previous, Some(AgentMode::Agent));
        assert!(s.pending_request.is_none());
        assert!(s.transition_in_progress.is_none());
        assert_eq!(s.history.len(), 2);
    }

    #[test]
    fn committing_the_current_mode_still_appends_history() {
        let s = state(AgentMode::Agent);
        let before = s.history.len();
        let s = commit(s, AgentMode::Agent, "re-asserted");
        assert_eq!(s.current, AgentMode::Agent);
        assert_eq!(s.history.len(), before + 1);
    }

    #[test]
    fn history_is_append_only_across_many_commits() {
        let mut s = state(AgentMode::Agent);
        for (i, mode) in [AgentMode::Plan, AgentMode::Agent, AgentMode::Review]
            .into_iter()
            .enumerate()
        {
            s = commit(s, mode, format!("step {i}"));
        }
        assert_eq!(s.history.len(), 4);
        assert_eq!(s.history[0].reason, "session start");
        assert_eq!(s.history[3].mode, AgentMode::Review);
    }

    // ── Directives ────────────────────────────────────────────────────────────

    #[test]
    fn directive_round_trips() {
        for mode in AgentMode::ALL {
            let text = format!("[[REQUEST_MODE: {mode} | reason=need to {mode}]]");
            let d = parse_directive(&text).unwrap();
            assert_eq!(d.mode, *mode);
            assert_eq!(d.reason, format!("need to {mode}"));
            assert_eq!(strip_directives(&text), "");
        }
    }

    #[test]
    fn mode_token_is_case_insensitive() {
        let d = parse_directive("[[REQUEST_MODE: DEBUGGER | reason=crash]]").unwrap();
        assert_eq!(d.mode, AgentMode::Debugger);
    }

    #[test]
    fn unknown_mode_returns_none() {
        assert!(parse_directive("[[REQUEST_MODE: wizard | reason=magic]]").is_none());
    }

    #[test]
    fn plain_text_returns_none() {
        assert!(parse_directive("no directive here").is_none());
        assert_eq!(strip_directives("no directive here"), "no directive here");
    }

    #[test]
    fn reason_is_trimmed() {
        let d = parse_directive("[[REQUEST_MODE: plan | reason=  padded  ]]").unwrap();
        assert_eq!(d.reason, "padded");
    }

    #[test]
    fn strip_removes_directive_from_surrounding_text() {
        let text = "Let me plan this.\n[[REQUEST_MODE: plan | reason=complex task]]\nStarting now.";
        let stripped = strip_directives(text);
        assert!(!stripped.contains("REQUEST_MODE"));
        assert!(stripped.contains("Let me plan this."));
        assert!(stripped.contains("Starting now."));
    }

    #[test]
    fn strip_removes_multiple_directives() {
        let text = "[[REQUEST_MODE: plan | reason=a]] mid [[REQUEST_MODE: agent | reason=b]]";
        assert_eq!(strip_directives(text), "mid");
    }
}
