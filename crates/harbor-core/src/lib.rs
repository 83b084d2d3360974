// Copyright (c) 2024-2026 Harbor Contributors
//
// SPDX-License-Identifier: MIT
mod agent;
mod events;
pub mod mode;
mod provider;

pub use agent::{Agent, AgentStats};
pub use events::AgentEvent;
pub use mode::{
    Evaluation, ModeHistoryEntry, ModeState, ModeTransitionRequest, ParsedDirective,
    TransitionInProgress, TransitionSource,
};
pub use provider::{ChatMessage, MockProvider, ModelProvider, ModelTurn, Role};
