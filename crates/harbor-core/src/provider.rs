// Copyright (c) 2024-2026 Harbor Contributors
//
// SPDX-License-Identifier: MIT
use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use harbor_tools::{ToolCall, ToolSchema};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn tool(content: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
        }
    }
}

/// One completion from the model: optional reasoning, response text, and any
/// tool calls to execute before the next round.
#[derive(Debug, Clone, Default)]
pub struct ModelTurn {
    pub thinking: Option<String>,
    pub text: String,
    pub tool_calls: Vec<ToolCall>,
}

/// The seam between the agent loop and any LLM backend.  Provider wire
/// formats live entirely behind this trait.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        tools: &[ToolSchema],
    ) -> anyhow::Result<ModelTurn>;

    fn name(&self) -> &str {
        "unknown"
    }
}

/// Scripted provider for tests and offline runs.  Pops pre-loaded turns in
/// order; once the script is exhausted it echoes the last user message.
#[derive(Default)]
pub struct MockProvider {
    turns: Mutex<VecDeque<ModelTurn>>,
}

impl MockProvider {
    pub fn scripted(turns: Vec<ModelTurn>) -> Self {
        Self {
            turns: Mutex::new(turns.into()),
        }
    }
}

#[async_trait]
impl ModelProvider for MockProvider {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        _tools: &[ToolSchema],
    ) -> anyhow::Result<ModelTurn> {
        if let Some(turn) = self.turns.lock().unwrap().pop_front() {
            return Ok(turn);
        }
        let last_user = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.clone())
            .unwrap_or_default();
        Ok(ModelTurn {
            thinking: None,
            text: format!("echo: {last_user}"),
            tool_calls: Vec::new(),
        })
    }

    fn name(&self) -> &str {
        "mock"
    }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mock_pops_scripted_turns_in_order() {
        let p = MockProvider::scripted(vec![
            ModelTurn {
                text: "first".into(),
                ..Default::default()
            },
            ModelTurn {
                text: "second".into(),
                ..Default::default()
            },
        ]);
        let t1 = p.complete(&[], &[]).await.unwrap();
        let t2 = p.complete(&[], &[]).await.unwrap();
        assert_eq!(t1.text, "first");
        assert_eq!(t2.text, "second");
    }

    #[tokio::test]
    async fn exhausted_mock_echoes_last_user_message() {
        let p = MockProvider::default();
        let msgs = vec![
            ChatMessage::system("sys"),
            ChatMessage::user("hello there"),
        ];
        let t = p.complete(&msgs, &[]).await.unwrap();
        assert_eq!(t.text, "echo: hello there");
    }
}
