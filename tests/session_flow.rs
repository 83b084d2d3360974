// Copyright (c) 2024-2026 Harbor Contributors
//
// SPDX-License-Identifier: Apache-2.0
//! End-to-end session flows: scripted model turns driving the real
//! dispatcher against a temp workspace, and the bridge fanning the same run
//! out to multiple subscribers.

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tokio::sync::mpsc;

use harbor_config::{AgentConfig, AgentMode, AutoApprovalPolicy, ToolsConfig};
use harbor_core::{Agent, AgentEvent, MockProvider, ModelTurn};
use harbor_node::{BridgeHandle, MessageSource, ServerFrame, SessionBridge};
use harbor_tools::{Dispatcher, DynamicRegistry, ToolCall, Workspace};

fn make_agent(turns: Vec<ModelTurn>, config: AgentConfig, root: &std::path::Path) -> Agent {
    let ws = Arc::new(Workspace::new(root));
    let dispatcher = Arc::new(Dispatcher::new(
        ws,
        &ToolsConfig::default(),
        Arc::new(DynamicRegistry::new(vec![])),
    ));
    Agent::new(
        Arc::new(MockProvider::scripted(turns)),
        dispatcher,
        Arc::new(config),
        false,
    )
}

async fn collect(mut rx: mpsc::Receiver<AgentEvent>) -> Vec<AgentEvent> {
    let mut events = Vec::new();
    while let Some(ev) = rx.recv().await {
        events.push(ev);
    }
    events
}

#[tokio::test]
async fn agent_mode_turn_writes_then_verifies_a_file() {
    let dir = tempfile::tempdir().unwrap();
    let mut agent = make_agent(
        vec![
            ModelTurn {
                text: "writing the module now".into(),
                tool_calls: vec![ToolCall {
                    id: "c1".into(),
                    name: "write_file".into(),
                    args: json!({"path": "src/lib.rs", "content": "pub fn add() {}\n"}),
                }],
                ..Default::default()
            },
            ModelTurn {
                text: String::new(),
                tool_calls: vec![ToolCall {
                    id: "c2".into(),
                    name: "read_file".into(),
                    args: json!({"path": "src/lib.rs"}),
                }],
                ..Default::default()
            },
            ModelTurn {
                text: "module created".into(),
                ..Default::default()
            },
        ],
        AgentConfig::default(),
        dir.path(),
    );

    let (tx, rx) = mpsc::channel(256);
    agent.run("create the module", tx).await.unwrap();
    let events = collect(rx).await;

    assert!(dir.path().join("src/lib.rs").exists());
    let results: Vec<_> = events
        .iter()
        .filter(|e| matches!(e, AgentEvent::ToolResult { .. }))
        .collect();
    assert_eq!(results.len(), 2);
    assert!(matches!(events.last(), Some(AgentEvent::Complete)));
    assert_eq!(agent.stats().tool_calls, 2);
    assert_eq!(agent.stats().tool_errors, 0);
}

#[tokio::test]
async fn plan_mode_session_cannot_touch_disk() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = AgentConfig::default();
    config.default_mode = AgentMode::Plan;
    let mut agent = make_agent(
        vec![
            ModelTurn {
                text: String::new(),
                tool_calls: vec![
                    ToolCall {
                        id: "c1".into(),
                        name: "write_file".into(),
                        args: json!({"path": "a.txt", "content": "x"}),
                    },
                    ToolCall {
                        id: "c2".into(),
                        name: "run_command".into(),
                        args: json!({"command": "touch b.txt"}),
                    },
                ],
                ..Default::default()
            },
            ModelTurn {
                text: "plan only".into(),
                ..Default::default()
            },
        ],
        config,
        dir.path(),
    );

    let (tx, rx) = mpsc::channel(256);
    agent.run("try to write", tx).await.unwrap();
    let events = collect(rx).await;

    // Both calls denied by the mode gate, nothing created.
    assert!(!dir.path().join("a.txt").exists());
    assert!(!dir.path().join("b.txt").exists());
    let errors = events
        .iter()
        .filter(|e| matches!(e, AgentEvent::ToolResult { is_error: true, .. }))
        .count();
    assert_eq!(errors, 2);
}

#[tokio::test]
async fn directive_escalation_confirmed_by_user_unlocks_writes() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = AgentConfig::default();
    config.default_mode = AgentMode::Plan;
    config.auto_approval = AutoApprovalPolicy::Always;
    let mut agent = make_agent(
        vec![
            ModelTurn {
                text: "[[REQUEST_MODE: agent | reason=plan approved, implementing]] ready".into(),
                ..Default::default()
            },
            ModelTurn {
                text: String::new(),
                tool_calls: vec![ToolCall {
                    id: "c1".into(),
                    name: "write_file".into(),
                    args: json!({"path": "impl.rs", "content": "fn work() {}\n"}),
                }],
                ..Default::default()
            },
            ModelTurn {
                text: "implemented".into(),
                ..Default::default()
            },
        ],
        config,
        dir.path(),
    );

    // Turn 1: the escalation parks awaiting confirmation.
    let (tx, rx) = mpsc::channel(256);
    agent.run("implement the plan", tx).await.unwrap();
    collect(rx).await;
    assert_eq!(agent.mode(), AgentMode::Plan);

    // The user confirms; the next turn runs with write privileges.
    assert_eq!(agent.confirm_pending_transition(true), Some(AgentMode::Agent));

    let (tx, rx) = mpsc::channel(256);
    agent.run("go ahead", tx).await.unwrap();
    collect(rx).await;

    assert!(dir.path().join("impl.rs").exists());
    // History: session start, (plan) commit on confirmation, per-commit rows.
    assert!(agent.mode_state().history.len() >= 2);
}

#[tokio::test]
async fn bridge_mirrors_one_turn_to_terminal_and_browser() {
    let dir = tempfile::tempdir().unwrap();
    let agent = make_agent(
        vec![ModelTurn {
            text: "shared reply".into(),
            ..Default::default()
        }],
        AgentConfig::default(),
        dir.path(),
    );
    let (bridge, handle): (SessionBridge, BridgeHandle) = SessionBridge::new(agent);
    tokio::spawn(bridge.run());

    let mut terminal = handle.subscribe();
    let mut browser = handle.subscribe();

    handle
        .submit_user_message("hello", MessageSource::Tui)
        .await
        .unwrap();

    let mut saw = (false, false);
    for rx in [&mut terminal, &mut browser] {
        loop {
            let frame = tokio::time::timeout(Duration::from_secs(2), rx.recv())
                .await
                .expect("frame in time")
                .expect("stream open");
            match frame {
                ServerFrame::Response { text } => {
                    assert_eq!(text, "shared reply");
                    if !saw.0 {
                        saw.0 = true;
                    } else {
                        saw.1 = true;
                    }
                }
                ServerFrame::Complete => break,
                _ => {}
            }
        }
    }
    assert!(saw.0 && saw.1, "both interfaces saw the response");
}
