// Copyright (c) 2024-2026 Harbor Contributors
//
// SPDX-License-Identifier: Apache-2.0
mod cli;

use std::io::Read;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::sync::mpsc;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*};

use cli::{Cli, Commands};
use harbor_config::Config;
use harbor_core::{Agent, AgentEvent, MockProvider};
use harbor_node::SessionBridge;
use harbor_tools::{Dispatcher, DynamicRegistry, Workspace};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let mut cli = Cli::parse();

    init_logging(cli.verbose);

    let config = Arc::new(harbor_config::load(cli.config.as_deref())?);

    match cli.command.take() {
        Some(Commands::ShowConfig) => {
            println!("{}", toml::to_string_pretty(config.as_ref()).unwrap_or_default());
            Ok(())
        }
        Some(Commands::Serve) => serve(cli, config).await,
        None => run_turn(cli, config).await,
    }
}

fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "harbor=info",
        1 => "harbor=debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Build the agent the same way for both entry points.
fn build_agent(cli: &Cli, config: &Config) -> anyhow::Result<Agent> {
    let root = match &cli.workspace {
        Some(dir) => dir.clone(),
        None => std::env::current_dir().context("resolving current directory")?,
    };

    let workspace = Arc::new(Workspace::new(root));
    let dynamic = Arc::new(DynamicRegistry::new(Vec::new()));
    let dispatcher = Arc::new(Dispatcher::new(workspace, &config.tools, dynamic));

    let mut agent_config = config.agent.clone();
    if let Some(mode) = &cli.mode {
        agent_config.default_mode = mode
            .parse()
            .map_err(|e: String| anyhow::anyhow!(e))
            .context("parsing --mode")?;
    }

    // The in-tree provider is the scripted/echo mock; real model backends
    // plug in behind the ModelProvider trait.
    Ok(Agent::new(
        Arc::new(MockProvider::default()),
        dispatcher,
        Arc::new(agent_config),
        cli.dry_run || config.tools.dry_run,
    ))
}

/// One-shot headless turn: run the prompt, render events to the terminal.
async fn run_turn(cli: Cli, config: Arc<Config>) -> anyhow::Result<()> {
    let prompt = match &cli.prompt {
        Some(p) => p.clone(),
        None => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("reading prompt from stdin")?;
            buf.trim().to_string()
        }
    };
    if prompt.is_empty() {
        anyhow::bail!("empty prompt; pass it as an argument or on stdin");
    }

    let mut agent = build_agent(&cli, &config)?;

    let (tx, mut rx) = mpsc::channel::<AgentEvent>(256);
    let renderer = tokio::spawn(async move {
        while let Some(ev) = rx.recv().await {
            render_event(&ev);
        }
    });

    agent.run(&prompt, tx).await?;
    let _ = renderer.await;

    let stats = agent.stats();
    eprintln!(
        "[{} | {} tool calls, {} errors]",
        agent.mode(),
        stats.tool_calls,
        stats.tool_errors
    );
    Ok(())
}

/// Start the node: bridge plus WebSocket/PTY endpoints.
async fn serve(cli: Cli, config: Arc<Config>) -> anyhow::Result<()> {
    let agent = build_agent(&cli, &config)?;
    let (bridge, handle) = SessionBridge::new(agent);
    tokio::spawn(bridge.run());

    harbor_node::serve(&config.node, handle)
        .await
        .context("node server failed")?;
    Ok(())
}

/// Terminal rendering: message fields verbatim, with distinct glyphs for
/// blocked and timed-out failures.
fn render_event(ev: &AgentEvent) {
    match ev {
        AgentEvent::Thinking(text) => eprintln!("· {text}"),
        AgentEvent::StreamStart | AgentEvent::StreamEnd => {}
        AgentEvent::StreamText(_) => {}
        AgentEvent::Response(text) => println!("{text}"),
        AgentEvent::ToolCall { name, .. } => eprintln!("→ {name}"),
        AgentEvent::ToolResult {
            name,
            output,
            is_error,
            ..
        } => {
            if *is_error {
                let message = output
                    .get("message")
                    .and_then(|m| m.as_str())
                    .unwrap_or("tool failed");
                let glyph = if output.get("blocked").and_then(|b| b.as_bool()) == Some(true) {
                    "⊘"
                } else if output.get("timedOut").and_then(|t| t.as_bool()) == Some(true) {
                    "⏱"
                } else {
                    "✗"
                };
                eprintln!("{glyph} {name}: {message}");
            } else {
                eprintln!("✓ {name}");
            }
        }
        AgentEvent::ModeChanged { mode, reason } => eprintln!("mode → {mode} ({reason})"),
        AgentEvent::Warning(message) => eprintln!("! {message}"),
        AgentEvent::Error(message) => eprintln!("✗ {message}"),
        AgentEvent::Complete => {}
    }
}
