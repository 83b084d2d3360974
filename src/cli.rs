// Copyright (c) 2024-2026 Harbor Contributors
//
// SPDX-License-Identifier: Apache-2.0
use std::path::PathBuf;

use clap::{ArgAction, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(
    name = "harbor",
    about = "A coding agent runtime that bridges one session across terminal and browser",
    version
)]
pub struct Cli {
    /// Increase log verbosity (-v: debug, -vv: trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Explicit config file (merged over the discovered layers)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Workspace root the tools operate on (default: current directory)
    #[arg(long, global = true)]
    pub workspace: Option<PathBuf>,

    /// Starting mode (plan | agent | tester | debugger | security | review)
    #[arg(long, global = true)]
    pub mode: Option<String>,

    /// Preview mutations without applying them
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Prompt for a one-shot turn; reads stdin when omitted
    pub prompt: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Start the node: WebSocket bridge and raw terminal endpoints
    Serve,
    /// Print the merged configuration and exit
    ShowConfig,
}
