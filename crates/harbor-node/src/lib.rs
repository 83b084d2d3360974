// Copyright (c) 2024-2026 Harbor Contributors
//
// SPDX-License-Identifier: Apache-2.0
mod bridge;
mod error;
pub mod protocol;
mod server;
pub mod terminal;
mod ws;

pub use bridge::{BridgeCommand, BridgeHandle, SessionBridge};
pub use error::BridgeError;
pub use protocol::{frame_from_event, ClientFrame, MessageSource, ServerFrame};
pub use server::{router, serve};
pub use terminal::TerminalSettings;
