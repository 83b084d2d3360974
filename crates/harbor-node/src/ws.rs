// Copyright (c) 2024-2026 Harbor Contributors
//
// SPDX-License-Identifier: Apache-2.0
//!
//! WebSocket handler — translates browser connections to the internal
//! [`BridgeCommand`] / [`ServerFrame`] protocol.
//!
//! JSON over text frames: comfortable for browsers, trivially debuggable
//! with websocat.  Each connection is one subscription on the bridge's
//! broadcast stream; a connection that lags behind the stream is told so and
//! keeps receiving from the current position rather than stalling others.

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    response::Response,
};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::bridge::{BridgeCommand, BridgeHandle};
use crate::protocol::{ClientFrame, ServerFrame};

/// HTTP handler for GET /ws.
pub async fn ws_handler(ws: WebSocketUpgrade, State(bridge): State<BridgeHandle>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, bridge))
}

pub async fn handle_socket(mut socket: WebSocket, bridge: BridgeHandle) {
    info!("browser client connected");
    let mut events = bridge.subscribe();

    loop {
        tokio::select! {
            // Inbound frame from the browser.
            msg = socket.recv() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ClientFrame>(&text) {
                            Ok(frame) => {
                                if let Err(e) = forward_frame(frame, &bridge).await {
                                    warn!("failed to forward frame: {e}");
                                    break;
                                }
                            }
                            Err(e) => {
                                warn!("invalid client frame: {e}");
                                send_frame(&mut socket, &ServerFrame::Error {
                                    message: format!("invalid JSON frame: {e}"),
                                    busy: None,
                                }).await;
                            }
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if socket.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {} // binary frames ignored on this endpoint
                    Some(Err(e)) => {
                        debug!("WebSocket recv error: {e}");
                        break;
                    }
                }
            }
            // Outbound frame from the bridge.
            result = events.recv() => {
                match result {
                    Ok(frame) => send_frame(&mut socket, &frame).await,
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!("browser client lagged by {n} frames");
                        send_frame(&mut socket, &ServerFrame::Warning {
                            message: format!("event stream lagged by {n} frames"),
                        }).await;
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    info!("browser client disconnected");
}

async fn forward_frame(
    frame: ClientFrame,
    bridge: &BridgeHandle,
) -> Result<(), crate::error::BridgeError> {
    match frame {
        ClientFrame::UserMessage { content, source } => {
            bridge.send(BridgeCommand::UserMessage { content, source }).await
        }
        ClientFrame::ModeRequest { mode, reason } => {
            bridge.send(BridgeCommand::ModeRequest { mode, reason }).await
        }
        ClientFrame::ConfirmMode { approve } => {
            bridge.send(BridgeCommand::ConfirmMode { approve }).await
        }
        ClientFrame::Cancel => bridge.send(BridgeCommand::Cancel).await,
        // Terminal frames belong to the /terminal endpoint, which has its
        // own PTY-backed handler; here they are a client mistake.
        ClientFrame::TerminalCreate { .. }
        | ClientFrame::TerminalInput { .. }
        | ClientFrame::TerminalResize { .. } => {
            warn!("terminal frame received on the agent endpoint; ignored");
            Ok(())
        }
    }
}

pub(crate) async fn send_frame(socket: &mut WebSocket, frame: &ServerFrame) {
    if let Ok(json) = serde_json::to_string(frame) {
        let _ = socket.send(Message::Text(json)).await;
    }
}
