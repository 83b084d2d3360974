// Copyright (c) 2024-2026 Harbor Contributors
//
// SPDX-License-Identifier: Apache-2.0
use std::sync::Arc;

use axum::{routing::get, Router};
use tracing::info;

use harbor_config::NodeConfig;

use crate::bridge::BridgeHandle;
use crate::error::BridgeError;
use crate::terminal::{self, TerminalSettings};
use crate::ws;

/// Build the HTTP router: `/ws` for the agent bridge, `/terminal` for the
/// raw PTY pass-through.  Either endpoint can be disabled in config.
pub fn router(cfg: &NodeConfig, bridge: BridgeHandle) -> Router {
    let mut app = Router::new();

    if cfg.enable_bridge {
        app = app.merge(
            Router::new()
                .route("/ws", get(ws::ws_handler))
                .with_state(bridge),
        );
    }

    if cfg.enable_terminal {
        let settings = Arc::new(TerminalSettings::from_config(cfg));
        app = app.merge(
            Router::new()
                .route("/terminal", get(terminal::terminal_handler))
                .with_state(settings),
        );
    }

    app
}

/// Bind and serve until the process exits.
pub async fn serve(cfg: &NodeConfig, bridge: BridgeHandle) -> Result<(), BridgeError> {
    let app = router(cfg, bridge);
    let listener = tokio::net::TcpListener::bind(&cfg.bind).await?;
    info!(bind = %cfg.bind, "node listening");
    axum::serve(listener, app).await?;
    Ok(())
}
