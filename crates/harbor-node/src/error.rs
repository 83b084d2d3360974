// Copyright (c) 2024-2026 Harbor Contributors
//
// SPDX-License-Identifier: Apache-2.0
use thiserror::Error;

#[derive(Debug, Error)]
pub enum BridgeError {
    #[error("bind error: {0}")]
    Bind(#[from] std::io::Error),

    #[error("bridge has shut down")]
    BridgeClosed,

    #[error("terminal error: {0}")]
    Terminal(String),

    #[error("configuration error: {0}")]
    Config(String),
}
