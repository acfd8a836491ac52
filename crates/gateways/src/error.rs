// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error taxonomy shared by the gateway plugins.

use thiserror::Error;

/// Errors raised while loading or running a gateway plugin
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error(transparent)]
    Config(#[from] sg_config::ConfigError),
    #[error(transparent)]
    House(#[from] sg_house::HouseError),
    #[error(transparent)]
    Session(#[from] sg_net::SessionError),
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("layout error: {0}")]
    Layout(String),
    #[error("http request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("unexpected response: {0}")]
    Protocol(String),
    #[error("rule references missing device: {0}")]
    MissingDevice(String),
    #[error("{0}")]
    Io(#[from] std::io::Error),
}
