// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! sg-config: the structured configuration document loaded at startup.

mod config;

pub use config::{
    AuthenticateConfig, Config, ConfigError, DatabaseConfig, EmailSection, GatewayConfig,
    HouseSection, LoggingConfig, NotificationsConfig, ReportingSection, ServerConfig,
};
