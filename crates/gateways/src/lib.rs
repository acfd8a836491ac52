// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! sg-gateways: the gateway plugins (Lutron RadioRa2, DSC PowerSeries,
//! MiCasaVerde Vera, and the cross-gateway synthesizer) plus the
//! dependency-ordered loader.

#[cfg(test)]
mod testutil;

pub mod dsc;
pub mod error;
pub mod loader;
pub mod lutron;
pub mod stale;
pub mod synther;
pub mod vera;

pub use error::GatewayError;
pub use loader::{builtin_plugins, load_all, GatewayPlugin};
pub use stale::CacheValue;
