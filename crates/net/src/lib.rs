// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! sg-net: connection plumbing for gateways with long-lived stateful
//! TCP connections: CRLF line sessions and the reconnect watchdog.

pub mod backoff;
pub mod session;
pub mod watchdog;

pub use backoff::Backoff;
pub use session::{LineSession, SessionError};
pub use watchdog::{Reconnect, ReconnectError, Watchdog};
