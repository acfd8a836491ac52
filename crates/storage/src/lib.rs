// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! sg-storage: durable per-device event log atop SQLite.

mod persistence;
mod schema;

pub use persistence::{Persistence, PersistenceError, AREA_GATEWAY_ID};
