// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stale-or-fresh cache values.
//!
//! Gateway caches initialize every watched entity to [`CacheValue::Stale`]
//! and fill in real values as the gateway confirms them. Synchronous reads
//! poll until a fresh value appears; there is deliberately no timeout (a
//! stale read only blocks during startup races, and the gateway's own
//! refill is the thing being waited on).

use std::time::Duration;

/// How often a blocked reader re-checks a stale entry.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// A cached gateway value that may not have been confirmed yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheValue<T> {
    /// Not yet reported by the gateway.
    Stale,
    Fresh(T),
}

impl<T: Copy> CacheValue<T> {
    pub fn fresh(self) -> Option<T> {
        match self {
            CacheValue::Stale => None,
            CacheValue::Fresh(v) => Some(v),
        }
    }

    pub fn is_stale(self) -> bool {
        matches!(self, CacheValue::Stale)
    }
}

#[cfg(test)]
#[path = "stale_tests.rs"]
mod tests;
