// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Canonical per-(class, type) ordering of device states.
//!
//! Each gateway supplies its device types' state order as a partial sequence
//! at registration time; the registry merges partial sequences conservatively.
//! Conflicts (a cycle in the implied order) resolve first-come-first-served.

use crate::device::DevClass;
use std::collections::HashMap;

/// Incrementally-built canonical state orderings.
#[derive(Debug, Default)]
pub struct StateOrdering {
    orders: HashMap<(DevClass, String), Vec<String>>,
}

impl StateOrdering {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge a partial state sequence for one (class, type) pair.
    ///
    /// States already present keep their stored position: when the partial
    /// sequence reaches a known state, every stored state before it is
    /// consumed into the result first. Unknown states are appended where the
    /// partial sequence puts them. A state the partial order places *earlier*
    /// than the stored order is a conflict and is left where it was.
    pub fn register(&mut self, devclass: DevClass, devtype: &str, partial: &[&str]) {
        let stored = self
            .orders
            .entry((devclass, devtype.to_string()))
            .or_default();
        *stored = merge_partial(stored, partial);
    }

    /// Order the given states canonically for a (class, type) pair.
    ///
    /// States with no canonical position are appended in their input order.
    pub fn order(&self, devclass: DevClass, devtype: &str, states: &[String]) -> Vec<String> {
        let canonical = self.orders.get(&(devclass, devtype.to_string()));
        let mut result = Vec::with_capacity(states.len());
        if let Some(canonical) = canonical {
            for state in canonical {
                if states.contains(state) && !result.contains(state) {
                    result.push(state.clone());
                }
            }
        }
        for state in states {
            if !result.contains(state) {
                result.push(state.clone());
            }
        }
        result
    }

    /// The full canonical sequence for a (class, type) pair, if any.
    pub fn canonical(&self, devclass: DevClass, devtype: &str) -> Option<&[String]> {
        self.orders
            .get(&(devclass, devtype.to_string()))
            .map(Vec::as_slice)
    }
}

fn merge_partial(stored: &[String], partial: &[&str]) -> Vec<String> {
    let mut result = Vec::with_capacity(stored.len() + partial.len());
    let mut idx = 0;
    for &state in partial {
        if let Some(pos) = stored[idx..].iter().position(|s| s == state) {
            // Consume everything up to and including the known state.
            result.extend_from_slice(&stored[idx..idx + pos + 1]);
            idx += pos + 1;
        } else if stored[..idx].iter().any(|s| s == state) {
            // Conflict: the partial order disagrees with the stored order.
            // First registration wins.
            continue;
        } else {
            result.push(state.to_string());
        }
    }
    result.extend_from_slice(&stored[idx..]);
    result
}

#[cfg(test)]
#[path = "states_tests.rs"]
mod tests;
