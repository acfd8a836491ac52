// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persisted device-event kinds and records.
//!
//! The engine can be stopped and restarted, and while stopped it misses
//! gateway events. RESTART marks "we don't know what happened before this";
//! CHECKPOINT bounds the interval over which time-in-state claims hold while
//! running; CHANGED is the only kind that counts as a user action.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of a persisted device event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A user-originated state change.
    Changed,
    /// Periodic "no change since last event" marker carrying the current level.
    Checkpoint,
    /// Process restart; prior state unknown.
    Restart,
}

impl EventKind {
    /// Stable integer code stored in the database.
    pub fn code(self) -> i64 {
        match self {
            EventKind::Changed => 1,
            EventKind::Checkpoint => 2,
            EventKind::Restart => 3,
        }
    }

    pub fn from_code(code: i64) -> Option<Self> {
        match code {
            1 => Some(EventKind::Changed),
            2 => Some(EventKind::Checkpoint),
            3 => Some(EventKind::Restart),
            _ => None,
        }
    }
}

/// One row of a device's event log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceEvent {
    pub device_id: i64,
    pub kind: EventKind,
    pub level: i64,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
