// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persistence layer tracking device state changes, history, and statistics.
//!
//! A note on timekeeping: while the process is stopped we miss gateway events
//! and there is no way to catch up after restart. The log therefore carries
//! three event kinds: RESTART ("nothing known before this"), CHECKPOINT
//! ("still in this state as of this time"), and CHANGED (an actual user
//! action). Time-in-state answers are computed only over intervals the log
//! can vouch for; anything across a RESTART is unknown time.

use chrono::{DateTime, Duration, SecondsFormat, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use sg_core::{Clock, DeviceEvent, EventKind};

use crate::schema;

/// Reserved gateway id under which area names are mapped to stable ids.
pub const AREA_GATEWAY_ID: &str = "_area";

/// Errors from persistence operations
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("database error: {0}")]
    Db(#[from] rusqlite::Error),
    #[error("unparseable event timestamp: {0}")]
    BadTimestamp(String),
    #[error("database schema is from the future (persisted v{persisted}, runtime v{runtime})")]
    SchemaFromFuture { persisted: i64, runtime: i64 },
    #[error("database schema upgrade not implemented (persisted v{persisted}, runtime v{runtime})")]
    UpgradeUnsupported { persisted: i64, runtime: i64 },
}

/// Durable log of per-device events plus derived statistics.
///
/// All operations serialize behind one lock; every public call commits before
/// returning.
pub struct Persistence {
    conn: Mutex<Connection>,
    clock: Arc<dyn Clock>,
}

impl Persistence {
    /// Open (creating or validating the schema of) the database file.
    pub fn open(path: impl AsRef<Path>, clock: Arc<dyn Clock>) -> Result<Self, PersistenceError> {
        let conn = Connection::open(path)?;
        schema::init(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            clock,
        })
    }

    /// In-memory database, for tests and ephemeral runs.
    pub fn open_in_memory(clock: Arc<dyn Clock>) -> Result<Self, PersistenceError> {
        let conn = Connection::open_in_memory()?;
        schema::init(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            clock,
        })
    }

    /// Stable integer id for a (gateway, device) pair; insert-if-absent.
    pub fn get_device_id(
        &self,
        gateway_id: &str,
        gateway_devid: &str,
    ) -> Result<i64, PersistenceError> {
        let conn = self.conn.lock();
        let existing: Option<i64> = conn
            .query_row(
                "SELECT sg_device_id FROM device_map WHERE gateway_id=?1 AND gateway_devid=?2",
                params![gateway_id, gateway_devid],
                |row| row.get(0),
            )
            .optional()?;
        if let Some(id) = existing {
            return Ok(id);
        }
        conn.execute(
            "INSERT INTO device_map(gateway_id, gateway_devid) VALUES(?1, ?2)",
            params![gateway_id, gateway_devid],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Stable integer id for an area name; insert-if-absent.
    pub fn get_area_id(&self, name: &str) -> Result<i64, PersistenceError> {
        self.get_device_id(AREA_GATEWAY_ID, name)
    }

    /// Record a RESTART event: the device's state as first observed this run.
    pub fn record_startup(&self, device_id: i64, level: i64) -> Result<(), PersistenceError> {
        let conn = self.conn.lock();
        let ts = self.next_event_ts(&conn, device_id)?;
        insert_event(&conn, device_id, EventKind::Restart, level, ts)?;
        Ok(())
    }

    /// Record a CHANGED event (a user action).
    ///
    /// If the device's newest prior event is a CHECKPOINT it is overwritten in
    /// place, keeping the log compact across quiet stretches.
    pub fn record_change(&self, device_id: i64, level: i64) -> Result<(), PersistenceError> {
        let conn = self.conn.lock();
        let ts = self.next_event_ts(&conn, device_id)?;
        let newest = newest_event_row(&conn, device_id)?;
        if let Some(ref row) = newest {
            if row.kind == EventKind::Checkpoint {
                conn.execute(
                    "UPDATE device_events SET event_code=?1, level=?2, event_ts=?3 WHERE rowid=?4",
                    params![
                        EventKind::Changed.code(),
                        level,
                        format_ts(ts),
                        row.rowid
                    ],
                )?;
                return Ok(());
            }
        }
        insert_event(&conn, device_id, EventKind::Changed, level, ts)?;
        Ok(())
    }

    /// Emit or coalesce a CHECKPOINT for every device with a recorded event.
    ///
    /// Advances the "last known" timestamp without implying a state change.
    /// Returns the number of devices checkpointed.
    pub fn checkpoint_all(&self) -> Result<usize, PersistenceError> {
        let conn = self.conn.lock();
        let device_ids: Vec<i64> = {
            let mut stmt =
                conn.prepare("SELECT DISTINCT sg_device_id FROM device_events")?;
            let rows = stmt.query_map([], |row| row.get(0))?;
            rows.collect::<Result<_, _>>()?
        };
        for &device_id in &device_ids {
            let ts = self.next_event_ts(&conn, device_id)?;
            let Some(newest) = newest_event_row(&conn, device_id)? else {
                continue;
            };
            if newest.kind == EventKind::Checkpoint {
                conn.execute(
                    "UPDATE device_events SET event_ts=?1 WHERE rowid=?2",
                    params![format_ts(ts), newest.rowid],
                )?;
            } else {
                insert_event(&conn, device_id, EventKind::Checkpoint, newest.level, ts)?;
            }
        }
        debug!(devices = device_ids.len(), "checkpoint complete");
        Ok(device_ids.len())
    }

    /// Time since the device's most recent non-CHECKPOINT event.
    ///
    /// Returns `None` when nothing is recorded or when that event is a
    /// RESTART (the last change predates anything we can vouch for).
    pub fn get_delta_since_change(
        &self,
        device_id: i64,
    ) -> Result<Option<Duration>, PersistenceError> {
        let conn = self.conn.lock();
        let row: Option<(i64, String)> = conn
            .query_row(
                "SELECT event_code, event_ts FROM device_events
                 WHERE sg_device_id=?1 AND event_code != ?2
                 ORDER BY event_ts DESC LIMIT 1",
                params![device_id, EventKind::Checkpoint.code()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        match row {
            None => Ok(None),
            Some((code, _)) if code == EventKind::Restart.code() => Ok(None),
            Some((_, ts)) => {
                let ts = parse_ts(&ts)?;
                Ok(Some(self.clock.now_utc() - ts))
            }
        }
    }

    /// Number of CHANGED events, optionally limited to the trailing window.
    pub fn get_action_count(
        &self,
        device_id: i64,
        age_limit: Option<Duration>,
    ) -> Result<i64, PersistenceError> {
        let conn = self.conn.lock();
        let count = match age_limit {
            Some(age) => {
                let cutoff = self.clock.now_utc() - age;
                conn.query_row(
                    "SELECT COUNT(*) FROM device_events
                     WHERE sg_device_id=?1 AND event_code=?2 AND event_ts > ?3",
                    params![device_id, EventKind::Changed.code(), format_ts(cutoff)],
                    |row| row.get(0),
                )?
            }
            None => conn.query_row(
                "SELECT COUNT(*) FROM device_events
                 WHERE sg_device_id=?1 AND event_code=?2",
                params![device_id, EventKind::Changed.code()],
                |row| row.get(0),
            )?,
        };
        Ok(count)
    }

    /// Total time the device has verifiably spent with its level matching the
    /// requested truthiness (level > 0 is "on").
    ///
    /// Walks adjacent event pairs: an interval counts when it starts at a
    /// CHANGED or RESTART event (a known state) and ends at a CHANGED or
    /// CHECKPOINT event (a bounded claim). The open interval from the last
    /// event to now is included when the last known level matches.
    pub fn get_time_in_state(
        &self,
        device_id: i64,
        state: bool,
    ) -> Result<Duration, PersistenceError> {
        let conn = self.conn.lock();
        let events = load_events(&conn, device_id)?;
        let mut total = Duration::zero();
        for pair in events.windows(2) {
            let (prev, cur) = (&pair[0], &pair[1]);
            let starts_known = matches!(prev.kind, EventKind::Changed | EventKind::Restart);
            let ends_bounded = matches!(cur.kind, EventKind::Changed | EventKind::Checkpoint);
            if starts_known && ends_bounded && truthy(prev.level) == state {
                total += cur.timestamp - prev.timestamp;
            }
        }
        if let Some(last) = events.last() {
            if truthy(last.level) == state {
                total += self.clock.now_utc() - last.timestamp;
            }
        }
        Ok(total)
    }

    /// Recent events for a set of devices, newest first.
    pub fn get_recent_events(
        &self,
        device_ids: &[i64],
        count: usize,
    ) -> Result<Vec<DeviceEvent>, PersistenceError> {
        if device_ids.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.conn.lock();
        let placeholders = vec!["?"; device_ids.len()].join(",");
        let sql = format!(
            "SELECT sg_device_id, event_code, level, event_ts FROM device_events
             WHERE sg_device_id IN ({placeholders})
             ORDER BY event_ts DESC LIMIT {count}"
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(rusqlite::params_from_iter(device_ids.iter()), |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, i64>(2)?,
                row.get::<_, String>(3)?,
            ))
        })?;
        let mut events = Vec::new();
        for row in rows {
            let (device_id, code, level, ts) = row?;
            let Some(kind) = EventKind::from_code(code) else {
                continue;
            };
            events.push(DeviceEvent {
                device_id,
                kind,
                level,
                timestamp: parse_ts(&ts)?,
            });
        }
        Ok(events)
    }

    /// All events for one device, oldest first. Primarily for tests and the
    /// external read API.
    pub fn get_all_events(&self, device_id: i64) -> Result<Vec<DeviceEvent>, PersistenceError> {
        let conn = self.conn.lock();
        load_events(&conn, device_id)
    }

    /// Event timestamp for a new record, bumped past the device's newest
    /// existing timestamp so no two events for one device ever collide.
    fn next_event_ts(
        &self,
        conn: &Connection,
        device_id: i64,
    ) -> Result<DateTime<Utc>, PersistenceError> {
        let now = self.clock.now_utc();
        let newest: Option<String> = conn
            .query_row(
                "SELECT event_ts FROM device_events WHERE sg_device_id=?1
                 ORDER BY event_ts DESC LIMIT 1",
                params![device_id],
                |row| row.get(0),
            )
            .optional()?;
        match newest {
            Some(ts) => {
                let newest = parse_ts(&ts)?;
                if now <= newest {
                    Ok(newest + Duration::microseconds(1))
                } else {
                    Ok(now)
                }
            }
            None => Ok(now),
        }
    }
}

fn truthy(level: i64) -> bool {
    level > 0
}

fn format_ts(ts: DateTime<Utc>) -> String {
    // Fixed-width UTC RFC 3339 so lexicographic ORDER BY is chronological.
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn parse_ts(s: &str) -> Result<DateTime<Utc>, PersistenceError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| PersistenceError::BadTimestamp(s.to_string()))
}

struct EventRow {
    rowid: i64,
    kind: EventKind,
    level: i64,
}

fn newest_event_row(
    conn: &Connection,
    device_id: i64,
) -> Result<Option<EventRow>, PersistenceError> {
    let row: Option<(i64, i64, i64)> = conn
        .query_row(
            "SELECT rowid, event_code, level FROM device_events WHERE sg_device_id=?1
             ORDER BY event_ts DESC LIMIT 1",
            params![device_id],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )
        .optional()?;
    Ok(row.and_then(|(rowid, code, level)| {
        EventKind::from_code(code).map(|kind| EventRow { rowid, kind, level })
    }))
}

fn insert_event(
    conn: &Connection,
    device_id: i64,
    kind: EventKind,
    level: i64,
    ts: DateTime<Utc>,
) -> Result<(), PersistenceError> {
    conn.execute(
        "INSERT INTO device_events(sg_device_id, event_code, level, event_ts)
         VALUES(?1, ?2, ?3, ?4)",
        params![device_id, kind.code(), level, format_ts(ts)],
    )?;
    Ok(())
}

fn load_events(conn: &Connection, device_id: i64) -> Result<Vec<DeviceEvent>, PersistenceError> {
    let mut stmt = conn.prepare(
        "SELECT event_code, level, event_ts FROM device_events WHERE sg_device_id=?1
         ORDER BY event_ts ASC",
    )?;
    let rows = stmt.query_map(params![device_id], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, i64>(1)?,
            row.get::<_, String>(2)?,
        ))
    })?;
    let mut events = Vec::new();
    for row in rows {
        let (code, level, ts) = row?;
        let Some(kind) = EventKind::from_code(code) else {
            continue;
        };
        events.push(DeviceEvent {
            device_id,
            kind,
            level,
            timestamp: parse_ts(&ts)?,
        });
    }
    Ok(events)
}

#[cfg(test)]
#[path = "persistence_tests.rs"]
mod tests;
