// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Schema creation and version checking.

use rusqlite::Connection;
use tracing::debug;

use crate::persistence::PersistenceError;

/// Schema version this build reads and writes.
pub const SCHEMA_VERSION: i64 = 1;

const CREATE_SCHEMA: &str = "
-- version the schema itself
CREATE TABLE schema_version (object TEXT PRIMARY KEY, version INTEGER NOT NULL);

-- map from (gateway name, id meaningful only within that gateway) to the
-- unique stable integer id used by the event log; areas share this table
-- under a reserved gateway id
CREATE TABLE device_map (
    gateway_id     TEXT NOT NULL,
    gateway_devid  TEXT NOT NULL,
    sg_device_id   INTEGER PRIMARY KEY AUTOINCREMENT
);
CREATE INDEX device_map_index ON device_map(gateway_id, gateway_devid);

-- per-device event log; event_code 1=changed 2=checkpoint 3=restart
CREATE TABLE device_events (
    sg_device_id  INTEGER NOT NULL,
    event_code    INTEGER NOT NULL,
    level         INTEGER NOT NULL,
    event_ts      TEXT NOT NULL,
    FOREIGN KEY(sg_device_id) REFERENCES device_map(sg_device_id)
);
CREATE INDEX device_events_index ON device_events(sg_device_id, event_ts);
";

/// Create the schema if absent, or verify the persisted version matches.
pub fn init(conn: &Connection) -> Result<(), PersistenceError> {
    let existing: i64 = conn.query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='schema_version'",
        [],
        |row| row.get(0),
    )?;

    if existing == 0 {
        debug!("init_schema: creating tables");
        conn.execute_batch(CREATE_SCHEMA)?;
        conn.execute(
            "INSERT INTO schema_version VALUES('stargate', ?1)",
            [SCHEMA_VERSION],
        )?;
        return Ok(());
    }

    let persisted: i64 = conn.query_row(
        "SELECT version FROM schema_version WHERE object='stargate'",
        [],
        |row| row.get(0),
    )?;
    debug!(
        runtime = SCHEMA_VERSION,
        persisted, "init_schema: reusing existing tables"
    );
    if persisted > SCHEMA_VERSION {
        return Err(PersistenceError::SchemaFromFuture {
            persisted,
            runtime: SCHEMA_VERSION,
        });
    }
    if persisted < SCHEMA_VERSION {
        return Err(PersistenceError::UpgradeUnsupported {
            persisted,
            runtime: SCHEMA_VERSION,
        });
    }
    Ok(())
}
