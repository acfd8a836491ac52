// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Socket watchdog: detects dead sessions and drives reconnection.
//!
//! Each registration gets its own monitor task waiting on the session's
//! closed-signal (the runtime's notification primitive stands in for the
//! classic error-select + self-pipe). On failure the monitor tears the
//! session down (close, poke blocked senders, join worker tasks) and then
//! drives the reconnect thunk with truncated exponential backoff. A
//! successful reconnect re-registers itself; reconnects for different
//! sessions never block each other.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::backoff::Backoff;
use crate::session::LineSession;

/// Error type reconnect thunks may raise; the watchdog only logs it.
pub type ReconnectError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// An idempotent reconnect callback. May be invoked repeatedly in the face
/// of persistent failure.
#[async_trait]
pub trait Reconnect: Send + Sync {
    async fn reconnect(&self) -> Result<(), ReconnectError>;
}

/// Process-wide watchdog over registered gateway sessions.
#[derive(Default)]
pub struct Watchdog {
    next_id: AtomicU64,
    // Registration map; entries are pruned when their monitor takes over
    // teardown. Kept for introspection and logging.
    registrations: Mutex<HashMap<u64, String>>,
}

impl Watchdog {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Register a session, its worker tasks, and a reconnect thunk.
    /// Safe to call from any task.
    pub fn add(
        self: &Arc<Self>,
        session: Arc<LineSession>,
        workers: Vec<JoinHandle<()>>,
        reconnect: Arc<dyn Reconnect>,
    ) {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.registrations
            .lock()
            .insert(id, session.label().to_string());
        let watchdog = Arc::clone(self);
        tokio::spawn(async move {
            watchdog.monitor(id, session, workers, reconnect).await;
        });
    }

    /// Number of currently-registered sessions.
    pub fn active_count(&self) -> usize {
        self.registrations.lock().len()
    }

    async fn monitor(
        self: Arc<Self>,
        id: u64,
        session: Arc<LineSession>,
        workers: Vec<JoinHandle<()>>,
        reconnect: Arc<dyn Reconnect>,
    ) {
        session.closed().await;
        self.registrations.lock().remove(&id);
        info!(session = %session.label(), "session closed, tearing down");

        // Teardown: make sure the socket is closed, wake any blocked sender
        // with a sentinel, then wait for the workers to finish.
        session.close();
        session.poke();
        for worker in workers {
            if let Err(e) = worker.await {
                warn!(session = %session.label(), error = %e, "worker task join failed");
            }
        }

        for delay in Backoff::new() {
            info!(
                session = %session.label(),
                delay_secs = delay.as_secs(),
                "reconnect scheduled"
            );
            tokio::time::sleep(delay).await;
            match reconnect.reconnect().await {
                Ok(()) => {
                    // The thunk re-registered a fresh session on its way out.
                    info!(session = %session.label(), "reconnected");
                    return;
                }
                Err(e) => {
                    warn!(session = %session.label(), error = %e, "reconnect failed");
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "watchdog_tests.rs"]
mod tests;
