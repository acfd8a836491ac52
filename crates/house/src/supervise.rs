// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Task supervision: background-task failures are logged and forwarded to
//! a central exception sink instead of dying silently.

use std::future::Future;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::error;

/// Spawns background tasks and reports their failures.
///
/// The receiver half returned by [`Supervisor::new`] delivers one message per
/// failed task; the daemon drains it into the exception reporting alias.
#[derive(Clone)]
pub struct Supervisor {
    tx: mpsc::UnboundedSender<String>,
}

impl Supervisor {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Spawn a supervised task. A panic inside `fut` is contained, logged,
    /// and forwarded to the exception sink; other tasks are unaffected.
    pub fn spawn<F>(&self, name: &str, fut: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let name = name.to_string();
        let tx = self.tx.clone();
        tokio::spawn(async move {
            let inner = tokio::spawn(fut);
            if let Err(e) = inner.await {
                error!(task = %name, error = %e, "background task failed");
                let _ = tx.send(format!("background task '{name}' failed: {e}"));
            }
        })
    }
}

#[cfg(test)]
#[path = "supervise_tests.rs"]
mod tests;
