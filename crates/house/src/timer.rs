// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Relative-delay callback scheduling with cancellation.
//!
//! One dispatch task sleeps until the earliest pending event or until the
//! pending set is mutated, whichever comes sooner. Handlers whose firing
//! times differ fire in time order; equal fire times fire in insertion
//! order. A handler failure is logged and does not affect other handlers.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio::sync::Notify;
use tracing::{debug, error};

use sg_core::Clock;

type HandlerFuture = Pin<Box<dyn Future<Output = ()> + Send>>;
type Handler = Box<dyn FnOnce() -> HandlerFuture + Send>;

struct TimerEvent {
    token: u64,
    fires_at: Instant,
    handler: Handler,
}

/// Pending timer events, pure of any task machinery so it can be driven by
/// a fake clock in tests.
#[derive(Default)]
pub struct TimerQueue {
    next_token: u64,
    pending: Vec<TimerEvent>,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an event; returns a token usable with [`TimerQueue::cancel`].
    pub fn add<F, Fut>(&mut self, delay: Duration, handler: F, now: Instant) -> u64
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        self.next_token += 1;
        let token = self.next_token;
        self.pending.push(TimerEvent {
            token,
            fires_at: now + delay,
            handler: Box::new(move || -> HandlerFuture { Box::pin(handler()) }),
        });
        token
    }

    /// Remove an event. Unknown tokens cancel to no-op.
    pub fn cancel(&mut self, token: u64) -> bool {
        let before = self.pending.len();
        self.pending.retain(|e| e.token != token);
        self.pending.len() != before
    }

    /// Remove and return every event due at `now`, in firing order.
    /// Insertion order breaks ties (tokens are monotonic).
    pub fn due(&mut self, now: Instant) -> Vec<(u64, Handler)> {
        let mut ready: Vec<TimerEvent> = Vec::new();
        let mut remaining = Vec::with_capacity(self.pending.len());
        for event in self.pending.drain(..) {
            if event.fires_at <= now {
                ready.push(event);
            } else {
                remaining.push(event);
            }
        }
        self.pending = remaining;
        ready.sort_by_key(|e| (e.fires_at, e.token));
        ready.into_iter().map(|e| (e.token, e.handler)).collect()
    }

    /// Earliest pending fire time.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.iter().map(|e| e.fires_at).min()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

/// The timer service: a [`TimerQueue`] plus its dispatch task.
pub struct Timer {
    queue: Mutex<TimerQueue>,
    changed: Notify,
    clock: Arc<dyn Clock>,
}

impl Timer {
    /// Start the dispatch task. Must run inside a tokio runtime.
    pub fn start(clock: Arc<dyn Clock>) -> Arc<Self> {
        let timer = Arc::new(Self {
            queue: Mutex::new(TimerQueue::new()),
            changed: Notify::new(),
            clock,
        });
        let dispatch = Arc::clone(&timer);
        tokio::spawn(async move {
            dispatch.run().await;
        });
        timer
    }

    /// Schedule `handler` to run `delay` from now; returns a cancellation
    /// token.
    pub fn add_event<F, Fut>(&self, delay: Duration, handler: F) -> u64
    where
        F: FnOnce() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let token = {
            let mut queue = self.queue.lock();
            queue.add(delay, handler, self.clock.now())
        };
        debug!(token, delay_ms = delay.as_millis() as u64, "timer event added");
        self.changed.notify_one();
        token
    }

    /// Cancel a pending event; unknown tokens are a no-op.
    pub fn cancel_event(&self, token: u64) {
        let removed = self.queue.lock().cancel(token);
        if removed {
            debug!(token, "timer event cancelled");
        }
        self.changed.notify_one();
    }

    pub fn pending_count(&self) -> usize {
        self.queue.lock().len()
    }

    async fn run(self: Arc<Self>) {
        loop {
            let deadline = self.queue.lock().next_deadline();
            match deadline {
                Some(deadline) => {
                    let wait = deadline.saturating_duration_since(self.clock.now());
                    tokio::select! {
                        _ = self.changed.notified() => continue,
                        _ = tokio::time::sleep(wait) => {}
                    }
                }
                None => self.changed.notified().await,
            }

            let ready = {
                let mut queue = self.queue.lock();
                queue.due(self.clock.now())
            };
            for (token, handler) in ready {
                // One task per handler so a panicking handler is contained
                // and later handlers still run, in order.
                let outcome = tokio::spawn(handler()).await;
                if let Err(e) = outcome {
                    error!(token, error = %e, "timer handler failed");
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "timer_tests.rs"]
mod tests;
