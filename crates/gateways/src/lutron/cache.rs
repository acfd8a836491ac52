// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Low-level cache of last seen level for each watched entity (output,
//! button, LED).
//!
//! Reads of a stale value trigger a refresh query (unless one is already in
//! flight) and poll until the repeater's answer lands. Refresh attribution
//! is counted per iid: each dispatched refresh increments, each incoming
//! record decrements, and a record arriving while the count is positive is
//! attributed to our own refresh rather than to a user action. The
//! synthesizer may trigger any number of concurrent refreshes, so a boolean
//! flag would under- or over-count.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, warn};

use crate::stale::{CacheValue, POLL_INTERVAL};

/// One recorded repeater observation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LutronRecord {
    Output { iid: u32, level: f64 },
    Button { iid: u32, cid: u32, pressed: bool },
    Led { iid: u32, cid: u32, on: bool },
}

impl LutronRecord {
    pub fn iid(&self) -> u32 {
        match *self {
            LutronRecord::Output { iid, .. }
            | LutronRecord::Button { iid, .. }
            | LutronRecord::Led { iid, .. } => iid,
        }
    }
}

/// Subscriber to cache records. `refresh` is true when the record answers a
/// refresh query of ours instead of reporting a user action.
#[async_trait]
pub trait LutronActionHandler: Send + Sync {
    async fn on_action(&self, record: LutronRecord, refresh: bool);
}

/// Where the cache sends its refresh queries (the repeater session).
pub trait RefreshSink: Send + Sync {
    fn send_refresh(&self, command: String);
}

/// Placeholder used only to build an always-empty `Weak<dyn RefreshSink>`
/// (std's `Weak::new` requires a sized type for the unsized coercion).
struct NoRefreshSink;
impl RefreshSink for NoRefreshSink {
    fn send_refresh(&self, _command: String) {}
}

pub struct OutputCache {
    sink: RwLock<Weak<dyn RefreshSink>>,
    outputs: Mutex<HashMap<u32, CacheValue<f64>>>,
    buttons: Mutex<HashMap<(u32, u32), CacheValue<bool>>>,
    leds: Mutex<HashMap<(u32, u32), CacheValue<bool>>>,
    refresh_counts: Mutex<HashMap<u32, u32>>,
    subscribers: Mutex<Vec<Arc<dyn LutronActionHandler>>>,
}

impl Default for OutputCache {
    fn default() -> Self {
        Self {
            sink: RwLock::new(Weak::<NoRefreshSink>::new()),
            outputs: Mutex::new(HashMap::new()),
            buttons: Mutex::new(HashMap::new()),
            leds: Mutex::new(HashMap::new()),
            refresh_counts: Mutex::new(HashMap::new()),
            subscribers: Mutex::new(Vec::new()),
        }
    }
}

impl OutputCache {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    // -- watch setup (before the repeater connects) --------------------------

    pub fn watch_output(&self, iid: u32) {
        self.outputs.lock().insert(iid, CacheValue::Stale);
    }

    pub fn watch_device(&self, iid: u32, button_cids: &[u32], led_cids: &[u32]) {
        let mut buttons = self.buttons.lock();
        for &cid in button_cids {
            buttons.insert((iid, cid), CacheValue::Stale);
        }
        let mut leds = self.leds.lock();
        for &cid in led_cids {
            leds.insert((iid, cid), CacheValue::Stale);
        }
    }

    pub fn subscribe(&self, handler: Arc<dyn LutronActionHandler>) {
        self.subscribers.lock().push(handler);
    }

    /// Bind the refresh sink and refresh everything watched. Buttons cannot
    /// be queried (the protocol has no button-state read), so they are
    /// seeded unpressed, attributed as refresh traffic.
    pub async fn bind(&self, sink: &Arc<dyn RefreshSink>) {
        *self.sink.write() = Arc::downgrade(sink);
        self.refresh_all().await;
    }

    /// Queue refresh queries for every watched output and LED and re-seed
    /// buttons. Also used after a reconnect.
    pub async fn refresh_all(&self) {
        let output_iids: Vec<u32> = self.outputs.lock().keys().copied().collect();
        for iid in output_iids {
            self.dispatch_output_refresh(iid);
        }
        let led_keys: Vec<(u32, u32)> = self.leds.lock().keys().copied().collect();
        for (iid, cid) in led_keys {
            self.dispatch_led_refresh(iid, cid);
        }
        let button_keys: Vec<(u32, u32)> = self.buttons.lock().keys().copied().collect();
        for (iid, cid) in button_keys {
            self.seed_button(iid, cid).await;
        }
    }

    // -- synchronous gets (poll until fresh) ---------------------------------

    pub async fn get_output_level(&self, iid: u32) -> f64 {
        loop {
            match self.outputs.lock().get(&iid) {
                Some(CacheValue::Fresh(level)) => return *level,
                Some(CacheValue::Stale) => {}
                None => {
                    warn!(iid, "get_output_level for unwatched output");
                    return 0.0;
                }
            }
            if !self.refresh_in_flight(iid) {
                self.dispatch_output_refresh(iid);
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    pub async fn get_button_state(&self, iid: u32, cid: u32) -> bool {
        loop {
            match self.buttons.lock().get(&(iid, cid)) {
                Some(CacheValue::Fresh(pressed)) => return *pressed,
                Some(CacheValue::Stale) => {}
                None => {
                    warn!(iid, cid, "get_button_state for unwatched button");
                    return false;
                }
            }
            self.seed_button(iid, cid).await;
        }
    }

    pub async fn get_led_state(&self, iid: u32, cid: u32) -> bool {
        loop {
            match self.leds.lock().get(&(iid, cid)) {
                Some(CacheValue::Fresh(on)) => return *on,
                Some(CacheValue::Stale) => {}
                None => {
                    warn!(iid, cid, "get_led_state for unwatched led");
                    return false;
                }
            }
            if !self.refresh_in_flight(iid) {
                self.dispatch_led_refresh(iid, cid);
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Outstanding refresh count for an iid; tests assert it drains to zero.
    pub fn refresh_count(&self, iid: u32) -> u32 {
        self.refresh_counts.lock().get(&iid).copied().unwrap_or(0)
    }

    // -- recording (called from the repeater's reader task) ------------------

    pub async fn record_output(&self, iid: u32, level: f64) {
        self.outputs.lock().insert(iid, CacheValue::Fresh(level));
        let refresh = self.consume_refresh(iid);
        self.broadcast(LutronRecord::Output { iid, level }, refresh)
            .await;
    }

    pub async fn record_button(&self, iid: u32, cid: u32, pressed: bool) {
        self.buttons
            .lock()
            .insert((iid, cid), CacheValue::Fresh(pressed));
        let refresh = self.consume_refresh(iid);
        self.broadcast(LutronRecord::Button { iid, cid, pressed }, refresh)
            .await;
    }

    pub async fn record_led(&self, iid: u32, cid: u32, on: bool) {
        self.leds.lock().insert((iid, cid), CacheValue::Fresh(on));
        let refresh = self.consume_refresh(iid);
        self.broadcast(LutronRecord::Led { iid, cid, on }, refresh)
            .await;
    }

    // -- internals -----------------------------------------------------------

    fn refresh_in_flight(&self, iid: u32) -> bool {
        self.refresh_count(iid) > 0
    }

    fn mark_refresh_pending(&self, iid: u32) {
        let mut counts = self.refresh_counts.lock();
        *counts.entry(iid).or_insert(0) += 1;
    }

    fn consume_refresh(&self, iid: u32) -> bool {
        let mut counts = self.refresh_counts.lock();
        match counts.get_mut(&iid) {
            Some(count) if *count > 0 => {
                *count -= 1;
                true
            }
            _ => false,
        }
    }

    fn dispatch_output_refresh(&self, iid: u32) {
        self.mark_refresh_pending(iid);
        self.send(format!("?OUTPUT,{iid},1"));
    }

    fn dispatch_led_refresh(&self, iid: u32, cid: u32) {
        self.mark_refresh_pending(iid);
        self.send(format!("?DEVICE,{iid},{cid},9"));
    }

    /// The protocol has no button-state query; pretend all buttons start
    /// unpressed. We learn real presses as they happen.
    async fn seed_button(&self, iid: u32, cid: u32) {
        self.mark_refresh_pending(iid);
        self.record_button(iid, cid, false).await;
    }

    fn send(&self, command: String) {
        match self.sink.read().upgrade() {
            Some(sink) => sink.send_refresh(command),
            None => debug!(%command, "refresh dropped, no repeater bound"),
        }
    }

    async fn broadcast(&self, record: LutronRecord, refresh: bool) {
        debug!(?record, refresh, "cache record");
        let subscribers: Vec<Arc<dyn LutronActionHandler>> =
            self.subscribers.lock().iter().map(Arc::clone).collect();
        for subscriber in subscribers {
            subscriber.on_action(record, refresh).await;
        }
    }
}

#[cfg(test)]
#[path = "cache_tests.rs"]
mod tests;
