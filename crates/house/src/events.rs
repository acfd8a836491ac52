// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The message bus for device state-change notifications.
//!
//! Publication is synchronous on the calling task; handlers must be fast.
//! Every publication is also forwarded to persistence: synthetic events
//! (cache refills announcing already-current state) record a RESTART,
//! real changes record a CHANGED.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, warn};

use sg_storage::Persistence;

use crate::device::Device;

/// A stateful subscriber. Rule objects implement this and keep their
/// counters and timer tokens as private fields.
#[async_trait]
pub trait DeviceEventHandler: Send + Sync {
    async fn on_event(&self, device: &Arc<dyn Device>, synthetic: bool);
}

/// Per-device and broadcast subscription with fan-out of state changes.
///
/// Subscriber lists are append-only; publication iterates a snapshot, so
/// handlers may subscribe more handlers without deadlocking.
pub struct EventBus {
    persist: Arc<Persistence>,
    by_device: Mutex<HashMap<i64, Vec<Arc<dyn DeviceEventHandler>>>>,
    broadcast: Mutex<Vec<Arc<dyn DeviceEventHandler>>>,
}

impl EventBus {
    pub fn new(persist: Arc<Persistence>) -> Arc<Self> {
        Arc::new(Self {
            persist,
            by_device: Mutex::new(HashMap::new()),
            broadcast: Mutex::new(Vec::new()),
        })
    }

    /// Invoke `handler` whenever the given device's state changes.
    pub fn subscribe(&self, device_id: i64, handler: Arc<dyn DeviceEventHandler>) {
        self.by_device
            .lock()
            .entry(device_id)
            .or_default()
            .push(handler);
    }

    /// Invoke `handler` for every device change.
    pub fn subscribe_all(&self, handler: Arc<dyn DeviceEventHandler>) {
        self.broadcast.lock().push(handler);
    }

    /// Publish a state change. `synthetic` marks a cache refill after
    /// startup: same state, not a new user action.
    pub async fn on_device_state_change(&self, device: &Arc<dyn Device>, synthetic: bool) {
        let info = device.info();
        debug!(
            device = %info.name,
            device_id = info.device_id,
            synthetic,
            "device state change"
        );

        let handlers: Vec<Arc<dyn DeviceEventHandler>> = {
            let by_device = self.by_device.lock();
            let broadcast = self.broadcast.lock();
            by_device
                .get(&info.device_id)
                .into_iter()
                .flatten()
                .chain(broadcast.iter())
                .map(Arc::clone)
                .collect()
        };
        for handler in handlers {
            handler.on_event(device, synthetic).await;
        }

        let level = device.level_for_log().await;
        let result = if synthetic {
            self.persist.record_startup(info.device_id, level)
        } else {
            self.persist.record_change(info.device_id, level)
        };
        if let Err(e) = result {
            warn!(device_id = info.device_id, error = %e, "event not persisted");
        }
    }
}

#[cfg(test)]
#[path = "events_tests.rs"]
mod tests;
