// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Zone/partition state cache for the DSC panel.
//!
//! Zones 1..=64 and partitions 1..=8 start stale; the global-status burst
//! after login fills them in. Unlike the Lutron cache there is no per-entity
//! refresh query: a stale read just spins until the panel's burst lands, so
//! the `refresh` attribution is simply "this record filled a stale slot".

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::stale::{CacheValue, POLL_INTERVAL};

pub const ZONE_COUNT: u32 = 64;
pub const PARTITION_COUNT: u32 = 8;

/// Partition status as the panel reports it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionStatus {
    Busy,
    Ready,
    Armed,
}

impl PartitionStatus {
    /// Numeric level recorded in the event log.
    pub fn level(self) -> i64 {
        match self {
            PartitionStatus::Busy => 0,
            PartitionStatus::Ready => 1,
            PartitionStatus::Armed => 2,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            PartitionStatus::Busy => "busy",
            PartitionStatus::Ready => "ready",
            PartitionStatus::Armed => "armed",
        }
    }
}

/// One recorded panel observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DscRecord {
    Zone { zone: u32, open: bool },
    Partition { partition: u32, status: PartitionStatus },
}

/// Subscriber to cache records. `refresh` is true only for the initial fill
/// of a stale slot.
#[async_trait]
pub trait DscActionHandler: Send + Sync {
    async fn on_action(&self, record: DscRecord, refresh: bool);
}

pub struct DscPanelCache {
    zones: Mutex<HashMap<u32, CacheValue<bool>>>,
    partitions: Mutex<HashMap<u32, CacheValue<PartitionStatus>>>,
    subscribers: Mutex<Vec<Arc<dyn DscActionHandler>>>,
}

impl Default for DscPanelCache {
    fn default() -> Self {
        let cache = Self {
            zones: Mutex::new(HashMap::new()),
            partitions: Mutex::new(HashMap::new()),
            subscribers: Mutex::new(Vec::new()),
        };
        cache.mark_all_stale();
        cache
    }
}

impl DscPanelCache {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Forget everything; done right before requesting global status so the
    /// reply burst is attributed as a refresh.
    pub fn mark_all_stale(&self) {
        let mut zones = self.zones.lock();
        for zone in 1..=ZONE_COUNT {
            zones.insert(zone, CacheValue::Stale);
        }
        let mut partitions = self.partitions.lock();
        for partition in 1..=PARTITION_COUNT {
            partitions.insert(partition, CacheValue::Stale);
        }
    }

    pub fn subscribe(&self, handler: Arc<dyn DscActionHandler>) {
        self.subscribers.lock().push(handler);
    }

    /// Zone status, blocking until the initial fill provides one.
    pub async fn get_zone_status(&self, zone: u32) -> bool {
        loop {
            match self.zones.lock().get(&zone) {
                Some(CacheValue::Fresh(open)) => return *open,
                Some(CacheValue::Stale) => {}
                None => {
                    warn!(zone, "status read for out-of-range zone");
                    return false;
                }
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// Partition status, blocking until the initial fill provides one.
    pub async fn get_partition_status(&self, partition: u32) -> PartitionStatus {
        loop {
            match self.partitions.lock().get(&partition) {
                Some(CacheValue::Fresh(status)) => return *status,
                Some(CacheValue::Stale) => {}
                None => {
                    warn!(partition, "status read for out-of-range partition");
                    return PartitionStatus::Busy;
                }
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    pub async fn record_zone(&self, zone: u32, open: bool) {
        let was_stale = self
            .zones
            .lock()
            .insert(zone, CacheValue::Fresh(open))
            .map_or(true, |old| old.is_stale());
        self.broadcast(DscRecord::Zone { zone, open }, was_stale)
            .await;
    }

    pub async fn record_partition(&self, partition: u32, status: PartitionStatus) {
        let was_stale = self
            .partitions
            .lock()
            .insert(partition, CacheValue::Fresh(status))
            .map_or(true, |old| old.is_stale());
        self.broadcast(DscRecord::Partition { partition, status }, was_stale)
            .await;
    }

    async fn broadcast(&self, record: DscRecord, refresh: bool) {
        debug!(?record, refresh, "panel cache record");
        let subscribers: Vec<Arc<dyn DscActionHandler>> =
            self.subscribers.lock().iter().map(Arc::clone).collect();
        for subscriber in subscribers {
            subscriber.on_action(record, refresh).await;
        }
    }
}

#[cfg(test)]
#[path = "cache_tests.rs"]
mod tests;
