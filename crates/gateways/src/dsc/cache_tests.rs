// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

struct RecordingHandler {
    seen: Mutex<Vec<(DscRecord, bool)>>,
}

impl RecordingHandler {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            seen: Mutex::new(Vec::new()),
        })
    }

    fn seen(&self) -> Vec<(DscRecord, bool)> {
        self.seen.lock().clone()
    }
}

#[async_trait]
impl DscActionHandler for RecordingHandler {
    async fn on_action(&self, record: DscRecord, refresh: bool) {
        self.seen.lock().push((record, refresh));
    }
}

#[tokio::test]
async fn initial_fill_is_refresh_later_records_are_actions() {
    let cache = DscPanelCache::new();
    let handler = RecordingHandler::new();
    cache.subscribe(handler.clone());

    cache.record_zone(3, true).await;
    cache.record_zone(3, false).await;

    assert_eq!(
        handler.seen(),
        vec![
            (DscRecord::Zone { zone: 3, open: true }, true),
            (DscRecord::Zone { zone: 3, open: false }, false),
        ]
    );
    assert!(!cache.get_zone_status(3).await);
}

#[tokio::test]
async fn mark_all_stale_resets_refresh_attribution() {
    let cache = DscPanelCache::new();
    cache.record_zone(3, true).await;

    let handler = RecordingHandler::new();
    cache.subscribe(handler.clone());

    cache.mark_all_stale();
    cache.record_zone(3, true).await;
    assert_eq!(
        handler.seen(),
        vec![(DscRecord::Zone { zone: 3, open: true }, true)]
    );
}

#[tokio::test]
async fn partition_status_round_trips() {
    let cache = DscPanelCache::new();
    cache.record_partition(1, PartitionStatus::Armed).await;
    assert_eq!(cache.get_partition_status(1).await, PartitionStatus::Armed);

    cache.record_partition(1, PartitionStatus::Ready).await;
    assert_eq!(cache.get_partition_status(1).await, PartitionStatus::Ready);
}

#[tokio::test]
async fn stale_zone_read_blocks_until_the_burst_arrives() {
    let cache = DscPanelCache::new();

    let reader = {
        let cache = Arc::clone(&cache);
        tokio::spawn(async move { cache.get_zone_status(7).await })
    };
    tokio::time::sleep(std::time::Duration::from_millis(250)).await;
    assert!(!reader.is_finished(), "no refresh query exists; reads spin");

    cache.record_zone(7, true).await;
    let open = tokio::time::timeout(std::time::Duration::from_secs(5), reader)
        .await
        .unwrap()
        .unwrap();
    assert!(open);
}

#[tokio::test]
async fn out_of_range_reads_return_defaults() {
    let cache = DscPanelCache::new();
    assert!(!cache.get_zone_status(65).await);
    assert_eq!(
        cache.get_partition_status(9).await,
        PartitionStatus::Busy
    );
}

#[test]
fn partition_levels_are_stable() {
    assert_eq!(PartitionStatus::Busy.level(), 0);
    assert_eq!(PartitionStatus::Ready.level(), 1);
    assert_eq!(PartitionStatus::Armed.level(), 2);
    assert_eq!(PartitionStatus::Armed.name(), "armed");
}
