// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::test_support::{add_device, test_house};
use sg_core::{DevClass, EventKind};

struct RecordingHandler {
    seen: Mutex<Vec<(i64, bool)>>,
}

impl RecordingHandler {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            seen: Mutex::new(Vec::new()),
        })
    }

    fn seen(&self) -> Vec<(i64, bool)> {
        self.seen.lock().clone()
    }
}

#[async_trait]
impl DeviceEventHandler for RecordingHandler {
    async fn on_event(&self, device: &Arc<dyn Device>, synthetic: bool) {
        self.seen.lock().push((device.info().device_id, synthetic));
    }
}

#[tokio::test]
async fn per_device_subscription_sees_only_its_device() {
    let (house, _clock, _notify) = test_house();
    let lamp = add_device(
        &house, "Kitchen", "fake", "1", "Lamp", DevClass::Output, "light", 0,
    );
    let porch = add_device(
        &house, "Porch", "fake", "2", "Porch", DevClass::Output, "light", 0,
    );

    let handler = RecordingHandler::new();
    house
        .events()
        .subscribe(lamp.info().device_id, handler.clone());

    let lamp_dev: Arc<dyn Device> = lamp.clone();
    let porch_dev: Arc<dyn Device> = porch.clone();
    house.events().on_device_state_change(&lamp_dev, false).await;
    house.events().on_device_state_change(&porch_dev, false).await;

    assert_eq!(handler.seen(), vec![(lamp.info().device_id, false)]);
}

#[tokio::test]
async fn broadcast_subscription_sees_every_device() {
    let (house, _clock, _notify) = test_house();
    let lamp = add_device(
        &house, "Kitchen", "fake", "1", "Lamp", DevClass::Output, "light", 0,
    );
    let porch = add_device(
        &house, "Porch", "fake", "2", "Porch", DevClass::Output, "light", 0,
    );

    let handler = RecordingHandler::new();
    house.events().subscribe_all(handler.clone());

    let lamp_dev: Arc<dyn Device> = lamp.clone();
    let porch_dev: Arc<dyn Device> = porch.clone();
    house.events().on_device_state_change(&lamp_dev, true).await;
    house.events().on_device_state_change(&porch_dev, false).await;

    assert_eq!(
        handler.seen(),
        vec![
            (lamp.info().device_id, true),
            (porch.info().device_id, false)
        ]
    );
}

#[tokio::test]
async fn synthetic_changes_record_restart_and_real_changes_record_changed() {
    let (house, _clock, _notify) = test_house();
    let lamp = add_device(
        &house, "Kitchen", "fake", "1", "Lamp", DevClass::Output, "light", 100,
    );
    let id = lamp.info().device_id;
    let lamp_dev: Arc<dyn Device> = lamp.clone();

    house.events().on_device_state_change(&lamp_dev, true).await;
    lamp.set_level(0);
    house.events().on_device_state_change(&lamp_dev, false).await;

    let events = house.persist().get_all_events(id).unwrap();
    assert_eq!(events.len(), 2);
    assert_eq!(events[0].kind, EventKind::Restart);
    assert_eq!(events[0].level, 100);
    assert_eq!(events[1].kind, EventKind::Changed);
    assert_eq!(events[1].level, 0);
}
