// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! DSC zone handling: checksum discipline and history.

use crate::prelude::*;
use sg_core::EventKind;
use sg_gateways::dsc::codec;
use sg_gateways::dsc::{DscGateway, PowerSeriesPlugin};
use sg_gateways::GatewayPlugin;
use sg_house::{Device, Gateway};
use tokio::time::timeout;

#[tokio::test]
async fn zone_frames_toggle_the_cache_and_log_history() {
    let (house, _clock, _notify) = build_house();
    let panel = FakePanel::start(Vec::new()).await;
    let config = powerseries_section(panel.port);

    let gateway = timeout(TICK, PowerSeriesPlugin.init(&house, "powerseries", &config))
        .await
        .unwrap()
        .unwrap();
    house.add_gateway("powerseries", gateway.clone());

    // The panel sees our login and global-status request (the sender
    // spaces frames out, so give it time).
    wait_until("login and status request", || panel.received().len() >= 2).await;
    let received = panel.received();
    assert_eq!(received[0], codec::encode(5, "1234"));
    assert_eq!(received[1], codec::encode(1, ""));

    // A frame with a corrupted checksum is discarded with a warning...
    panel.push("6090033F");
    // ...and the correct one records zone 3 open (the initial fill).
    panel.push(&codec::encode(609, "003"));

    let zone = house
        .get_device_by_gateway_and_id("powerseries", "zone:3")
        .unwrap();
    assert!(timeout(TICK, zone.is_in_state("open")).await.unwrap());

    // Then the door closes.
    panel.push(&codec::encode(610, "003"));
    wait_until("zone close recorded", || {
        let events = house
            .persist()
            .get_all_events(zone.info().device_id)
            .unwrap();
        events.len() >= 2
    })
    .await;
    assert!(timeout(TICK, zone.is_in_state("closed")).await.unwrap());

    let dsc = gateway.as_any().downcast_ref::<DscGateway>().unwrap();
    assert!(!timeout(TICK, dsc.get_zone_status(3)).await.unwrap());

    let events = house
        .persist()
        .get_all_events(zone.info().device_id)
        .unwrap();
    let kinds: Vec<EventKind> = events.iter().map(|e| e.kind).collect();
    assert_eq!(kinds, vec![EventKind::Restart, EventKind::Changed]);
    assert_eq!(events[0].level, 1);
    assert_eq!(events[1].level, 0);
}

#[tokio::test]
async fn partition_status_follows_the_panel() {
    let (house, _clock, _notify) = build_house();
    let panel = FakePanel::start(vec![codec::encode(650, "1")]).await;
    let config = powerseries_section(panel.port);

    let gateway = timeout(TICK, PowerSeriesPlugin.init(&house, "powerseries", &config))
        .await
        .unwrap()
        .unwrap();
    house.add_gateway("powerseries", gateway);

    let partition = house
        .get_device_by_gateway_and_id("powerseries", "partition:1")
        .unwrap();
    assert!(timeout(TICK, partition.is_in_state("ready")).await.unwrap());

    panel.push(&codec::encode(652, "12"));
    wait_until("armed recorded", || {
        house
            .persist()
            .get_all_events(partition.info().device_id)
            .unwrap()
            .len()
            >= 2
    })
    .await;
    assert!(timeout(TICK, partition.is_in_state("armed")).await.unwrap());
    assert_eq!(partition.describe_level(2), "armed");
}
