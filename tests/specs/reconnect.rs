// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Watchdog-driven reconnection of a gateway session.

use std::collections::HashMap;

use crate::prelude::*;
use sg_gateways::lutron::RadioRa2Plugin;
use sg_gateways::GatewayPlugin;
use sg_house::Device;
use tokio::time::timeout;

const RECONNECT_TICK: std::time::Duration = std::time::Duration::from_secs(20);

#[tokio::test]
async fn dropped_repeater_socket_reconnects_with_backoff() {
    let (house, _clock, _notify) = build_house();
    let mut levels = HashMap::new();
    levels.insert(5u32, 0.0);
    levels.insert(10u32, 0.0);
    let fake = FakeRepeater::start(levels).await;
    let (config, _xml) = radiora2_section(fake.port, LAYOUT_XML);

    let gateway = timeout(TICK, RadioRa2Plugin.init(&house, "radiora2", &config))
        .await
        .unwrap()
        .unwrap();
    house.add_gateway("radiora2", gateway);
    settle().await;

    let first = fake.connections();
    assert_eq!(first.len(), 1);
    assert!(first[0].contains(&"#MONITORING,255,1".to_string()));
    assert!(first[0].contains(&"?OUTPUT,5,1".to_string()));

    // The repeater reboots: the socket drops, the watchdog waits out the
    // initial two-second backoff and runs the whole connect sequence again.
    let started = tokio::time::Instant::now();
    fake.close_current();

    let deadline = tokio::time::Instant::now() + RECONNECT_TICK;
    loop {
        let connections = fake.connections();
        if connections.len() >= 2 && connections[1].contains(&"?OUTPUT,5,1".to_string()) {
            break;
        }
        assert!(
            tokio::time::Instant::now() < deadline,
            "no reconnect observed; connections: {connections:?}"
        );
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    }
    assert!(
        started.elapsed() >= std::time::Duration::from_secs(2),
        "reconnect respects the initial backoff"
    );

    // Monitoring is re-enabled before the refresh queries are re-enqueued.
    let second = &fake.connections()[1];
    let monitoring_pos = second
        .iter()
        .position(|c| c == "#MONITORING,255,1")
        .unwrap();
    let refresh_pos = second.iter().position(|c| c == "?OUTPUT,5,1").unwrap();
    assert!(monitoring_pos < refresh_pos);

    // The cache still serves reads after the reconnect refill.
    let device = house.get_device_by_gateway_and_id("radiora2", "5").unwrap();
    assert!(timeout(TICK, device.is_in_state("off")).await.unwrap());
}
