// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lutron output-level caching and history.

use std::collections::HashMap;

use crate::prelude::*;
use sg_core::EventKind;
use sg_gateways::lutron::devices::LutronOutput;
use sg_gateways::lutron::RadioRa2Plugin;
use sg_gateways::GatewayPlugin;
use sg_house::Device;
use tokio::time::timeout;

#[tokio::test]
async fn output_level_flows_from_wire_to_cache_and_history() {
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

    // The refresh burst answered 0.00; that is the startup state.
    let device = house.get_device_by_gateway_and_id("radiora2", "5").unwrap();
    assert!(device.is_in_state("off").await);

    // A user turns the light on at the wall.
    fake.push("~OUTPUT,5,1,75.50");
    settle().await;

    let output = device.as_any().downcast_ref::<LutronOutput>().unwrap();
    assert_eq!(output.get_level().await, 75.5);
    assert!(device.is_in_state("on").await);

    // History: a restart marker from the refresh, one real change.
    let events = house
        .persist()
        .get_all_events(device.info().device_id)
        .unwrap();
    let kinds: Vec<EventKind> = events.iter().map(|e| e.kind).collect();
    assert_eq!(kinds, vec![EventKind::Restart, EventKind::Changed]);
    assert_eq!(events[0].level, 0);
    assert_eq!(events[1].level, 76, "75.5 rounds to 76 in the log");

    // Exactly one user action in the last hour.
    assert_eq!(
        house
            .persist()
            .get_action_count(device.info().device_id, Some(chrono::Duration::hours(1)))
            .unwrap(),
        1
    );
}

#[tokio::test]
async fn startup_refresh_queries_everything_watched() {
    let (house, _clock, _notify) = build_house();
    let mut levels = HashMap::new();
    levels.insert(5u32, 42.0);
    levels.insert(10u32, 0.0);
    let fake = FakeRepeater::start(levels).await;
    let (config, _xml) = radiora2_section(fake.port, LAYOUT_XML);

    let gateway = timeout(TICK, RadioRa2Plugin.init(&house, "radiora2", &config))
        .await
        .unwrap()
        .unwrap();
    house.add_gateway("radiora2", gateway);
    settle().await;

    let commands = fake.commands();
    assert!(commands.contains(&"#MONITORING,255,1".to_string()));
    assert!(commands.contains(&"?OUTPUT,5,1".to_string()));
    assert!(commands.contains(&"?OUTPUT,10,1".to_string()));

    // Monitoring is enabled before any refresh goes out.
    let monitoring_pos = commands
        .iter()
        .position(|c| c == "#MONITORING,255,1")
        .unwrap();
    let refresh_pos = commands.iter().position(|c| c == "?OUTPUT,5,1").unwrap();
    assert!(monitoring_pos < refresh_pos);
}
