// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cross-gateway bridge rule, loaded through the topological loader.

use std::collections::{BTreeMap, HashMap};

use crate::prelude::*;
use sg_config::GatewayConfig;
use sg_gateways::dsc::codec;
use sg_gateways::{builtin_plugins, load_all};
use tokio::time::timeout;

const LOAD_TICK: std::time::Duration = std::time::Duration::from_secs(30);

#[tokio::test]
async fn bridge_keeps_lutron_and_dsc_in_agreement() {
    let (house, _clock, _notify) = build_house();

    // Lutron: output 10 currently on. DSC: zone 7 currently closed (the
    // panel answers global status with the burst below).
    let mut levels = HashMap::new();
    levels.insert(5u32, 0.0);
    levels.insert(10u32, 100.0);
    let repeater = FakeRepeater::start(levels).await;
    let panel = FakePanel::start(vec![
        codec::encode(610, "007"),
        codec::encode(609, "003"),
        codec::encode(650, "1"),
    ])
    .await;

    let (radiora2, _xml) = radiora2_section(repeater.port, LAYOUT_XML);
    let synther: GatewayConfig = serde_yaml::from_str(
        "bridges:\n  - lutron_output: 10\n    dsc_zone: 7\n    dsc_partition: 1\n    dsc_command: 1\n",
    )
    .unwrap();
    let mut configs = BTreeMap::new();
    configs.insert("radiora2".to_string(), radiora2);
    configs.insert("powerseries".to_string(), powerseries_section(panel.port));
    configs.insert("synther".to_string(), synther);

    let plugins = builtin_plugins();
    let loaded = timeout(LOAD_TICK, load_all(&house, &configs, &plugins))
        .await
        .unwrap();
    assert_eq!(loaded, 3, "synther loads after both gateways");

    // Startup sync: DSC is the source of truth, so the lit output is
    // driven to match the closed zone.
    wait_until("startup sync command", || {
        repeater.commands().contains(&"#OUTPUT,10,1,0".to_string())
    })
    .await;

    // The zone opens; the bridge follows on the Lutron side.
    panel.push(&codec::encode(609, "007"));
    wait_until("zone-open sync command", || {
        repeater.commands().contains(&"#OUTPUT,10,1,100".to_string())
    })
    .await;

    // Someone turns the Lutron output off by hand while the zone is still
    // open; the bridge asks DSC to toggle the physical device.
    repeater.push("~OUTPUT,10,1,0.00");
    wait_until("dsc toggle command", || {
        panel.received().contains(&codec::encode(20, "11"))
    })
    .await;
}
