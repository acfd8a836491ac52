// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared fixtures for house-crate tests.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use sg_core::{DevClass, FakeClock};
use sg_storage::Persistence;

use crate::device::{Device, DeviceInfo};
use crate::gateway::Gateway;
use crate::house::House;
use crate::notify::{FakeNotifyAdapter, Notifier};

/// Minimal on/off device backed by an in-memory level.
pub struct FakeDevice {
    info: DeviceInfo,
    level: Mutex<i64>,
}

impl FakeDevice {
    pub fn set_level(&self, level: i64) {
        *self.level.lock() = level;
    }
}

#[async_trait]
impl Device for FakeDevice {
    fn info(&self) -> &DeviceInfo {
        &self.info
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn can_report(&self, state: &str) -> bool {
        matches!(state, "on" | "off")
    }

    fn can_perform(&self, state: &str) -> bool {
        matches!(state, "on" | "off")
    }

    async fn reports(&self, state: &str) -> bool {
        let on = *self.level.lock() > 0;
        match state {
            "on" => on,
            "off" => !on,
            _ => false,
        }
    }

    async fn perform(&self, state: &str) {
        *self.level.lock() = if state == "on" { 100 } else { 0 };
    }

    async fn level_for_log(&self) -> i64 {
        *self.level.lock()
    }

    fn describe_level(&self, level: i64) -> &'static str {
        if level > 0 {
            "on"
        } else {
            "off"
        }
    }
}

/// Gateway wrapper around a fixed device map.
pub struct FakeGateway {
    pub id: String,
    pub devices: HashMap<String, Arc<dyn Device>>,
}

impl Gateway for FakeGateway {
    fn gateway_id(&self) -> &str {
        &self.id
    }

    fn lookup(&self, gateway_devid: &str) -> Option<Arc<dyn Device>> {
        self.devices.get(gateway_devid).map(Arc::clone)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub fn test_house() -> (Arc<House>, FakeClock, FakeNotifyAdapter) {
    let clock = FakeClock::new();
    let persist =
        Arc::new(Persistence::open_in_memory(Arc::new(clock.clone())).expect("in-memory db"));
    let adapter = FakeNotifyAdapter::new();
    let notifier = Notifier::new(HashMap::new(), Arc::new(adapter.clone()));
    let house =
        House::new("House", persist, notifier, Arc::new(clock.clone())).expect("house init");
    (house, clock, adapter)
}

/// Create, register, and return an on/off device in the named area.
#[allow(clippy::too_many_arguments)]
pub fn add_device(
    house: &Arc<House>,
    area_name: &str,
    gateway_id: &str,
    gateway_devid: &str,
    name: &str,
    devclass: DevClass,
    devtype: &str,
    level: i64,
) -> Arc<FakeDevice> {
    build_device(
        house, area_name, gateway_id, gateway_devid, name, devclass, devtype, level, false,
    )
}

/// As [`add_device`], but marked hidden from enumeration.
#[allow(clippy::too_many_arguments)]
pub fn add_hidden_device(
    house: &Arc<House>,
    area_name: &str,
    gateway_id: &str,
    gateway_devid: &str,
    name: &str,
    devclass: DevClass,
    devtype: &str,
    level: i64,
) -> Arc<FakeDevice> {
    build_device(
        house, area_name, gateway_id, gateway_devid, name, devclass, devtype, level, true,
    )
}

#[allow(clippy::too_many_arguments)]
fn build_device(
    house: &Arc<House>,
    area_name: &str,
    gateway_id: &str,
    gateway_devid: &str,
    name: &str,
    devclass: DevClass,
    devtype: &str,
    level: i64,
    hidden: bool,
) -> Arc<FakeDevice> {
    let area = house.get_area_by_name(area_name).expect("area");
    let device_id = house.device_id(gateway_id, gateway_devid).expect("device id");
    let mut info = DeviceInfo::new(
        house,
        &area,
        device_id,
        gateway_id,
        gateway_devid,
        name,
        devclass,
        devtype,
        &["off", "on"],
    );
    if hidden {
        info = info.hidden();
    }
    let device = Arc::new(FakeDevice {
        info,
        level: Mutex::new(level),
    });
    house.register_device(device.clone());
    device
}
