// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Vera device objects. Door locks only, for now; the other categories a
//! Vera fronts (cameras, alarm bits) are not interesting through it.

use std::any::Any;
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tracing::warn;

use sg_core::DevClass;
use sg_house::{Area, Device, DeviceInfo, House};

use crate::error::GatewayError;
use crate::vera::VeraGateway;

const SERVICE_ID: &str = "urn:micasaverde-com:serviceId:DoorLock1";
const LOCK_STATE_VAR: &str = "Status";

/// A Vera-managed door lock.
pub struct VeraDoorLock {
    info: DeviceInfo,
    gateway: Weak<VeraGateway>,
    pub vera_id: u32,
    /// `locked` as of the last sdata poll; drives change detection.
    last_locked: Mutex<Option<bool>>,
}

impl VeraDoorLock {
    pub fn new(
        house: &Arc<House>,
        area: &Arc<Area>,
        gateway: &Arc<VeraGateway>,
        gateway_id: &str,
        vera_id: u32,
        name: &str,
    ) -> Result<Arc<Self>, GatewayError> {
        let device_id = house.device_id(gateway_id, &vera_id.to_string())?;
        let info = DeviceInfo::new(
            house,
            area,
            device_id,
            gateway_id,
            vera_id.to_string(),
            name,
            DevClass::Output,
            "doorlock",
            &["pending", "unlocked", "locked"],
        );
        Ok(Arc::new(Self {
            info,
            gateway: Arc::downgrade(gateway),
            vera_id,
            last_locked: Mutex::new(None),
        }))
    }

    /// Lock status straight from Vera (1 locked, 0 unlocked).
    pub async fn get_level(&self) -> i64 {
        let Some(gateway) = self.gateway.upgrade() else {
            return 0;
        };
        match gateway
            .get_variable(SERVICE_ID, self.vera_id, LOCK_STATE_VAR)
            .await
        {
            Ok(level) => level,
            Err(e) => {
                warn!(vera_id = self.vera_id, error = %e, "lock status read failed");
                i64::from((*self.last_locked.lock()).unwrap_or(false))
            }
        }
    }

    pub async fn set_level(&self, level: i64) {
        let Some(gateway) = self.gateway.upgrade() else {
            return;
        };
        let target = i64::from(level != 0);
        if let Err(e) = gateway
            .set_variable_target(SERVICE_ID, self.vera_id, target)
            .await
        {
            warn!(vera_id = self.vera_id, error = %e, "lock action failed");
        }
    }

    /// Whether Vera has any active job for this device (a lock command
    /// takes a while to run down the Z-Wave chain).
    pub async fn is_pending(&self) -> bool {
        let Some(gateway) = self.gateway.upgrade() else {
            return false;
        };
        match gateway.devices_with_jobs().await {
            Ok(busy) => busy.contains(&self.vera_id),
            Err(e) => {
                warn!(vera_id = self.vera_id, error = %e, "job status read failed");
                false
            }
        }
    }

    pub async fn is_locked(&self) -> bool {
        self.get_level().await == 1
    }

    /// Process one device record from an sdata poll: compare `locked` to
    /// the last seen value and publish on mismatch. The first observation
    /// is the baseline and publishes as a synthetic event.
    pub async fn vera_poll_update(self: &Arc<Self>, device_sdata: &Value) {
        let Some(locked) = crate::vera::json_u32(device_sdata, "locked").map(|v| v != 0) else {
            return;
        };
        let previous = {
            let mut last = self.last_locked.lock();
            let previous = *last;
            *last = Some(locked);
            previous
        };
        let synthetic = match previous {
            None => true,
            Some(previous) if previous != locked => false,
            Some(_) => return, // unchanged
        };
        if let Some(house) = self.info.house() {
            let device: Arc<dyn Device> = Arc::clone(self) as Arc<dyn Device>;
            house
                .events()
                .on_device_state_change(&device, synthetic)
                .await;
        }
    }
}

#[async_trait]
impl Device for VeraDoorLock {
    fn info(&self) -> &DeviceInfo {
        &self.info
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn can_report(&self, state: &str) -> bool {
        matches!(state, "locked" | "unlocked" | "pending")
    }

    fn can_perform(&self, state: &str) -> bool {
        matches!(state, "locked" | "unlocked")
    }

    async fn reports(&self, state: &str) -> bool {
        match state {
            "locked" => self.is_locked().await,
            "unlocked" => !self.is_locked().await,
            "pending" => self.is_pending().await,
            _ => false,
        }
    }

    async fn perform(&self, state: &str) {
        match state {
            "locked" => self.set_level(1).await,
            "unlocked" => self.set_level(0).await,
            _ => {}
        }
    }

    async fn level_for_log(&self) -> i64 {
        // The poll loop keeps this current; avoid a second HTTP round trip
        // on every published event.
        let last_locked = *self.last_locked.lock();
        match last_locked {
            Some(locked) => i64::from(locked),
            None => self.get_level().await,
        }
    }

    fn describe_level(&self, level: i64) -> &'static str {
        if level > 0 {
            "locked"
        } else {
            "unlocked"
        }
    }
}
