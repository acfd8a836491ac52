// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The abstract device node.
//!
//! Devices are created by gateway plugins and register with their area (and
//! through it, the House) at construction time. Each concrete type answers
//! capability queries through `can_report`/`can_perform` plus the matching
//! `reports`/`perform` implementations; the provided methods build the
//! public state/action reflection surface on top of those tables.

use std::any::Any;
use std::sync::{Arc, Weak};

use async_trait::async_trait;

use sg_core::{parse_age_state, DevClass, DeviceFilter};

use crate::house::{Area, House};

/// Immutable identity shared by every device.
///
/// `devclass`, `devtype` and `possible_states` are fixed at construction.
pub struct DeviceInfo {
    /// Stable integer id assigned by persistence.
    pub device_id: i64,
    /// Owning gateway's id.
    pub gateway_id: String,
    /// Device id unique within the gateway.
    pub gateway_devid: String,
    /// Human-readable name.
    pub name: String,
    pub devclass: DevClass,
    pub devtype: String,
    /// Declared states, in this device type's preferred order.
    pub possible_states: Vec<String>,
    /// Skip this device in enumeration unless explicitly forced.
    pub hidden: bool,
    house: Weak<House>,
    area: Weak<Area>,
}

impl DeviceInfo {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        house: &Arc<House>,
        area: &Arc<Area>,
        device_id: i64,
        gateway_id: impl Into<String>,
        gateway_devid: impl Into<String>,
        name: impl Into<String>,
        devclass: DevClass,
        devtype: impl Into<String>,
        possible_states: &[&str],
    ) -> Self {
        Self {
            device_id,
            gateway_id: gateway_id.into(),
            gateway_devid: gateway_devid.into(),
            name: name.into(),
            devclass,
            devtype: devtype.into(),
            possible_states: possible_states.iter().map(|s| s.to_string()).collect(),
            hidden: false,
            house: Arc::downgrade(house),
            area: Arc::downgrade(area),
        }
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn house(&self) -> Option<Arc<House>> {
        self.house.upgrade()
    }

    pub fn area(&self) -> Option<Arc<Area>> {
        self.area.upgrade()
    }
}

/// An addressable endpoint behind a gateway.
#[async_trait]
pub trait Device: Send + Sync {
    fn info(&self) -> &DeviceInfo;

    /// Concrete-type escape hatch for gateway-specific rules.
    fn as_any(&self) -> &dyn Any;

    /// Whether this device can report membership in `state`.
    fn can_report(&self, state: &str) -> bool;

    /// Whether this device can execute the action reaching `state`.
    fn can_perform(&self, state: &str) -> bool;

    /// Current membership in a reportable state. Only meaningful for states
    /// accepted by [`Device::can_report`].
    async fn reports(&self, state: &str) -> bool;

    /// Execute the action for a performable state.
    async fn perform(&self, state: &str);

    /// Numeric level recorded in the persistence log.
    async fn level_for_log(&self) -> i64;

    /// Human name for a numeric level ("on"/"off", "open"/"closed", ...).
    fn describe_level(&self, level: i64) -> &'static str;

    /// True iff the device is in `state`: a reportable state it is currently
    /// in, its own class or type tag, or the `age=N` recent-activity window.
    async fn is_in_state(&self, state: &str) -> bool {
        if self.can_report(state) {
            return self.reports(state).await;
        }
        let info = self.info();
        if state == info.devclass.as_str() || state == info.devtype {
            return true;
        }
        if let Some(age_secs) = parse_age_state(state) {
            if let Some(house) = info.house() {
                return house.action_count_within(info.device_id, age_secs) > 0;
            }
        }
        false
    }

    /// Dispatch the per-type action for `state`; returns whether an action
    /// exists for it.
    async fn go_to_state(&self, state: &str) -> bool {
        if !self.can_perform(state) {
            return false;
        }
        self.perform(state).await;
        true
    }

    /// Declared states this device can actually report membership in.
    fn get_possible_states(&self) -> Vec<String> {
        self.info()
            .possible_states
            .iter()
            .filter(|s| self.can_report(s))
            .cloned()
            .collect()
    }

    /// Declared states this device can actually be driven to.
    fn get_possible_actions(&self) -> Vec<String> {
        self.info()
            .possible_states
            .iter()
            .filter(|s| self.can_perform(s))
            .cloned()
            .collect()
    }

    /// Whether the device passes every populated field of the filter.
    async fn matches_filter(&self, filter: &DeviceFilter) -> bool {
        let info = self.info();
        if let Some(devclass) = filter.devclass {
            if devclass != info.devclass {
                return false;
            }
        }
        if let Some(ref devtype) = filter.devtype {
            if devtype != &info.devtype {
                return false;
            }
        }
        if let Some(ref devstate) = filter.devstate {
            if !self.is_in_state(devstate).await {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
#[path = "device_tests.rs"]
mod tests;
