// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The House: root of the area tree and owner of the infrastructure
//! singletons (event bus, timer, persistence, watchdog, notifier).
//!
//! The house is the single point of cross-component lookup. Its device and
//! area maps are append-only after startup, so concurrent reads need no
//! coordination beyond the RwLocks.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::{Arc, Weak};

use parking_lot::{Mutex, RwLock};
use thiserror::Error;
use tracing::warn;

use sg_core::{Clock, DevClass, DeviceFilter, StateOrdering};
use sg_net::Watchdog;
use sg_storage::{Persistence, PersistenceError};

use crate::device::Device;
use crate::events::EventBus;
use crate::gateway::Gateway;
use crate::notify::Notifier;
use crate::timer::Timer;

/// Errors from house operations
#[derive(Debug, Error)]
pub enum HouseError {
    #[error(transparent)]
    Persistence(#[from] PersistenceError),
    #[error("unknown gateway: {0}")]
    UnknownGateway(String),
    #[error("unknown device: {0}/{1}")]
    UnknownDevice(String, String),
}

/// A named grouping of devices and sub-areas.
///
/// Areas form a tree rooted at the House's root area (which is its own
/// parent). They are created on demand by name lookup and never destroyed.
pub struct Area {
    /// Stable integer id assigned by persistence.
    pub area_id: i64,
    pub name: String,
    parent: Weak<Area>,
    areas: RwLock<Vec<Arc<Area>>>,
    devices: RwLock<Vec<Arc<dyn Device>>>,
}

impl Area {
    fn new_root(area_id: i64, name: &str) -> Arc<Self> {
        Arc::new_cyclic(|weak| Self {
            area_id,
            name: name.to_string(),
            parent: weak.clone(),
            areas: RwLock::new(Vec::new()),
            devices: RwLock::new(Vec::new()),
        })
    }

    fn new_child(parent: &Arc<Area>, area_id: i64, name: &str) -> Arc<Self> {
        let area = Arc::new(Self {
            area_id,
            name: name.to_string(),
            parent: Arc::downgrade(parent),
            areas: RwLock::new(Vec::new()),
            devices: RwLock::new(Vec::new()),
        });
        parent.areas.write().push(Arc::clone(&area));
        area
    }

    pub fn parent(&self) -> Option<Arc<Area>> {
        self.parent.upgrade()
    }

    pub(crate) fn add_device(&self, device: Arc<dyn Device>) {
        self.devices.write().push(device);
    }

    /// Devices directly in this area (no descent).
    pub fn own_devices(&self) -> Vec<Arc<dyn Device>> {
        self.devices.read().clone()
    }

    /// Every device in the subtree, post-order (sub-areas before this area's
    /// own devices).
    pub fn all_devices(&self) -> Vec<Arc<dyn Device>> {
        let mut out = Vec::new();
        self.collect_devices(&mut out);
        out
    }

    fn collect_devices(&self, out: &mut Vec<Arc<dyn Device>>) {
        for child in self.areas.read().iter() {
            child.collect_devices(out);
        }
        out.extend(self.devices.read().iter().cloned());
    }

    /// This area and every descendant.
    pub fn subtree(self: &Arc<Self>) -> Vec<Arc<Area>> {
        let mut out = vec![Arc::clone(self)];
        let children = self.areas.read().clone();
        for child in children {
            out.extend(child.subtree());
        }
        out
    }

    /// Subtree devices passing the filter. Devices marked hidden are skipped
    /// unless `force` is set.
    pub async fn get_devices_filtered_by(
        &self,
        filter: &DeviceFilter,
        force: bool,
    ) -> Vec<Arc<dyn Device>> {
        let mut matched = Vec::new();
        for device in self.all_devices() {
            if device.info().hidden && !force {
                continue;
            }
            if device.matches_filter(filter).await {
                matched.push(device);
            }
        }
        matched
    }

    /// Subtree areas (including this one) containing at least one matching
    /// device.
    pub async fn get_areas_filtered_by(self: &Arc<Self>, filter: &DeviceFilter) -> Vec<Arc<Area>> {
        let mut matched = Vec::new();
        for area in self.subtree() {
            if area.has_device_matching(filter).await {
                matched.push(area);
            }
        }
        matched
    }

    async fn has_device_matching(&self, filter: &DeviceFilter) -> bool {
        for device in self.all_devices() {
            if device.info().hidden {
                continue;
            }
            if device.matches_filter(filter).await {
                return true;
            }
        }
        false
    }

    /// Map from device type to the union of possible states, for devices of
    /// the given class below this area.
    pub async fn get_device_type_state_map(
        &self,
        devclass: Option<DevClass>,
    ) -> HashMap<String, BTreeSet<String>> {
        let filter = DeviceFilter::new(devclass, None, None);
        let mut map: HashMap<String, BTreeSet<String>> = HashMap::new();
        for device in self.get_devices_filtered_by(&filter, false).await {
            let entry = map.entry(device.info().devtype.clone()).or_default();
            entry.extend(device.get_possible_states());
        }
        map
    }
}

/// The single per-process root object.
pub struct House {
    root: Arc<Area>,
    persist: Arc<Persistence>,
    events: Arc<EventBus>,
    timer: Arc<Timer>,
    watchdog: Arc<Watchdog>,
    notify: Arc<Notifier>,
    clock: Arc<dyn Clock>,
    gateways: RwLock<HashMap<String, Arc<dyn Gateway>>>,
    devices_by_id: RwLock<HashMap<i64, Arc<dyn Device>>>,
    areas_by_id: RwLock<HashMap<i64, Arc<Area>>>,
    areas_by_name: RwLock<HashMap<String, Arc<Area>>>,
    states: Mutex<StateOrdering>,
}

impl House {
    /// Build the house and its infrastructure singletons. Must run inside a
    /// tokio runtime (the timer dispatch task starts here).
    pub fn new(
        name: &str,
        persist: Arc<Persistence>,
        notify: Arc<Notifier>,
        clock: Arc<dyn Clock>,
    ) -> Result<Arc<Self>, HouseError> {
        let root_id = persist.get_area_id(name)?;
        let root = Area::new_root(root_id, name);
        let events = EventBus::new(Arc::clone(&persist));
        let timer = Timer::start(Arc::clone(&clock));
        let house = Arc::new(Self {
            root: Arc::clone(&root),
            persist,
            events,
            timer,
            watchdog: Watchdog::new(),
            notify,
            clock,
            gateways: RwLock::new(HashMap::new()),
            devices_by_id: RwLock::new(HashMap::new()),
            areas_by_id: RwLock::new(HashMap::new()),
            areas_by_name: RwLock::new(HashMap::new()),
            states: Mutex::new(StateOrdering::new()),
        });
        house.areas_by_id.write().insert(root_id, root);
        Ok(house)
    }

    pub fn root(&self) -> &Arc<Area> {
        &self.root
    }

    pub fn persist(&self) -> &Arc<Persistence> {
        &self.persist
    }

    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    pub fn timer(&self) -> &Arc<Timer> {
        &self.timer
    }

    pub fn watchdog(&self) -> &Arc<Watchdog> {
        &self.watchdog
    }

    pub fn notify(&self) -> &Arc<Notifier> {
        &self.notify
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Area by name, created under the root on first lookup.
    pub fn get_area_by_name(&self, name: &str) -> Result<Arc<Area>, HouseError> {
        if let Some(area) = self.areas_by_name.read().get(name) {
            return Ok(Arc::clone(area));
        }
        let mut by_name = self.areas_by_name.write();
        if let Some(area) = by_name.get(name) {
            return Ok(Arc::clone(area));
        }
        let area_id = self.persist.get_area_id(name)?;
        let area = Area::new_child(&self.root, area_id, name);
        by_name.insert(name.to_string(), Arc::clone(&area));
        self.areas_by_id.write().insert(area_id, Arc::clone(&area));
        Ok(area)
    }

    /// Stable device id for a (gateway, device) pair.
    pub fn device_id(&self, gateway_id: &str, gateway_devid: &str) -> Result<i64, HouseError> {
        Ok(self.persist.get_device_id(gateway_id, gateway_devid)?)
    }

    /// Register a freshly-constructed device: adds it to its area, the
    /// house-wide id map, and the canonical state-order registry.
    pub fn register_device(&self, device: Arc<dyn Device>) {
        let device_id = {
            let info = device.info();
            if let Some(area) = info.area() {
                area.add_device(Arc::clone(&device));
            }
            let states: Vec<&str> = info.possible_states.iter().map(String::as_str).collect();
            self.states
                .lock()
                .register(info.devclass, &info.devtype, &states);
            info.device_id
        };
        self.devices_by_id.write().insert(device_id, device);
    }

    pub fn add_gateway(&self, name: &str, gateway: Arc<dyn Gateway>) {
        self.gateways.write().insert(name.to_string(), gateway);
    }

    pub fn gateway(&self, name: &str) -> Option<Arc<dyn Gateway>> {
        self.gateways.read().get(name).map(Arc::clone)
    }

    pub fn gateway_names(&self) -> Vec<String> {
        self.gateways.read().keys().cloned().collect()
    }

    pub fn get_device_by_id(&self, device_id: i64) -> Option<Arc<dyn Device>> {
        self.devices_by_id.read().get(&device_id).map(Arc::clone)
    }

    pub fn get_area_by_id(&self, area_id: i64) -> Option<Arc<Area>> {
        self.areas_by_id.read().get(&area_id).map(Arc::clone)
    }

    /// Device lookup through its owning gateway.
    pub fn get_device_by_gateway_and_id(
        &self,
        gateway_id: &str,
        gateway_devid: &str,
    ) -> Result<Arc<dyn Device>, HouseError> {
        let gateway = self
            .gateway(gateway_id)
            .ok_or_else(|| HouseError::UnknownGateway(gateway_id.to_string()))?;
        gateway.lookup(gateway_devid).ok_or_else(|| {
            HouseError::UnknownDevice(gateway_id.to_string(), gateway_devid.to_string())
        })
    }

    /// Order states canonically for a (class, type) pair. Without both keys
    /// there is no canonical order and the input order is kept.
    pub fn order_device_states(
        &self,
        devclass: Option<DevClass>,
        devtype: Option<&str>,
        states: &[String],
    ) -> Vec<String> {
        match (devclass, devtype) {
            (Some(devclass), Some(devtype)) => {
                self.states.lock().order(devclass, devtype, states)
            }
            _ => states.to_vec(),
        }
    }

    /// Actions every one of the given devices can perform.
    pub fn get_available_common_actions(&self, devices: &[Arc<dyn Device>]) -> HashSet<String> {
        let mut iter = devices.iter();
        let Some(first) = iter.next() else {
            return HashSet::new();
        };
        let mut common: HashSet<String> = first.get_possible_actions().into_iter().collect();
        for device in iter {
            let actions: HashSet<String> = device.get_possible_actions().into_iter().collect();
            common.retain(|a| actions.contains(a));
        }
        common
    }

    /// CHANGED events for the device within the trailing window. Errors are
    /// logged and read as zero; filters must not fail on a sick database.
    pub fn action_count_within(&self, device_id: i64, age_secs: u64) -> i64 {
        let age = chrono::Duration::seconds(age_secs.min(i64::MAX as u64) as i64);
        match self.persist.get_action_count(device_id, Some(age)) {
            Ok(count) => count,
            Err(e) => {
                warn!(device_id, error = %e, "action count query failed");
                0
            }
        }
    }
}

#[cfg(test)]
#[path = "house_tests.rs"]
mod tests;
