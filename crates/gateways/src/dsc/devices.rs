// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! High-level objects for the sensors and partitions behind a DSC
//! PowerSeries panel.

use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::error;

use sg_core::DevClass;
use sg_house::{Area, Device, DeviceInfo, House};

use crate::dsc::cache::PartitionStatus;
use crate::dsc::panel::DscPanelServer;
use crate::error::GatewayError;

/// A group of zones the panel arms and disarms together.
pub struct DscPartition {
    info: DeviceInfo,
    panel: Arc<DscPanelServer>,
    pub partition: u32,
}

impl DscPartition {
    pub fn new(
        house: &Arc<House>,
        area: &Arc<Area>,
        panel: &Arc<DscPanelServer>,
        gateway_id: &str,
        partition: u32,
        name: &str,
    ) -> Result<Arc<Self>, GatewayError> {
        let gateway_devid = format!("partition:{partition}");
        let device_id = house.device_id(gateway_id, &gateway_devid)?;
        let info = DeviceInfo::new(
            house,
            area,
            device_id,
            gateway_id,
            gateway_devid,
            name,
            DevClass::Control,
            "alarmpartition",
            &["ready", "armed", "busy"],
        );
        Ok(Arc::new(Self {
            info,
            panel: Arc::clone(panel),
            partition,
        }))
    }

    pub async fn status(&self) -> PartitionStatus {
        self.panel.cache().get_partition_status(self.partition).await
    }

    pub async fn is_armed(&self) -> bool {
        self.status().await == PartitionStatus::Armed
    }

    pub async fn is_ready(&self) -> bool {
        self.status().await == PartitionStatus::Ready
    }

    pub async fn is_busy(&self) -> bool {
        self.status().await == PartitionStatus::Busy
    }
}

#[async_trait]
impl Device for DscPartition {
    fn info(&self) -> &DeviceInfo {
        &self.info
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn can_report(&self, state: &str) -> bool {
        matches!(state, "ready" | "armed" | "busy")
    }

    fn can_perform(&self, _state: &str) -> bool {
        false
    }

    async fn reports(&self, state: &str) -> bool {
        self.status().await.name() == state
    }

    async fn perform(&self, _state: &str) {}

    async fn level_for_log(&self) -> i64 {
        self.status().await.level()
    }

    fn describe_level(&self, level: i64) -> &'static str {
        match level {
            2 => "armed",
            1 => "ready",
            _ => "busy",
        }
    }
}

/// What a zone's circuit is wired to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoneKind {
    Closure,
    Motion,
}

impl ZoneKind {
    /// Map a config `type` string; unknown types fall back to closure.
    pub fn from_config_type(kind: &str) -> Self {
        match kind {
            "closure" => ZoneKind::Closure,
            "motion" => ZoneKind::Motion,
            other => {
                error!(zone_type = %other, "unknown dsc zone type, treating as closure");
                ZoneKind::Closure
            }
        }
    }

    fn devtype(self) -> &'static str {
        match self {
            ZoneKind::Closure => "closure",
            ZoneKind::Motion => "motion",
        }
    }

    fn possible_states(self) -> &'static [&'static str] {
        match self {
            ZoneKind::Closure => &["closed", "open"],
            ZoneKind::Motion => &["vacant", "occupied"],
        }
    }
}

/// One sensor circuit.
pub struct DscZoneSensor {
    info: DeviceInfo,
    panel: Arc<DscPanelServer>,
    pub zone: u32,
    kind: ZoneKind,
}

impl DscZoneSensor {
    pub fn new(
        house: &Arc<House>,
        area: &Arc<Area>,
        panel: &Arc<DscPanelServer>,
        gateway_id: &str,
        zone: u32,
        name: &str,
        kind: ZoneKind,
    ) -> Result<Arc<Self>, GatewayError> {
        let gateway_devid = format!("zone:{zone}");
        let device_id = house.device_id(gateway_id, &gateway_devid)?;
        let info = DeviceInfo::new(
            house,
            area,
            device_id,
            gateway_id,
            gateway_devid,
            name,
            DevClass::Sensor,
            kind.devtype(),
            kind.possible_states(),
        );
        Ok(Arc::new(Self {
            info,
            panel: Arc::clone(panel),
            zone,
            kind,
        }))
    }

    pub fn kind(&self) -> ZoneKind {
        self.kind
    }

    /// True when the circuit is open (door open / motion detected).
    pub async fn is_open(&self) -> bool {
        self.panel.cache().get_zone_status(self.zone).await
    }
}

#[async_trait]
impl Device for DscZoneSensor {
    fn info(&self) -> &DeviceInfo {
        &self.info
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn can_report(&self, state: &str) -> bool {
        self.info.possible_states.iter().any(|s| s == state)
    }

    fn can_perform(&self, _state: &str) -> bool {
        false
    }

    async fn reports(&self, state: &str) -> bool {
        let open = self.is_open().await;
        match (self.kind, state) {
            (ZoneKind::Closure, "open") | (ZoneKind::Motion, "occupied") => open,
            (ZoneKind::Closure, "closed") | (ZoneKind::Motion, "vacant") => !open,
            _ => false,
        }
    }

    async fn perform(&self, _state: &str) {}

    async fn level_for_log(&self) -> i64 {
        i64::from(self.is_open().await)
    }

    fn describe_level(&self, level: i64) -> &'static str {
        match (self.kind, level > 0) {
            (ZoneKind::Closure, true) => "open",
            (ZoneKind::Closure, false) => "closed",
            (ZoneKind::Motion, true) => "occupied",
            (ZoneKind::Motion, false) => "vacant",
        }
    }
}
