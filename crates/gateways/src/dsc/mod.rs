// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! DSC PowerSeries gateway plugin.

pub mod cache;
pub mod codec;
pub mod devices;
pub mod panel;
pub mod reflector;

use std::any::Any;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Deserialize;
use tracing::{debug, warn};

use sg_config::GatewayConfig;
use sg_house::{Device, Gateway, House};

use crate::dsc::cache::{DscActionHandler, DscRecord};
use crate::dsc::devices::{DscPartition, DscZoneSensor, ZoneKind};
use crate::dsc::panel::{DscPanelServer, PanelConfig, DEFAULT_PORT};
use crate::dsc::reflector::Reflector;
use crate::error::GatewayError;
use crate::loader::GatewayPlugin;

/// Area name for zones the config maps nowhere.
const UNKNOWN_AREA: &str = "(Unknown)";

/// `gateways.powerseries` config section.
#[derive(Debug, Clone, Deserialize)]
pub struct PowerSeriesSection {
    pub gateway: PanelSection,
    #[serde(default)]
    pub zones: BTreeMap<u32, ZoneSpec>,
    #[serde(default)]
    pub partition_names: BTreeMap<u32, String>,
    /// area name -> zones that live there
    #[serde(default)]
    pub area_mapping: BTreeMap<String, Vec<u32>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PanelSection {
    pub hostname: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub password: String,
    #[serde(default)]
    pub reflector_port: Option<u16>,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

/// A zone entry: a bare name is shorthand for a closure sensor.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ZoneSpec {
    Name(String),
    Typed {
        #[serde(rename = "type")]
        kind: String,
        name: String,
    },
}

impl ZoneSpec {
    fn kind(&self) -> ZoneKind {
        match self {
            ZoneSpec::Name(_) => ZoneKind::Closure,
            ZoneSpec::Typed { kind, .. } => ZoneKind::from_config_type(kind),
        }
    }

    fn name(&self) -> &str {
        match self {
            ZoneSpec::Name(name) | ZoneSpec::Typed { name, .. } => name,
        }
    }
}

/// The PowerSeries gateway: panel session, cache, devices, and the
/// optional reflector.
pub struct DscGateway {
    gateway_id: String,
    house: Arc<House>,
    panel: Arc<DscPanelServer>,
    zones: RwLock<HashMap<u32, Arc<DscZoneSensor>>>,
    partitions: RwLock<HashMap<u32, Arc<DscPartition>>>,
}

impl DscGateway {
    pub async fn build(
        house: &Arc<House>,
        name: &str,
        section: PowerSeriesSection,
    ) -> Result<Arc<Self>, GatewayError> {
        let panel = DscPanelServer::new(
            PanelConfig {
                hostname: section.gateway.hostname.clone(),
                port: section.gateway.port,
                password: section.gateway.password.clone(),
            },
            Arc::clone(house.watchdog()),
        );

        let gateway = Arc::new(Self {
            gateway_id: name.to_string(),
            house: Arc::clone(house),
            panel: Arc::clone(&panel),
            zones: RwLock::new(HashMap::new()),
            partitions: RwLock::new(HashMap::new()),
        });

        // Invert the area mapping so each zone finds its area.
        let mut area_by_zone: HashMap<u32, String> = HashMap::new();
        for (area_name, zone_nums) in &section.area_mapping {
            for &zone_num in zone_nums {
                area_by_zone.insert(zone_num, area_name.clone());
            }
        }

        for (&zone_num, spec) in &section.zones {
            let area_name = match area_by_zone.get(&zone_num) {
                Some(name) => name.clone(),
                None => {
                    warn!(zone = zone_num, "zone not mapped to any area");
                    UNKNOWN_AREA.to_string()
                }
            };
            let area = house.get_area_by_name(&area_name)?;
            let sensor = DscZoneSensor::new(
                house,
                &area,
                &panel,
                name,
                zone_num,
                spec.name(),
                spec.kind(),
            )?;
            house.register_device(Arc::clone(&sensor) as Arc<dyn Device>);
            gateway.zones.write().insert(zone_num, sensor);
        }

        for (&partition_num, partition_name) in &section.partition_names {
            let partition = DscPartition::new(
                house,
                house.root(),
                &panel,
                name,
                partition_num,
                partition_name,
            )?;
            house.register_device(Arc::clone(&partition) as Arc<dyn Device>);
            gateway.partitions.write().insert(partition_num, partition);
        }

        panel
            .cache()
            .subscribe(Arc::clone(&gateway) as Arc<dyn DscActionHandler>);

        if let Some(reflector_port) = section.gateway.reflector_port {
            let reflector =
                Reflector::start(&panel, reflector_port, section.gateway.password.clone()).await?;
            panel.set_reflector(reflector);
        }

        panel.connect().await?;
        Ok(gateway)
    }

    pub fn panel(&self) -> &Arc<DscPanelServer> {
        &self.panel
    }

    pub fn zone(&self, zone: u32) -> Option<Arc<DscZoneSensor>> {
        self.zones.read().get(&zone).map(Arc::clone)
    }

    pub fn partition(&self, partition: u32) -> Option<Arc<DscPartition>> {
        self.partitions.read().get(&partition).map(Arc::clone)
    }

    pub async fn get_zone_status(&self, zone: u32) -> bool {
        self.panel.cache().get_zone_status(zone).await
    }

    /// Invoke a panel user command (what the Envisalink UI calls "PGM").
    /// Partitions are 1..=8, commands 1..=4.
    pub fn send_user_command(&self, partition: u32, command: u32) {
        self.panel
            .send_command(20, &format!("{partition}{command}"));
    }
}

#[async_trait]
impl DscActionHandler for DscGateway {
    async fn on_action(&self, record: DscRecord, refresh: bool) {
        let device: Option<Arc<dyn Device>> = match record {
            DscRecord::Zone { zone, .. } => {
                self.zone(zone).map(|z| z as Arc<dyn Device>)
            }
            DscRecord::Partition { partition, .. } => {
                self.partition(partition).map(|p| p as Arc<dyn Device>)
            }
        };
        match device {
            Some(device) => {
                self.house
                    .events()
                    .on_device_state_change(&device, refresh)
                    .await;
            }
            None => debug!(?record, "record for unconfigured dsc device"),
        }
    }
}

impl Gateway for DscGateway {
    fn gateway_id(&self) -> &str {
        &self.gateway_id
    }

    fn lookup(&self, gateway_devid: &str) -> Option<Arc<dyn Device>> {
        let (scope, num) = gateway_devid.split_once(':')?;
        let num: u32 = num.parse().ok()?;
        match scope {
            "zone" => self.zone(num).map(|z| z as Arc<dyn Device>),
            "partition" => self.partition(num).map(|p| p as Arc<dyn Device>),
            _ => None,
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Plugin entry for the loader.
pub struct PowerSeriesPlugin;

#[async_trait]
impl GatewayPlugin for PowerSeriesPlugin {
    fn name(&self) -> &'static str {
        "powerseries"
    }

    fn dependencies(&self, _config: &GatewayConfig) -> HashSet<String> {
        HashSet::new()
    }

    async fn init(
        &self,
        house: &Arc<House>,
        name: &str,
        config: &GatewayConfig,
    ) -> Result<Arc<dyn Gateway>, GatewayError> {
        let section: PowerSeriesSection = config.parse(name)?;
        let gateway = DscGateway::build(house, name, section).await?;
        Ok(gateway)
    }
}
