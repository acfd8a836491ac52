// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lutron RadioRa2 gateway plugin.

pub mod cache;
pub mod devices;
pub mod layout;
pub mod repeater;

use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Deserialize;
use tracing::{debug, error, info};

use sg_config::GatewayConfig;
use sg_house::{Device, Gateway, House};

use crate::error::GatewayError;
use crate::loader::GatewayPlugin;
use crate::lutron::cache::{LutronActionHandler, LutronRecord, RefreshSink};
use crate::lutron::devices::{
    KeypadKind, LutronKeypad, LutronMotionSensor, LutronOutput, OutputKind, MOTION_COMPONENT,
};
use crate::lutron::layout::Layout;
use crate::lutron::repeater::{RaRepeater, RepeaterConfig, DEFAULT_PORT};

/// `gateways.radiora2` config section.
#[derive(Debug, Clone, Deserialize)]
pub struct RadioRa2Section {
    pub repeater: RepeaterSection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RepeaterSection {
    pub hostname: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub cached_database: Option<PathBuf>,
    #[serde(default)]
    pub layout: LayoutSection,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LayoutSection {
    #[serde(default)]
    pub ignore_keypads: Vec<u32>,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

/// The RadioRa2 gateway: repeater session, cache, and device tree.
pub struct RaGateway {
    gateway_id: String,
    house: Arc<House>,
    repeater: Arc<RaRepeater>,
    devices: RwLock<HashMap<u32, Arc<dyn Device>>>,
}

impl RaGateway {
    /// Build devices from the layout, wire the cache, and connect.
    pub async fn build(
        house: &Arc<House>,
        name: &str,
        section: RadioRa2Section,
    ) -> Result<Arc<Self>, GatewayError> {
        let xml = match section.repeater.cached_database {
            Some(ref path) => Layout::read_cached_xml(path)?,
            None => Layout::fetch_xml(&section.repeater.hostname).await?,
        };
        let layout = Layout::from_xml(&xml, &section.repeater.layout.ignore_keypads)?;
        info!(
            outputs = layout.output_count(),
            devices = layout.device_count(),
            "radiora2 layout mapped"
        );

        let repeater = RaRepeater::new(
            RepeaterConfig {
                hostname: section.repeater.hostname,
                port: section.repeater.port,
                username: section.repeater.username,
                password: section.repeater.password,
            },
            Arc::clone(house.watchdog()),
        );

        let gateway = Arc::new(Self {
            gateway_id: name.to_string(),
            house: Arc::clone(house),
            repeater: Arc::clone(&repeater),
            devices: RwLock::new(HashMap::new()),
        });
        gateway.build_devices(&layout)?;

        // The gateway relays cache records into the event bus; subscribe it
        // before the first refresh burst so initial fills are published as
        // synthetic events.
        repeater
            .cache()
            .subscribe(Arc::clone(&gateway) as Arc<dyn LutronActionHandler>);

        repeater.connect().await?;
        let sink: Arc<dyn RefreshSink> = Arc::clone(&repeater) as Arc<dyn RefreshSink>;
        repeater.cache().bind(&sink).await;
        Ok(gateway)
    }

    fn build_devices(self: &Arc<Self>, layout: &Layout) -> Result<(), GatewayError> {
        let cache = self.repeater.cache();
        for area_spec in layout.areas() {
            let area = self.house.get_area_by_name(&area_spec.name)?;

            for output_spec in &area_spec.outputs {
                let kind = match OutputKind::from_output_type(&output_spec.output_type) {
                    Some(kind) => kind,
                    None => {
                        error!(
                            iid = output_spec.iid,
                            output_type = %output_spec.output_type,
                            "unknown lutron output type, treating as switched"
                        );
                        OutputKind::Switched
                    }
                };
                let device = LutronOutput::new(
                    &self.house,
                    &area,
                    &self.repeater,
                    &self.gateway_id,
                    output_spec,
                    kind,
                )?;
                cache.watch_output(output_spec.iid);
                self.install(output_spec.iid, device);
            }

            for device_spec in &area_spec.devices {
                if device_spec.device_type == "MOTION_SENSOR" {
                    let device = LutronMotionSensor::new(
                        &self.house,
                        &area,
                        &self.repeater,
                        &self.gateway_id,
                        device_spec,
                    )?;
                    cache.watch_device(device_spec.iid, &[MOTION_COMPONENT], &[]);
                    self.install(device_spec.iid, device);
                    continue;
                }
                let kind = match KeypadKind::from_device_type(&device_spec.device_type) {
                    Some(kind) => kind,
                    None => {
                        error!(
                            iid = device_spec.iid,
                            device_type = %device_spec.device_type,
                            "unknown lutron device type, treating as keypad"
                        );
                        KeypadKind::Keypad
                    }
                };
                let device = LutronKeypad::new(
                    &self.house,
                    &area,
                    &self.repeater,
                    &self.gateway_id,
                    device_spec,
                    kind,
                )?;
                cache.watch_device(device_spec.iid, &device.button_cids(), &device.led_cids());
                self.install(device_spec.iid, device);
            }
        }
        Ok(())
    }

    fn install(self: &Arc<Self>, iid: u32, device: Arc<impl Device + 'static>) {
        let device: Arc<dyn Device> = device;
        self.house.register_device(Arc::clone(&device));
        self.devices.write().insert(iid, device);
    }

    pub fn device_by_iid(&self, iid: u32) -> Option<Arc<dyn Device>> {
        self.devices.read().get(&iid).map(Arc::clone)
    }

    pub fn repeater(&self) -> &Arc<RaRepeater> {
        &self.repeater
    }

    /// Subscribe to raw cache records (component-level granularity).
    pub fn subscribe_actions(&self, handler: Arc<dyn LutronActionHandler>) {
        self.repeater.cache().subscribe(handler);
    }
}

#[async_trait]
impl LutronActionHandler for RaGateway {
    async fn on_action(&self, record: LutronRecord, refresh: bool) {
        match record {
            LutronRecord::Output { .. } | LutronRecord::Button { .. } => {
                let iid = record.iid();
                match self.device_by_iid(iid) {
                    Some(device) => {
                        self.house
                            .events()
                            .on_device_state_change(&device, refresh)
                            .await;
                    }
                    None => debug!(iid, "record for unmodeled lutron device"),
                }
            }
            // LED changes update the cache but are not device state changes;
            // the keypad's own state is its buttons.
            LutronRecord::Led { iid, cid, .. } => {
                debug!(iid, cid, "led state cached");
            }
        }
    }
}

impl Gateway for RaGateway {
    fn gateway_id(&self) -> &str {
        &self.gateway_id
    }

    fn lookup(&self, gateway_devid: &str) -> Option<Arc<dyn Device>> {
        let iid: u32 = gateway_devid.parse().ok()?;
        self.device_by_iid(iid)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Plugin entry for the loader.
pub struct RadioRa2Plugin;

#[async_trait]
impl GatewayPlugin for RadioRa2Plugin {
    fn name(&self) -> &'static str {
        "radiora2"
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
        let section: RadioRa2Section = config.parse(name)?;
        let gateway = RaGateway::build(house, name, section).await?;
        Ok(gateway)
    }
}
