// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! MiCasaVerde Vera gateway plugin.
//!
//! Vera speaks HTTP: one `sdata` request at construction enumerates rooms,
//! categories, and devices, and a re-arming timer polls `sdata` for changes.
//! Only door locks are modeled; everything else Vera exposes is better
//! reached directly.

pub mod devices;

use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use sg_config::GatewayConfig;
use sg_house::{Device, Gateway, House};

use crate::error::GatewayError;
use crate::loader::GatewayPlugin;
use crate::vera::devices::VeraDoorLock;

pub const DEFAULT_PORT: u16 = 3480;

/// Vera category name for the one device class we model.
const DOOR_LOCK_CATEGORY: &str = "Door lock";

/// `gateways.vera` config section.
#[derive(Debug, Clone, Deserialize)]
pub struct VeraSection {
    pub gateway: VeraGatewaySection,
}

#[derive(Debug, Clone, Deserialize)]
pub struct VeraGatewaySection {
    pub hostname: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Seconds between sdata polls.
    #[serde(default = "default_poll_interval")]
    pub poll_interval: f64,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_poll_interval() -> f64 {
    60.0
}

pub struct VeraGateway {
    gateway_id: String,
    house: Arc<House>,
    hostname: String,
    port: u16,
    poll_interval: Duration,
    client: reqwest::Client,
    devices: RwLock<HashMap<u32, Arc<VeraDoorLock>>>,
}

impl VeraGateway {
    pub async fn build(
        house: &Arc<House>,
        name: &str,
        section: VeraSection,
    ) -> Result<Arc<Self>, GatewayError> {
        let gateway = Arc::new(Self {
            gateway_id: name.to_string(),
            house: Arc::clone(house),
            hostname: section.gateway.hostname,
            port: section.gateway.port,
            poll_interval: Duration::from_secs_f64(section.gateway.poll_interval.max(1.0)),
            client: reqwest::Client::new(),
            devices: RwLock::new(HashMap::new()),
        });

        let sdata = gateway.luup_request("sdata", &[]).await?;
        gateway.enumerate(&sdata)?;

        // First poll baseline arrives via the timer; one-shot re-arming
        // rather than fixed-rate so a slow Vera never stacks requests.
        gateway.schedule_poll();
        Ok(gateway)
    }

    fn enumerate(self: &Arc<Self>, sdata: &Value) -> Result<(), GatewayError> {
        let mut room_names: HashMap<u32, String> = HashMap::new();
        for room in json_array(sdata, "rooms") {
            if let (Some(id), Some(name)) = (json_u32(room, "id"), room["name"].as_str()) {
                room_names.insert(id, name.to_string());
            }
        }
        let mut categories: HashMap<u32, String> = HashMap::new();
        for category in json_array(sdata, "categories") {
            if let (Some(id), Some(name)) = (json_u32(category, "id"), category["name"].as_str()) {
                categories.insert(id, name.to_string());
            }
        }

        for device in json_array(sdata, "devices") {
            let (Some(id), Some(device_name)) = (json_u32(device, "id"), device["name"].as_str())
            else {
                continue;
            };
            let category_name = json_u32(device, "category")
                .and_then(|c| categories.get(&c))
                .map(String::as_str);
            if category_name != Some(DOOR_LOCK_CATEGORY) {
                info!(
                    device = %device_name,
                    category = category_name.unwrap_or("?"),
                    "ignoring vera device of unmodeled category"
                );
                continue;
            }

            let area = match json_u32(device, "room").and_then(|r| room_names.get(&r)) {
                Some(room_name) => self.house.get_area_by_name(room_name)?,
                None => Arc::clone(self.house.root()),
            };
            let lock =
                VeraDoorLock::new(&self.house, &area, self, &self.gateway_id, id, device_name)?;
            self.house
                .register_device(Arc::clone(&lock) as Arc<dyn Device>);
            self.devices.write().insert(id, lock);
        }
        info!(
            locks = self.devices.read().len(),
            "vera devices enumerated"
        );
        Ok(())
    }

    pub fn device(&self, vera_id: u32) -> Option<Arc<VeraDoorLock>> {
        self.devices.read().get(&vera_id).map(Arc::clone)
    }

    /// One Luup data_request. Vera answers some requests with bare values
    /// rather than JSON documents; those come back as strings.
    pub(crate) async fn luup_request(
        &self,
        cmd: &str,
        args: &[(&str, String)],
    ) -> Result<Value, GatewayError> {
        let url = format!("http://{}:{}/data_request", self.hostname, self.port);
        let mut query: Vec<(&str, String)> = vec![
            ("id", cmd.to_string()),
            ("output_format", "json".to_string()),
        ];
        query.extend(args.iter().cloned());
        debug!(%cmd, "vera request");
        let text = self
            .client
            .get(&url)
            .query(&query)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        Ok(serde_json::from_str(&text)
            .unwrap_or_else(|_| Value::String(text.trim().to_string())))
    }

    pub(crate) async fn get_variable(
        &self,
        service_id: &str,
        device_num: u32,
        variable: &str,
    ) -> Result<i64, GatewayError> {
        let value = self
            .luup_request(
                "variableget",
                &[
                    ("DeviceNum", device_num.to_string()),
                    ("serviceId", service_id.to_string()),
                    ("Variable", variable.to_string()),
                ],
            )
            .await?;
        value_as_i64(&value).ok_or_else(|| {
            GatewayError::Protocol(format!("non-numeric variable value: {value:?}"))
        })
    }

    /// Drive a variable through its action (a bare `setvariable` would skip
    /// the physical action).
    pub(crate) async fn set_variable_target(
        &self,
        service_id: &str,
        device_num: u32,
        target: i64,
    ) -> Result<(), GatewayError> {
        self.luup_request(
            "action",
            &[
                ("DeviceNum", device_num.to_string()),
                ("serviceId", service_id.to_string()),
                ("action", "SetTarget".to_string()),
                ("newTargetValue", target.to_string()),
            ],
        )
        .await?;
        Ok(())
    }

    /// Vera device ids with at least one active job.
    pub(crate) async fn devices_with_jobs(&self) -> Result<HashSet<u32>, GatewayError> {
        let status = self.luup_request("status", &[]).await?;
        let mut busy = HashSet::new();
        for device in json_array(&status, "devices") {
            let jobs = device["Jobs"].as_array().map(Vec::len).unwrap_or(0);
            if jobs > 0 {
                if let Some(id) = json_u32(device, "id") {
                    busy.insert(id);
                }
            }
        }
        Ok(busy)
    }

    fn schedule_poll(self: &Arc<Self>) {
        let gateway = Arc::clone(self);
        self.house.timer().add_event(self.poll_interval, move || async move {
            if let Err(e) = gateway.poll_once().await {
                warn!(error = %e, "vera poll failed");
            }
            gateway.schedule_poll();
        });
    }

    async fn poll_once(&self) -> Result<(), GatewayError> {
        let sdata = self.luup_request("sdata", &[]).await?;
        for device_sdata in json_array(&sdata, "devices") {
            let Some(id) = json_u32(device_sdata, "id") else {
                continue;
            };
            let Some(device) = self.device(id) else {
                continue;
            };
            device.vera_poll_update(device_sdata).await;
        }
        Ok(())
    }
}

impl Gateway for VeraGateway {
    fn gateway_id(&self) -> &str {
        &self.gateway_id
    }

    fn lookup(&self, gateway_devid: &str) -> Option<Arc<dyn Device>> {
        let vera_id: u32 = gateway_devid.parse().ok()?;
        self.device(vera_id).map(|d| d as Arc<dyn Device>)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn json_array<'a>(value: &'a Value, key: &str) -> impl Iterator<Item = &'a Value> {
    value[key].as_array().into_iter().flatten()
}

/// Vera serializes numbers as strings about half the time.
pub(crate) fn json_u32(value: &Value, key: &str) -> Option<u32> {
    match &value[key] {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

pub(crate) fn value_as_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

/// Plugin entry for the loader.
pub struct VeraPlugin;

#[async_trait]
impl GatewayPlugin for VeraPlugin {
    fn name(&self) -> &'static str {
        "vera"
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
        let section: VeraSection = config.parse(name)?;
        let gateway = VeraGateway::build(house, name, section).await?;
        Ok(gateway)
    }
}

#[cfg(test)]
#[path = "vera_tests.rs"]
mod tests;
