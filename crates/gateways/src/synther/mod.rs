// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Synthesizer: declarative cross-gateway rules built at startup.
//!
//! The synthesizer is itself a gateway plugin so the loader can order it
//! after the gateways its rules reference. It creates no devices of its
//! own; it only binds and delegates to devices other gateways expose.

pub mod rules;

use std::any::Any;
use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{error, info};

use sg_config::GatewayConfig;
use sg_house::{Device, Gateway, House};

use crate::error::GatewayError;
use crate::loader::GatewayPlugin;
use crate::lutron::RaGateway;
use crate::synther::rules::{Bridge, DelayRule, LedBridge, ParanoidRule};

fn default_lutron_gateway() -> String {
    "radiora2".to_string()
}

fn default_dsc_gateway() -> String {
    "powerseries".to_string()
}

/// `gateways.synther` config section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SyntherSection {
    #[serde(default)]
    pub bridges: Vec<BridgeSpec>,
    #[serde(default)]
    pub ledbridges: Vec<LedBridgeSpec>,
    #[serde(default)]
    pub delays: Vec<DelaySpec>,
    #[serde(default)]
    pub paranoid: Vec<ParanoidSpec>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BridgeSpec {
    #[serde(default = "default_lutron_gateway")]
    pub lutron_gateway: String,
    pub lutron_output: u32,
    #[serde(default = "default_dsc_gateway")]
    pub dsc_gateway: String,
    pub dsc_zone: u32,
    pub dsc_partition: u32,
    pub dsc_command: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LedBridgeSpec {
    #[serde(default = "default_dsc_gateway")]
    pub dsc_gateway: String,
    pub dsc_zone: u32,
    #[serde(default = "default_lutron_gateway")]
    pub lutron_gateway: String,
    pub keypad: u32,
    pub button: u32,
    #[serde(default)]
    pub invert: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DelaySpec {
    #[serde(default = "default_lutron_gateway")]
    pub lutron_gateway: String,
    pub keypad: u32,
    pub button: u32,
    /// Seconds the button must stay held.
    pub delay: f64,
    pub output: u32,
    pub action: DelayAction,
}

/// `action: pulse` or `action: <level>`.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum DelayAction {
    Level(f64),
    Pulse(PulseTag),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub enum PulseTag {
    #[serde(rename = "pulse")]
    Pulse,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ParanoidSpec {
    /// `gateway/devid`, e.g. `powerseries/zone:4`.
    pub device: String,
    /// The "bad" state being watched for.
    pub state: String,
    /// Seconds the device must sit in the bad state before alarming.
    pub delay: f64,
    /// Notify alias to alarm.
    pub alias: String,
}

/// The rule set, packaged as a gateway.
pub struct Synthesizer {
    gateway_id: String,
    bridges: Vec<Arc<Bridge>>,
    ledbridges: Vec<Arc<LedBridge>>,
    delays: Vec<Arc<DelayRule>>,
    paranoid: Vec<Arc<ParanoidRule>>,
}

impl Synthesizer {
    pub async fn build(
        house: &Arc<House>,
        name: &str,
        section: SyntherSection,
    ) -> Result<Arc<Self>, GatewayError> {
        let mut bridges = Vec::new();
        for spec in &section.bridges {
            bridges.push(Bridge::build(house, spec).await?);
        }

        let mut ledbridges = Vec::new();
        for spec in &section.ledbridges {
            ledbridges.push(LedBridge::build(house, spec).await?);
        }

        let mut delays = Vec::new();
        for spec in &section.delays {
            let gateway = house.gateway(&spec.lutron_gateway).ok_or_else(|| {
                GatewayError::MissingDevice(spec.lutron_gateway.clone())
            })?;
            let Some(ra_gateway) = gateway.as_any().downcast_ref::<RaGateway>() else {
                return Err(GatewayError::MissingDevice(format!(
                    "'{}' is not a radiora2 gateway",
                    spec.lutron_gateway
                )));
            };
            delays.push(DelayRule::build(house, ra_gateway, spec)?);
        }

        let mut paranoid = Vec::new();
        for spec in &section.paranoid {
            if !house.notify().can_notify(&spec.alias) {
                error!(alias = %spec.alias, "paranoid rule alias cannot be notified");
            }
            paranoid.push(ParanoidRule::build(house, spec)?);
        }

        info!(
            bridges = bridges.len(),
            ledbridges = ledbridges.len(),
            delays = delays.len(),
            paranoid = paranoid.len(),
            "synthesizer rules installed"
        );
        Ok(Arc::new(Self {
            gateway_id: name.to_string(),
            bridges,
            ledbridges,
            delays,
            paranoid,
        }))
    }

    pub fn rule_count(&self) -> usize {
        self.bridges.len() + self.ledbridges.len() + self.delays.len() + self.paranoid.len()
    }
}

impl Gateway for Synthesizer {
    fn gateway_id(&self) -> &str {
        &self.gateway_id
    }

    fn lookup(&self, _gateway_devid: &str) -> Option<Arc<dyn Device>> {
        None // rules bind other gateways' devices; none of our own
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Plugin entry for the loader.
pub struct SyntherPlugin;

#[async_trait]
impl GatewayPlugin for SyntherPlugin {
    fn name(&self) -> &'static str {
        "synther"
    }

    /// Every gateway a rule references must initialize first.
    fn dependencies(&self, config: &GatewayConfig) -> HashSet<String> {
        let mut deps = HashSet::new();
        let Ok(section) = config.parse::<SyntherSection>("synther") else {
            return deps;
        };
        for bridge in &section.bridges {
            deps.insert(bridge.lutron_gateway.clone());
            deps.insert(bridge.dsc_gateway.clone());
        }
        for ledbridge in &section.ledbridges {
            deps.insert(ledbridge.lutron_gateway.clone());
            deps.insert(ledbridge.dsc_gateway.clone());
        }
        for delay in &section.delays {
            deps.insert(delay.lutron_gateway.clone());
        }
        for paranoid in &section.paranoid {
            if let Some((gateway, _)) = paranoid.device.split_once('/') {
                deps.insert(gateway.to_string());
            }
        }
        deps
    }

    async fn init(
        &self,
        house: &Arc<House>,
        name: &str,
        config: &GatewayConfig,
    ) -> Result<Arc<dyn Gateway>, GatewayError> {
        let section: SyntherSection = config.parse(name)?;
        let gateway = Synthesizer::build(house, name, section).await?;
        Ok(gateway)
    }
}

#[cfg(test)]
#[path = "synther_tests.rs"]
mod tests;
