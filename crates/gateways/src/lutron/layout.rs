// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! RadioRa2 project layout (DbXmlInfo.xml).
//!
//! Models things very close to the way Lutron's XML does (areas, outputs,
//! keypad devices with button/LED components) and flattens them into the
//! specs the gateway builds devices from. The repeater serves the file over
//! plain HTTP; a cached copy can stand in for it.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::Deserialize;
use tracing::{debug, info};

use crate::error::GatewayError;

/// One Lutron area and its members (excluding the synthetic "Root Area").
#[derive(Debug, Clone)]
pub struct AreaSpec {
    pub iid: u32,
    pub name: String,
    pub outputs: Vec<OutputSpec>,
    pub devices: Vec<DeviceSpec>,
}

#[derive(Debug, Clone)]
pub struct OutputSpec {
    pub iid: u32,
    pub name: String,
    pub output_type: String,
}

/// A keypad-like device: its buttons (component id -> label) and the
/// component ids of its LEDs.
#[derive(Debug, Clone)]
pub struct DeviceSpec {
    pub iid: u32,
    pub name: String,
    pub device_type: String,
    pub buttons: BTreeMap<u32, String>,
    pub leds: BTreeSet<u32>,
}

impl DeviceSpec {
    /// LED component id paired with a button: the button id plus 80, when
    /// such an LED exists.
    pub fn led_for_button(&self, button_cid: u32) -> Option<u32> {
        let led_cid = button_cid + 80;
        self.leds.contains(&led_cid).then_some(led_cid)
    }
}

/// The parsed project layout.
#[derive(Debug, Clone, Default)]
pub struct Layout {
    areas: Vec<AreaSpec>,
}

impl Layout {
    /// Fetch DbXmlInfo.xml from the repeater's web server.
    pub async fn fetch_xml(hostname: &str) -> Result<String, GatewayError> {
        info!(%hostname, "reading DbXmlInfo from repeater");
        let url = format!("http://{hostname}/DbXmlInfo.xml");
        let response = reqwest::get(&url).await?.error_for_status()?;
        Ok(response.text().await?)
    }

    /// Read a previously-cached copy of DbXmlInfo.xml.
    pub fn read_cached_xml(path: impl AsRef<Path>) -> Result<String, GatewayError> {
        info!(path = %path.as_ref().display(), "reading DbXmlInfo from local file");
        Ok(std::fs::read_to_string(path)?)
    }

    /// Parse the XML and flatten it into area specs.
    ///
    /// Keypads whose iids appear in `ignore_keypads` keep their device entry
    /// but lose their buttons and LEDs, so nothing of theirs gets cached.
    pub fn from_xml(xml: &str, ignore_keypads: &[u32]) -> Result<Self, GatewayError> {
        let project: XmlProject =
            serde_xml_rs::from_str(xml).map_err(|e| GatewayError::Layout(e.to_string()))?;
        let mut areas = Vec::new();
        if let Some(ref top) = project.areas {
            for area in &top.areas {
                collect_areas(area, ignore_keypads, &mut areas);
            }
        }
        info!(areas = areas.len(), "done building DbXmlInfo map");
        Ok(Self { areas })
    }

    pub fn areas(&self) -> &[AreaSpec] {
        &self.areas
    }

    pub fn output_count(&self) -> usize {
        self.areas.iter().map(|a| a.outputs.len()).sum()
    }

    pub fn device_count(&self) -> usize {
        self.areas.iter().map(|a| a.devices.len()).sum()
    }
}

fn collect_areas(area: &XmlArea, ignore_keypads: &[u32], out: &mut Vec<AreaSpec>) {
    // The root area "contains" every output via the DOM but carries no
    // grouping information of its own; skip it and walk its children.
    if area.name != "Root Area" {
        out.push(flatten_area(area, ignore_keypads));
    }
    if let Some(ref nested) = area.areas {
        for child in &nested.areas {
            collect_areas(child, ignore_keypads, out);
        }
    }
}

fn flatten_area(area: &XmlArea, ignore_keypads: &[u32]) -> AreaSpec {
    let outputs = area
        .outputs
        .iter()
        .flat_map(|outputs| outputs.outputs.iter())
        .map(|output| OutputSpec {
            iid: output.iid,
            name: output.name.clone(),
            output_type: output.output_type.clone(),
        })
        .collect();

    let mut devices = Vec::new();
    for group in area
        .device_groups
        .iter()
        .flat_map(|groups| groups.groups.iter())
    {
        for device in group
            .devices
            .iter()
            .flat_map(|devices| devices.devices.iter())
        {
            devices.push(flatten_device(device, ignore_keypads));
        }
    }

    AreaSpec {
        iid: area.iid,
        name: area.name.clone(),
        outputs,
        devices,
    }
}

fn flatten_device(device: &XmlDevice, ignore_keypads: &[u32]) -> DeviceSpec {
    let mut buttons = BTreeMap::new();
    let mut leds = BTreeSet::new();
    if ignore_keypads.contains(&device.iid) {
        debug!(iid = device.iid, "ignoring keypad components per config");
    } else if let Some(ref components) = device.components {
        for component in &components.components {
            match component.component_type.as_str() {
                "BUTTON" => {
                    let label = button_label(&device.device_type, component);
                    buttons.insert(component.number, label);
                }
                "LED" => {
                    leds.insert(component.number);
                }
                _ => {}
            }
        }
    }
    DeviceSpec {
        iid: device.iid,
        name: device.name.clone(),
        device_type: device.device_type.clone(),
        buttons,
        leds,
    }
}

/// Label for a button: the engraving when present, then the fixed name map
/// for well-known unengraved buttons, then the component's own name.
fn button_label(device_type: &str, component: &XmlComponent) -> String {
    if let Some(ref button) = component.button {
        if !button.engraving.is_empty() {
            return button.engraving.clone();
        }
    }
    if let Some(label) = fixed_button_name(device_type, component.number) {
        return label.to_string();
    }
    component
        .button
        .as_ref()
        .map(|b| b.name.clone())
        .unwrap_or_else(|| format!("Button {}", component.number))
}

fn fixed_button_name(device_type: &str, number: u32) -> Option<&'static str> {
    match device_type {
        "PICO_KEYPAD" => match number {
            2 => Some("Top"),
            3 => Some("Middle"),
            4 => Some("Bottom"),
            5 => Some("Raise"),
            6 => Some("Lower"),
            _ => None,
        },
        "SEETOUCH_KEYPAD" | "HYBRID_SEETOUCH_KEYPAD" => match number {
            16 => Some("Lower"),
            17 => Some("Raise"),
            _ => None,
        },
        "SEETOUCH_TABLETOP_KEYPAD" => match number {
            20 => Some("Lower 1"),
            21 => Some("Raise 1"),
            22 => Some("Lower 2"),
            23 => Some("Raise 2"),
            24 => Some("Lower 3"),
            25 => Some("Raise 3"),
            _ => None,
        },
        _ => None,
    }
}

// -- XML document shape -------------------------------------------------------

#[derive(Debug, Deserialize)]
struct XmlProject {
    #[serde(rename = "Areas")]
    areas: Option<XmlAreas>,
}

#[derive(Debug, Deserialize)]
struct XmlAreas {
    #[serde(rename = "Area", default)]
    areas: Vec<XmlArea>,
}

#[derive(Debug, Deserialize)]
struct XmlArea {
    #[serde(rename = "Name", default)]
    name: String,
    #[serde(rename = "IntegrationID", default)]
    iid: u32,
    #[serde(rename = "Areas")]
    areas: Option<Box<XmlAreas>>,
    #[serde(rename = "Outputs")]
    outputs: Option<XmlOutputs>,
    #[serde(rename = "DeviceGroups")]
    device_groups: Option<XmlDeviceGroups>,
}

#[derive(Debug, Deserialize)]
struct XmlOutputs {
    #[serde(rename = "Output", default)]
    outputs: Vec<XmlOutput>,
}

#[derive(Debug, Deserialize)]
struct XmlOutput {
    #[serde(rename = "Name", default)]
    name: String,
    #[serde(rename = "IntegrationID", default)]
    iid: u32,
    #[serde(rename = "OutputType", default)]
    output_type: String,
}

#[derive(Debug, Deserialize)]
struct XmlDeviceGroups {
    #[serde(rename = "DeviceGroup", default)]
    groups: Vec<XmlDeviceGroup>,
}

#[derive(Debug, Deserialize)]
struct XmlDeviceGroup {
    #[serde(rename = "Devices")]
    devices: Option<XmlDevices>,
}

#[derive(Debug, Deserialize)]
struct XmlDevices {
    #[serde(rename = "Device", default)]
    devices: Vec<XmlDevice>,
}

#[derive(Debug, Deserialize)]
struct XmlDevice {
    #[serde(rename = "Name", default)]
    name: String,
    #[serde(rename = "IntegrationID", default)]
    iid: u32,
    #[serde(rename = "DeviceType", default)]
    device_type: String,
    #[serde(rename = "Components")]
    components: Option<XmlComponents>,
}

#[derive(Debug, Deserialize)]
struct XmlComponents {
    #[serde(rename = "Component", default)]
    components: Vec<XmlComponent>,
}

#[derive(Debug, Deserialize)]
struct XmlComponent {
    #[serde(rename = "ComponentNumber", default)]
    number: u32,
    #[serde(rename = "ComponentType", default)]
    component_type: String,
    #[serde(rename = "Button")]
    button: Option<XmlButton>,
}

#[derive(Debug, Deserialize)]
struct XmlButton {
    #[serde(rename = "Name", default)]
    name: String,
    #[serde(rename = "Engraving", default)]
    engraving: String,
}

#[cfg(test)]
#[path = "layout_tests.rs"]
mod tests;
