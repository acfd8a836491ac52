// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! High-level RadioRa2 device objects: controllable outputs (what Lutron
//! calls an "output") and control surfaces (keypads, remotes, receivers,
//! motion sensors).

use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;

use sg_core::DevClass;
use sg_house::{Area, Device, DeviceInfo, House};

use crate::error::GatewayError;
use crate::lutron::layout::{DeviceSpec, OutputSpec};
use crate::lutron::repeater::RaRepeater;

/// Component id carrying a motion sensor's occupancy reports.
pub const MOTION_COMPONENT: u32 = 1;

/// What kind of load an output drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
    Dimmed,
    Switched,
    Shade,
    ContactClosure { pulsed: bool },
}

impl OutputKind {
    /// Map a Lutron `OutputType` onto an output kind.
    pub fn from_output_type(output_type: &str) -> Option<Self> {
        match output_type {
            "INC" => Some(OutputKind::Dimmed),
            "NON_DIM" => Some(OutputKind::Switched),
            "SYSTEM_SHADE" => Some(OutputKind::Shade),
            "CCO_PULSED" => Some(OutputKind::ContactClosure { pulsed: true }),
            "CCO_MAINTAINED" => Some(OutputKind::ContactClosure { pulsed: false }),
            _ => None,
        }
    }

    fn devtype(self) -> &'static str {
        match self {
            OutputKind::Dimmed | OutputKind::Switched => "light",
            OutputKind::Shade => "shade",
            OutputKind::ContactClosure { .. } => "contactclosure",
        }
    }

    fn possible_states(self) -> &'static [&'static str] {
        match self {
            OutputKind::Dimmed => &["off", "half", "on"],
            OutputKind::Switched => &["off", "on"],
            OutputKind::Shade => &["closed", "half", "open", "fullyopen"],
            OutputKind::ContactClosure { pulsed: true } => &["closed", "open", "pulse"],
            OutputKind::ContactClosure { pulsed: false } => &["closed", "open"],
        }
    }
}

/// A controllable output: light, shade, or contact closure.
pub struct LutronOutput {
    info: DeviceInfo,
    repeater: Arc<RaRepeater>,
    pub iid: u32,
    kind: OutputKind,
}

impl LutronOutput {
    pub fn new(
        house: &Arc<House>,
        area: &Arc<Area>,
        repeater: &Arc<RaRepeater>,
        gateway_id: &str,
        spec: &OutputSpec,
        kind: OutputKind,
    ) -> Result<Arc<Self>, GatewayError> {
        let device_id = house.device_id(gateway_id, &spec.iid.to_string())?;
        let info = DeviceInfo::new(
            house,
            area,
            device_id,
            gateway_id,
            spec.iid.to_string(),
            spec.name.clone(),
            DevClass::Output,
            kind.devtype(),
            kind.possible_states(),
        );
        Ok(Arc::new(Self {
            info,
            repeater: Arc::clone(repeater),
            iid: spec.iid,
            kind,
        }))
    }

    pub fn kind(&self) -> OutputKind {
        self.kind
    }

    pub async fn get_level(&self) -> f64 {
        self.repeater.get_output_level(self.iid).await
    }

    pub fn set_level(&self, level: f64) {
        self.repeater.set_output_level(self.iid, level);
    }

    pub fn pulse(&self) {
        self.repeater.pulse_output(self.iid);
    }
}

#[async_trait]
impl Device for LutronOutput {
    fn info(&self) -> &DeviceInfo {
        &self.info
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn can_report(&self, state: &str) -> bool {
        match self.kind {
            OutputKind::Dimmed | OutputKind::Switched => matches!(state, "on" | "off"),
            OutputKind::Shade => matches!(state, "open" | "closed" | "fullyopen"),
            OutputKind::ContactClosure { .. } => matches!(state, "open" | "closed"),
        }
    }

    fn can_perform(&self, state: &str) -> bool {
        match self.kind {
            OutputKind::Switched => matches!(state, "on" | "off"),
            OutputKind::Dimmed => matches!(state, "on" | "off" | "half"),
            OutputKind::Shade => matches!(state, "open" | "closed" | "half"),
            OutputKind::ContactClosure { pulsed } => {
                matches!(state, "open" | "closed") || (pulsed && state == "pulse")
            }
        }
    }

    async fn reports(&self, state: &str) -> bool {
        let level = self.get_level().await;
        // Shades read closed at a sliver above zero, and fully open can
        // report 99.61 or 100.01; allow some slop.
        match (self.kind, state) {
            (OutputKind::Dimmed | OutputKind::Switched, "on") => level > 0.0,
            (OutputKind::Dimmed | OutputKind::Switched, "off") => level == 0.0,
            (OutputKind::Shade, "closed") => level <= 0.5,
            (OutputKind::Shade, "open") => level > 0.5,
            (OutputKind::Shade, "fullyopen") => level >= 99.5,
            (OutputKind::ContactClosure { .. }, "open") => level > 0.0,
            (OutputKind::ContactClosure { .. }, "closed") => level == 0.0,
            _ => false,
        }
    }

    async fn perform(&self, state: &str) {
        match state {
            "on" | "open" => self.set_level(100.0),
            "off" | "closed" => self.set_level(0.0),
            "half" => self.set_level(50.0),
            "pulse" => self.pulse(),
            _ => {}
        }
    }

    async fn level_for_log(&self) -> i64 {
        self.get_level().await.round() as i64
    }

    fn describe_level(&self, level: i64) -> &'static str {
        match self.kind {
            OutputKind::Dimmed | OutputKind::Switched => {
                if level > 0 {
                    "on"
                } else {
                    "off"
                }
            }
            OutputKind::Shade => {
                if level > 0 {
                    "open"
                } else {
                    "closed"
                }
            }
            OutputKind::ContactClosure { .. } => {
                if level > 0 {
                    "active"
                } else {
                    "inactive"
                }
            }
        }
    }
}

/// Keypad flavors, by where they live.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeypadKind {
    Keypad,
    Remote,
    Repeater,
}

impl KeypadKind {
    /// Map a Lutron `DeviceType` onto a keypad kind.
    pub fn from_device_type(device_type: &str) -> Option<Self> {
        match device_type {
            "SEETOUCH_KEYPAD" | "SEETOUCH_TABLETOP_KEYPAD" | "HYBRID_SEETOUCH_KEYPAD" => {
                Some(KeypadKind::Keypad)
            }
            "PICO_KEYPAD" => Some(KeypadKind::Remote),
            "VISOR_CONTROL_RECEIVER" | "MAIN_REPEATER" => Some(KeypadKind::Repeater),
            _ => None,
        }
    }

    fn devtype(self) -> &'static str {
        match self {
            KeypadKind::Keypad => "keypad",
            KeypadKind::Remote => "remote",
            KeypadKind::Repeater => "repeater",
        }
    }
}

/// One pressable component of a keypad, with its paired LED if any.
#[derive(Debug, Clone)]
pub struct KeypadButton {
    pub cid: u32,
    pub label: String,
    pub led_cid: Option<u32>,
}

impl KeypadButton {
    pub fn has_led(&self) -> bool {
        self.led_cid.is_some()
    }
}

/// A control surface with pressable buttons and indicator LEDs.
pub struct LutronKeypad {
    info: DeviceInfo,
    repeater: Arc<RaRepeater>,
    pub iid: u32,
    buttons: BTreeMap<u32, KeypadButton>,
}

impl LutronKeypad {
    pub fn new(
        house: &Arc<House>,
        area: &Arc<Area>,
        repeater: &Arc<RaRepeater>,
        gateway_id: &str,
        spec: &DeviceSpec,
        kind: KeypadKind,
    ) -> Result<Arc<Self>, GatewayError> {
        let device_id = house.device_id(gateway_id, &spec.iid.to_string())?;
        let info = DeviceInfo::new(
            house,
            area,
            device_id,
            gateway_id,
            spec.iid.to_string(),
            spec.name.clone(),
            DevClass::Control,
            kind.devtype(),
            &["unpressed", "pressed"],
        );
        let buttons = spec
            .buttons
            .iter()
            .map(|(&cid, label)| {
                (
                    cid,
                    KeypadButton {
                        cid,
                        label: label.clone(),
                        led_cid: spec.led_for_button(cid),
                    },
                )
            })
            .collect();
        Ok(Arc::new(Self {
            info,
            repeater: Arc::clone(repeater),
            iid: spec.iid,
            buttons,
        }))
    }

    pub fn buttons(&self) -> impl Iterator<Item = &KeypadButton> {
        self.buttons.values()
    }

    pub fn button(&self, cid: u32) -> Option<&KeypadButton> {
        self.buttons.get(&cid)
    }

    pub fn button_cids(&self) -> Vec<u32> {
        self.buttons.keys().copied().collect()
    }

    pub fn led_cids(&self) -> Vec<u32> {
        self.buttons.values().filter_map(|b| b.led_cid).collect()
    }

    pub async fn button_state(&self, cid: u32) -> bool {
        self.repeater.get_button_state(self.iid, cid).await
    }

    pub fn set_button_state(&self, cid: u32, pressed: bool) {
        self.repeater.set_button_state(self.iid, cid, pressed);
    }

    /// LED state for a button; buttons without LEDs read off.
    pub async fn led_state_for_button(&self, cid: u32) -> bool {
        match self.buttons.get(&cid).and_then(|b| b.led_cid) {
            Some(led_cid) => self.repeater.get_led_state(self.iid, led_cid).await,
            None => false,
        }
    }

    /// Drive a button's LED; returns whether the button has one.
    pub fn set_led_for_button(&self, cid: u32, on: bool) -> bool {
        match self.buttons.get(&cid).and_then(|b| b.led_cid) {
            Some(led_cid) => {
                self.repeater.set_led_state(self.iid, led_cid, on);
                true
            }
            None => false,
        }
    }

    pub async fn any_button_pressed(&self) -> bool {
        for &cid in self.buttons.keys() {
            if self.button_state(cid).await {
                return true;
            }
        }
        false
    }

    pub async fn num_buttons_pressed(&self) -> i64 {
        let mut count = 0;
        for &cid in self.buttons.keys() {
            if self.button_state(cid).await {
                count += 1;
            }
        }
        count
    }
}

#[async_trait]
impl Device for LutronKeypad {
    fn info(&self) -> &DeviceInfo {
        &self.info
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn can_report(&self, state: &str) -> bool {
        matches!(state, "pressed" | "unpressed")
    }

    fn can_perform(&self, _state: &str) -> bool {
        false
    }

    async fn reports(&self, state: &str) -> bool {
        let pressed = self.any_button_pressed().await;
        match state {
            "pressed" => pressed,
            "unpressed" => !pressed,
            _ => false,
        }
    }

    async fn perform(&self, _state: &str) {}

    async fn level_for_log(&self) -> i64 {
        self.num_buttons_pressed().await
    }

    fn describe_level(&self, level: i64) -> &'static str {
        if level > 0 {
            "pressed"
        } else {
            "unpressed"
        }
    }
}

/// An occupancy sensor reporting through device-component actions.
pub struct LutronMotionSensor {
    info: DeviceInfo,
    repeater: Arc<RaRepeater>,
    pub iid: u32,
}

impl LutronMotionSensor {
    pub fn new(
        house: &Arc<House>,
        area: &Arc<Area>,
        repeater: &Arc<RaRepeater>,
        gateway_id: &str,
        spec: &DeviceSpec,
    ) -> Result<Arc<Self>, GatewayError> {
        let device_id = house.device_id(gateway_id, &spec.iid.to_string())?;
        let info = DeviceInfo::new(
            house,
            area,
            device_id,
            gateway_id,
            spec.iid.to_string(),
            spec.name.clone(),
            DevClass::Sensor,
            "motion",
            &["vacant", "occupied"],
        );
        Ok(Arc::new(Self {
            info,
            repeater: Arc::clone(repeater),
            iid: spec.iid,
        }))
    }

    pub async fn is_occupied(&self) -> bool {
        self.repeater
            .get_button_state(self.iid, MOTION_COMPONENT)
            .await
    }
}

#[async_trait]
impl Device for LutronMotionSensor {
    fn info(&self) -> &DeviceInfo {
        &self.info
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn can_report(&self, state: &str) -> bool {
        matches!(state, "occupied" | "vacant")
    }

    fn can_perform(&self, _state: &str) -> bool {
        false
    }

    async fn reports(&self, state: &str) -> bool {
        let occupied = self.is_occupied().await;
        match state {
            "occupied" => occupied,
            "vacant" => !occupied,
            _ => false,
        }
    }

    async fn perform(&self, _state: &str) {}

    async fn level_for_log(&self) -> i64 {
        i64::from(self.is_occupied().await)
    }

    fn describe_level(&self, level: i64) -> &'static str {
        if level > 0 {
            "occupied"
        } else {
            "vacant"
        }
    }
}

#[cfg(test)]
#[path = "devices_tests.rs"]
mod tests;
