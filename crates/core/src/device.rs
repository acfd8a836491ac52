// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Device taxonomy: class, type, and filter types shared by the whole system.
//!
//! A device has a class (control, sensor, output), a type (depends on class:
//! keypad/remote for controls, light/shade/closure for outputs, ...), and a
//! state (depends on type: on, off, pressed, open, ...). Device lists can be
//! filtered by any combination of the three.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Error parsing a device class name.
#[derive(Debug, Error)]
#[error("unknown device class: {0}")]
pub struct DevClassParseError(String);

/// Broad category of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DevClass {
    /// Something a person operates: keypads, remotes, alarm partitions.
    Control,
    /// Something that reports without being operated: motion, closure.
    Sensor,
    /// Something the system drives: lights, shades, locks, contact closures.
    Output,
}

impl DevClass {
    pub fn as_str(self) -> &'static str {
        match self {
            DevClass::Control => "control",
            DevClass::Sensor => "sensor",
            DevClass::Output => "output",
        }
    }
}

impl fmt::Display for DevClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DevClass {
    type Err = DevClassParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "control" => Ok(DevClass::Control),
            "sensor" => Ok(DevClass::Sensor),
            "output" => Ok(DevClass::Output),
            other => Err(DevClassParseError(other.to_string())),
        }
    }
}

/// Filter over a device tree.
///
/// Each populated field must match for a device to pass. State matching
/// special-cases `age=N`: the device registered at least one user action in
/// the last N seconds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceFilter {
    pub devclass: Option<DevClass>,
    pub devtype: Option<String>,
    pub devstate: Option<String>,
}

impl DeviceFilter {
    pub fn new(
        devclass: Option<DevClass>,
        devtype: Option<String>,
        devstate: Option<String>,
    ) -> Self {
        Self {
            devclass,
            devtype,
            devstate,
        }
    }

    /// Filter matching everything.
    pub fn all() -> Self {
        Self::default()
    }

    pub fn with_class(devclass: DevClass) -> Self {
        Self {
            devclass: Some(devclass),
            ..Self::default()
        }
    }

    /// Parse a `devtype` or `devtype:devstate` descriptor, optionally scoped
    /// to a class. Empty segments are treated as absent.
    pub fn parse_description(descriptor: &str, devclass: Option<DevClass>) -> Self {
        let mut parts = descriptor.splitn(2, ':');
        let devtype = parts.next().filter(|s| !s.is_empty()).map(str::to_string);
        let devstate = parts.next().filter(|s| !s.is_empty()).map(str::to_string);
        Self {
            devclass,
            devtype,
            devstate,
        }
    }
}

impl fmt::Display for DeviceFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(c) = self.devclass {
            parts.push(format!("devclass = \"{c}\""));
        }
        if let Some(ref t) = self.devtype {
            parts.push(format!("devtype = \"{t}\""));
        }
        if let Some(ref s) = self.devstate {
            parts.push(format!("devstate = \"{s}\""));
        }
        if parts.is_empty() {
            parts.push("all".to_string());
        }
        write!(f, "({})", parts.join(", "))
    }
}

/// Parse the `age=N` state tag; returns the age limit in seconds.
pub fn parse_age_state(state: &str) -> Option<u64> {
    state.strip_prefix("age=")?.parse().ok()
}

#[cfg(test)]
#[path = "device_tests.rs"]
mod tests;
