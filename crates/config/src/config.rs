// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Configuration document (YAML) and its typed sections.
//!
//! Gateway sections are deliberately loose: each plugin owns its own schema
//! and parses its section with [`GatewayConfig::parse`].

use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors loading or interpreting configuration
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot parse config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("gateway '{gateway}' config invalid: {message}")]
    Gateway { gateway: String, message: String },
}

/// The whole configuration document.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Directory to chdir into before anything touches relative paths.
    #[serde(default)]
    pub working_dir: Option<PathBuf>,
    #[serde(default)]
    pub house: HouseSection,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub server: Option<ServerConfig>,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
    #[serde(default)]
    pub reporting: ReportingSection,
    #[serde(default)]
    pub gateways: BTreeMap<String, GatewayConfig>,
}

impl Config {
    /// Load and parse the document at `path`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_yaml::from_str(&text)?)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct HouseSection {
    #[serde(default = "default_house_name")]
    pub name: String,
}

impl Default for HouseSection {
    fn default() -> Self {
        Self {
            name: default_house_name(),
        }
    }
}

fn default_house_name() -> String {
    "House".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Base level for the log file layer.
    #[serde(default = "default_level")]
    pub level: String,
    /// Level for the console layer.
    #[serde(default = "default_level")]
    pub console_level: String,
    /// Log file path; `%(pid)s` expands to the process id.
    #[serde(default)]
    pub logfile: Option<String>,
    /// Per-module level overrides.
    #[serde(default)]
    pub module_levels: BTreeMap<String, String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            console_level: default_level(),
            logfile: None,
            module_levels: BTreeMap::new(),
        }
    }
}

fn default_level() -> String {
    "info".to_string()
}

impl LoggingConfig {
    /// Expand the configured logfile pattern for this process.
    pub fn logfile_path(&self, pid: u32) -> Option<String> {
        self.logfile
            .as_ref()
            .map(|pattern| pattern.replace("%(pid)s", &pid.to_string()))
    }

    /// Env-filter directive string: base level plus per-module overrides.
    pub fn filter_directives(&self, base: &str) -> String {
        let mut directives = vec![base.to_string()];
        for (module, level) in &self.module_levels {
            directives.push(format!("{module}={level}"));
        }
        directives.join(",")
    }
}

/// HTTP server settings, consumed by the external UI layer.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    #[serde(default)]
    pub public: bool,
    #[serde(default)]
    pub webdebug: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub datafile: PathBuf,
    /// Seconds between periodic checkpoints.
    #[serde(default = "default_checkpoint_interval")]
    pub checkpoint_interval: u64,
}

fn default_checkpoint_interval() -> u64 {
    300
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotificationsConfig {
    #[serde(default)]
    pub email: Option<EmailSection>,
    /// alias -> [[method, address], ...]
    #[serde(default)]
    pub recipients: BTreeMap<String, Vec<(String, String)>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmailSection {
    pub smtp_host: String,
    pub sender: String,
    #[serde(default)]
    pub use_ssl: bool,
    #[serde(default)]
    pub authenticate: Option<AuthenticateConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthenticateConfig {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportingSection {
    #[serde(default)]
    pub startup: Option<String>,
    #[serde(default)]
    pub shutdown: Option<String>,
    #[serde(default)]
    pub exception: Option<String>,
}

/// One `gateways.<name>` table: the shared `disabled` flag plus whatever
/// plugin-specific keys the section carries.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GatewayConfig {
    #[serde(default)]
    pub disabled: bool,
    #[serde(flatten)]
    pub settings: BTreeMap<String, serde_yaml::Value>,
}

impl GatewayConfig {
    /// Deserialize the plugin-specific keys into the plugin's own type.
    pub fn parse<T: DeserializeOwned>(&self, gateway: &str) -> Result<T, ConfigError> {
        let mut mapping = serde_yaml::Mapping::new();
        for (key, value) in &self.settings {
            mapping.insert(serde_yaml::Value::String(key.clone()), value.clone());
        }
        serde_yaml::from_value(serde_yaml::Value::Mapping(mapping)).map_err(|e| {
            ConfigError::Gateway {
                gateway: gateway.to_string(),
                message: e.to_string(),
            }
        })
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
