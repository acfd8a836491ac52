// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Topological gateway loading with dependency resolution.
//!
//! Load proceeds in three phases: query every enabled plugin for its
//! dependencies, partition into ready (no deps) and pending, then
//! repeatedly initialize any ready plugin, registering it with the House
//! before promoting its reverse dependencies, so an initialization failure
//! cascades into skips of everything that depends on it.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info};

use sg_config::GatewayConfig;
use sg_house::{Gateway, House};

use crate::error::GatewayError;

/// A gateway plugin: declares its dependencies and builds its gateway.
#[async_trait]
pub trait GatewayPlugin: Send + Sync {
    /// Plugin name, matching the `gateways.<name>` config key.
    fn name(&self) -> &'static str;

    /// Gateways that must be initialized before this one.
    fn dependencies(&self, config: &GatewayConfig) -> HashSet<String>;

    async fn init(
        &self,
        house: &Arc<House>,
        name: &str,
        config: &GatewayConfig,
    ) -> Result<Arc<dyn Gateway>, GatewayError>;
}

/// The plugins built into this binary.
pub fn builtin_plugins() -> Vec<Arc<dyn GatewayPlugin>> {
    vec![
        Arc::new(crate::lutron::RadioRa2Plugin),
        Arc::new(crate::dsc::PowerSeriesPlugin),
        Arc::new(crate::vera::VeraPlugin),
        Arc::new(crate::synther::SyntherPlugin),
    ]
}

struct PluginInfo {
    config: GatewayConfig,
    plugin: Arc<dyn GatewayPlugin>,
    deps: HashSet<String>,
    reverse_deps: HashSet<String>,
}

/// Load every configured gateway in dependency order.
///
/// Returns the number of gateways successfully initialized. Disabled
/// gateways, unknown plugin names, broken dependencies, and initialization
/// failures are logged and skipped; they never take the rest of the system
/// down with them.
pub async fn load_all(
    house: &Arc<House>,
    configs: &BTreeMap<String, GatewayConfig>,
    plugins: &[Arc<dyn GatewayPlugin>],
) -> usize {
    let by_name: HashMap<&str, &Arc<dyn GatewayPlugin>> =
        plugins.iter().map(|p| (p.name(), p)).collect();

    // 1: gather enabled gateways and their dependency sets.
    let mut info_map: HashMap<String, PluginInfo> = HashMap::new();
    for (name, config) in configs {
        if config.disabled {
            info!(gateway = %name, "ignoring disabled gateway");
            continue;
        }
        let Some(plugin) = by_name.get(name.as_str()) else {
            error!(gateway = %name, "unknown gateway plugin, skipping");
            continue;
        };
        let deps = plugin.dependencies(config);
        info_map.insert(
            name.clone(),
            PluginInfo {
                config: config.clone(),
                plugin: Arc::clone(plugin),
                deps,
                reverse_deps: HashSet::new(),
            },
        );
    }

    // 2: add reverse edges and partition into ready/pending.
    let names: Vec<String> = info_map.keys().cloned().collect();
    for name in &names {
        let deps: Vec<String> = info_map[name].deps.iter().cloned().collect();
        for dep in deps {
            if let Some(target) = info_map.get_mut(&dep) {
                target.reverse_deps.insert(name.clone());
            }
        }
    }
    let mut ready: Vec<String> = Vec::new();
    let mut pending: HashSet<String> = HashSet::new();
    for (name, info) in &info_map {
        if info.deps.is_empty() {
            ready.push(name.clone());
        } else {
            pending.insert(name.clone());
        }
    }
    ready.sort(); // deterministic order among independent gateways

    // 3: initialize ready plugins, promoting dependents as deps clear.
    let mut loaded = 0;
    while let Some(name) = ready.pop() {
        let (plugin, config) = {
            let info = &info_map[&name];
            (Arc::clone(&info.plugin), info.config.clone())
        };
        info!(gateway = %name, "initializing gateway");
        match plugin.init(house, &name, &config).await {
            Ok(gateway) => {
                // Register before promoting so dependents can find it.
                house.add_gateway(&name, gateway);
                loaded += 1;
            }
            Err(e) => {
                error!(gateway = %name, error = %e, "gateway failed to initialize, skipping");
                continue;
            }
        }

        let dependents: Vec<String> = info_map[&name].reverse_deps.iter().cloned().collect();
        for dependent in dependents {
            if let Some(info) = info_map.get_mut(&dependent) {
                info.deps.remove(&name);
                if info.deps.is_empty() && pending.remove(&dependent) {
                    ready.push(dependent);
                }
            }
        }
    }

    // Anything still pending has broken (or failed) dependencies.
    for name in &pending {
        let deps: Vec<&str> = info_map[name].deps.iter().map(String::as_str).collect();
        error!(
            gateway = %name,
            missing = deps.join(", "),
            "gateway ignored due to broken dependencies"
        );
    }

    loaded
}

#[cfg(test)]
#[path = "loader_tests.rs"]
mod tests;
