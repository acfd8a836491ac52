// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reporting on system lifecycle events via the notify aliases.

use std::sync::Arc;

use crate::notify::Notifier;

/// Alias names for lifecycle reports, from the `reporting` config table.
#[derive(Debug, Clone, Default)]
pub struct ReportingConfig {
    pub startup: Option<String>,
    pub shutdown: Option<String>,
    pub exception: Option<String>,
}

/// Sends lifecycle notifications when the matching alias is configured.
pub struct Reporter {
    config: ReportingConfig,
    notifier: Arc<Notifier>,
}

impl Reporter {
    pub fn new(config: ReportingConfig, notifier: Arc<Notifier>) -> Arc<Self> {
        Arc::new(Self { config, notifier })
    }

    pub async fn report_startup(&self) {
        if let Some(ref alias) = self.config.startup {
            self.notifier
                .notify(alias, Some("Stargate startup"), "Stargate is now running")
                .await;
        }
    }

    pub async fn report_shutdown(&self) {
        if let Some(ref alias) = self.config.shutdown {
            self.notifier
                .notify(alias, Some("Stargate shutdown"), "Stargate has stopped")
                .await;
        }
    }

    pub async fn report_exception(&self, detail: &str) {
        if let Some(ref alias) = self.config.exception {
            self.notifier
                .notify(alias, Some("Stargate exception report"), detail)
                .await;
        }
    }
}

#[cfg(test)]
#[path = "reports_tests.rs"]
mod tests;
