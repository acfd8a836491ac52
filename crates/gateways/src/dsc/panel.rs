// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! TCP connection to the panel's integration interface (Envisalink-style).
//!
//! This only knows how to connect over weakly-authenticated TCP; a
//! TCP-to-serial bridge in front of an IT-100 would look the same. The
//! sender inserts a gap after every frame; the panel cannot absorb
//! back-to-back commands.

use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use sg_net::{LineSession, Reconnect, ReconnectError, Watchdog};

use crate::dsc::cache::{DscPanelCache, PartitionStatus};
use crate::dsc::codec;
use crate::dsc::reflector::Reflector;
use crate::error::GatewayError;

pub const DEFAULT_PORT: u16 = 4025;

/// Gap after each transmitted frame; the panel overruns without it.
const SEND_PAUSE: Duration = Duration::from_millis(500);

#[derive(Debug, Clone)]
pub struct PanelConfig {
    pub hostname: String,
    pub port: u16,
    pub password: String,
}

pub struct DscPanelServer {
    config: PanelConfig,
    cache: Arc<DscPanelCache>,
    watchdog: Arc<Watchdog>,
    session: RwLock<Option<Arc<LineSession>>>,
    reflector: RwLock<Option<Arc<Reflector>>>,
}

impl DscPanelServer {
    pub fn new(config: PanelConfig, watchdog: Arc<Watchdog>) -> Arc<Self> {
        Arc::new(Self {
            config,
            cache: DscPanelCache::new(),
            watchdog,
            session: RwLock::new(None),
            reflector: RwLock::new(None),
        })
    }

    pub fn cache(&self) -> &Arc<DscPanelCache> {
        &self.cache
    }

    pub fn set_reflector(&self, reflector: Arc<Reflector>) {
        *self.reflector.write() = Some(reflector);
    }

    /// Open the panel connection, authenticate, and request global status.
    /// The reconnect thunk re-runs this whole sequence.
    pub async fn connect(self: &Arc<Self>) -> Result<(), GatewayError> {
        let (session, mut lines, mut workers) = LineSession::connect(
            "dsc",
            &self.config.hostname,
            self.config.port,
            Some(SEND_PAUSE),
        )
        .await?;
        *self.session.write() = Some(Arc::clone(&session));

        let dispatch: JoinHandle<()> = {
            let panel = Arc::clone(self);
            tokio::spawn(async move {
                while let Some(line) = lines.recv().await {
                    panel.handle_line(&line).await;
                }
            })
        };
        workers.push(dispatch);

        let reconnect = Arc::new(DscReconnect {
            panel: Arc::downgrade(self),
        });
        self.watchdog.add(session, workers, reconnect);

        // Log in, then ask for everything. The panel answers the global
        // status request with a burst of per-zone and per-partition
        // messages that repopulate the cache.
        self.send_command(5, &self.config.password);
        self.cache.mark_all_stale();
        self.send_command(1, "");
        Ok(())
    }

    /// Encode and queue a command frame.
    pub fn send_command(&self, command: u16, data: &str) {
        self.send_frame(&codec::encode(command, data));
    }

    /// Queue an already-encoded frame, checksum untouched. Used by the
    /// reflector to pass child traffic through verbatim.
    pub fn send_frame(&self, frame: &str) {
        match *self.session.read() {
            Some(ref session) => session.send(frame),
            None => warn!(%frame, "panel command dropped, not connected"),
        }
    }

    /// Decode one received frame and dispatch it.
    pub async fn handle_line(&self, line: &str) {
        let (command, data) = match codec::decode(line) {
            Ok(decoded) => decoded,
            Err(e) => {
                warn!(%line, error = %e, "discarding panel frame");
                return;
            }
        };
        debug!(command, %data, "panel frame");

        match command {
            501 => warn!("panel complains of invalid command"),
            505 => match data.parse::<i64>() {
                Ok(code) if code > 0 => info!(code, "panel login accepted"),
                Ok(code) => error!(code, "panel rejected login"),
                Err(_) => warn!(%data, "unparseable login response"),
            },
            609 => self.record_zone(&data, true).await,
            610 => self.record_zone(&data, false).await,
            650 => self.record_partition(&data, PartitionStatus::Ready).await,
            652 => self.record_partition(&data, PartitionStatus::Armed).await,
            673 => self.record_partition(&data, PartitionStatus::Busy).await,
            840 => warn!(partition = %data, "partition trouble"),
            841 => info!(partition = %data, "partition trouble cleared"),
            912 => {
                let mut chars = data.chars();
                let partition = chars.next().unwrap_or('?');
                let user_cmd = chars.next().unwrap_or('?');
                info!(%partition, %user_cmd, "user command invoked");
            }
            other => debug!(command = other, "ignoring command (no handler)"),
        }

        // Pass on to chained clients, except the authentication response
        // (each child runs its own authentication exchange).
        if command != 505 {
            let reflector = self.reflector.read().clone();
            if let Some(reflector) = reflector {
                reflector.to_children(line);
            }
        }
    }

    async fn record_zone(&self, data: &str, open: bool) {
        match data.parse::<u32>() {
            Ok(zone) => {
                info!(zone, open, "zone status");
                self.cache.record_zone(zone, open).await;
            }
            Err(_) => warn!(%data, "unparseable zone number"),
        }
    }

    async fn record_partition(&self, data: &str, status: PartitionStatus) {
        // Partition status data leads with the partition digit; armed
        // reports append a mode digit we don't model.
        let partition = data.chars().next().and_then(|c| c.to_digit(10));
        match partition {
            Some(partition) => {
                info!(partition, status = status.name(), "partition status");
                self.cache.record_partition(partition, status).await;
            }
            None => warn!(%data, "unparseable partition number"),
        }
    }
}

struct DscReconnect {
    panel: Weak<DscPanelServer>,
}

#[async_trait]
impl Reconnect for DscReconnect {
    async fn reconnect(&self) -> Result<(), ReconnectError> {
        let Some(panel) = self.panel.upgrade() else {
            return Ok(());
        };
        panel.connect().await?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "panel_tests.rs"]
mod tests;
