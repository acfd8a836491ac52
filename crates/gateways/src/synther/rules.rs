// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The cross-gateway rule objects.
//!
//! Each rule is a stateful subscriber: its counters and timer tokens are
//! private fields, mutated as events arrive. Rules bind their devices at
//! construction time and fail there if anything is missing; event handling
//! never has to discover a hole in the configuration.

use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use sg_house::{Device, DeviceEventHandler, Gateway, House, Notifier, Timer};

use crate::dsc::DscGateway;
use crate::error::GatewayError;
use crate::lutron::cache::{LutronActionHandler, LutronRecord};
use crate::lutron::repeater::RaRepeater;
use crate::lutron::RaGateway;
use crate::synther::{BridgeSpec, DelayAction, DelaySpec, LedBridgeSpec, ParanoidSpec};

/// Binds a Lutron output to a DSC zone (a light whose physical switch is
/// wired through the alarm panel, say). DSC is the source of truth at
/// startup; afterwards each side follows the other, guarded against
/// feedback by comparing current states before acting.
pub struct Bridge {
    lutron_device: Arc<dyn Device>,
    zone_device: Arc<dyn Device>,
    dsc_gateway: Arc<dyn Gateway>,
    partition: u32,
    command: u32,
}

impl Bridge {
    pub async fn build(house: &Arc<House>, spec: &BridgeSpec) -> Result<Arc<Self>, GatewayError> {
        let lutron_device = house
            .get_device_by_gateway_and_id(&spec.lutron_gateway, &spec.lutron_output.to_string())
            .map_err(|e| GatewayError::MissingDevice(e.to_string()))?;
        let zone_device = house
            .get_device_by_gateway_and_id(&spec.dsc_gateway, &format!("zone:{}", spec.dsc_zone))
            .map_err(|e| GatewayError::MissingDevice(e.to_string()))?;
        let dsc_gateway = house
            .gateway(&spec.dsc_gateway)
            .ok_or_else(|| GatewayError::MissingDevice(spec.dsc_gateway.clone()))?;
        if dsc_gateway.as_any().downcast_ref::<DscGateway>().is_none() {
            return Err(GatewayError::MissingDevice(format!(
                "'{}' is not a powerseries gateway",
                spec.dsc_gateway
            )));
        }

        let bridge = Arc::new(Self {
            lutron_device,
            zone_device,
            dsc_gateway,
            partition: spec.dsc_partition,
            command: spec.dsc_command,
        });

        // Suck initial state from DSC and push it into Lutron.
        let zone_open = bridge.zone_device.is_in_state("open").await;
        info!(
            lutron = %bridge.lutron_device.info().name,
            zone = %bridge.zone_device.info().name,
            zone_open,
            "bridge startup sync"
        );
        bridge
            .lutron_device
            .go_to_state(if zone_open { "on" } else { "off" })
            .await;

        let events = house.events();
        let handler: Arc<dyn DeviceEventHandler> = Arc::clone(&bridge) as _;
        events.subscribe(bridge.lutron_device.info().device_id, Arc::clone(&handler));
        events.subscribe(bridge.zone_device.info().device_id, handler);
        Ok(bridge)
    }

    fn send_toggle(&self) {
        match self.dsc_gateway.as_any().downcast_ref::<DscGateway>() {
            Some(dsc) => dsc.send_user_command(self.partition, self.command),
            None => warn!("bridge lost its dsc gateway"),
        }
    }
}

#[async_trait]
impl DeviceEventHandler for Bridge {
    async fn on_event(&self, device: &Arc<dyn Device>, synthetic: bool) {
        if synthetic {
            return; // cache refills are not state changes
        }
        let lutron_on = self.lutron_device.is_in_state("on").await;
        let zone_open = self.zone_device.is_in_state("open").await;
        if lutron_on == zone_open {
            return; // already in agreement; nothing to do
        }

        let id = device.info().device_id;
        if id == self.lutron_device.info().device_id {
            // Lutron wants the device toggled; tell DSC to do it.
            debug!(lutron_on, zone_open, "bridge: lutron changed, toggling via dsc");
            self.send_toggle();
        } else if id == self.zone_device.info().device_id {
            // Someone used the physical switch; follow it on the Lutron side.
            debug!(lutron_on, zone_open, "bridge: zone changed, syncing lutron");
            self.lutron_device
                .go_to_state(if zone_open { "on" } else { "off" })
                .await;
        }
    }
}

/// Mirrors a DSC zone onto a Lutron keypad-button LED.
pub struct LedBridge {
    zone_device: Arc<dyn Device>,
    keypad_device: Arc<dyn Device>,
    button_cid: u32,
    invert: bool,
}

impl LedBridge {
    pub async fn build(
        house: &Arc<House>,
        spec: &LedBridgeSpec,
    ) -> Result<Arc<Self>, GatewayError> {
        let zone_device = house
            .get_device_by_gateway_and_id(&spec.dsc_gateway, &format!("zone:{}", spec.dsc_zone))
            .map_err(|e| GatewayError::MissingDevice(e.to_string()))?;
        let keypad_device = house
            .get_device_by_gateway_and_id(&spec.lutron_gateway, &spec.keypad.to_string())
            .map_err(|e| GatewayError::MissingDevice(e.to_string()))?;
        {
            let keypad = keypad_device
                .as_any()
                .downcast_ref::<crate::lutron::devices::LutronKeypad>()
                .ok_or_else(|| {
                    GatewayError::MissingDevice(format!("device {} is not a keypad", spec.keypad))
                })?;
            let button = keypad.button(spec.button).ok_or_else(|| {
                GatewayError::MissingDevice(format!(
                    "keypad {} has no button {}",
                    spec.keypad, spec.button
                ))
            })?;
            if !button.has_led() {
                return Err(GatewayError::MissingDevice(format!(
                    "keypad {} button {} has no led",
                    spec.keypad, spec.button
                )));
            }
        }

        let bridge = Arc::new(Self {
            zone_device,
            keypad_device,
            button_cid: spec.button,
            invert: spec.invert,
        });

        bridge.sync_led().await;
        house.events().subscribe(
            bridge.zone_device.info().device_id,
            Arc::clone(&bridge) as Arc<dyn DeviceEventHandler>,
        );
        Ok(bridge)
    }

    async fn sync_led(&self) {
        let open = self.zone_device.is_in_state("open").await;
        let on = open != self.invert;
        if let Some(keypad) = self
            .keypad_device
            .as_any()
            .downcast_ref::<crate::lutron::devices::LutronKeypad>()
        {
            debug!(button = self.button_cid, on, "led bridge sync");
            keypad.set_led_for_button(self.button_cid, on);
        }
    }
}

#[async_trait]
impl DeviceEventHandler for LedBridge {
    async fn on_event(&self, _device: &Arc<dyn Device>, _synthetic: bool) {
        // Setting the LED is idempotent; synthetic refills just re-assert it.
        self.sync_led().await;
    }
}

/// Press-and-hold: a Lutron button held down for the configured delay
/// performs an output action. Release before expiry cancels.
pub struct DelayRule {
    self_ref: Weak<DelayRule>,
    repeater: Arc<RaRepeater>,
    timer: Arc<Timer>,
    keypad_iid: u32,
    button_cid: u32,
    output_iid: u32,
    action: DelayAction,
    delay: Duration,
    token: Mutex<Option<u64>>,
}

impl DelayRule {
    pub fn build(
        house: &Arc<House>,
        ra_gateway: &RaGateway,
        spec: &DelaySpec,
    ) -> Result<Arc<Self>, GatewayError> {
        // Fail now if the keypad/button/output are not real.
        ra_gateway
            .device_by_iid(spec.keypad)
            .ok_or_else(|| GatewayError::MissingDevice(format!("keypad {}", spec.keypad)))?;
        ra_gateway
            .device_by_iid(spec.output)
            .ok_or_else(|| GatewayError::MissingDevice(format!("output {}", spec.output)))?;

        let rule = Arc::new_cyclic(|weak| Self {
            self_ref: weak.clone(),
            repeater: Arc::clone(ra_gateway.repeater()),
            timer: Arc::clone(house.timer()),
            keypad_iid: spec.keypad,
            button_cid: spec.button,
            output_iid: spec.output,
            action: spec.action,
            delay: Duration::from_secs_f64(spec.delay),
            token: Mutex::new(None),
        });
        ra_gateway.subscribe_actions(Arc::clone(&rule) as Arc<dyn LutronActionHandler>);
        Ok(rule)
    }

    pub fn pending(&self) -> bool {
        self.token.lock().is_some()
    }

    async fn on_expiry(self: Arc<Self>) {
        self.token.lock().take();
        // Re-check: the release may have raced the timer.
        let still_pressed = self
            .repeater
            .get_button_state(self.keypad_iid, self.button_cid)
            .await;
        if !still_pressed {
            debug!(
                keypad = self.keypad_iid,
                button = self.button_cid,
                "hold released before expiry"
            );
            return;
        }
        info!(
            keypad = self.keypad_iid,
            button = self.button_cid,
            output = self.output_iid,
            "hold expired, performing action"
        );
        match self.action {
            DelayAction::Pulse(_) => self.repeater.pulse_output(self.output_iid),
            DelayAction::Level(level) => self.repeater.set_output_level(self.output_iid, level),
        }
    }
}

#[async_trait]
impl LutronActionHandler for DelayRule {
    async fn on_action(&self, record: LutronRecord, refresh: bool) {
        let LutronRecord::Button { iid, cid, pressed } = record else {
            return;
        };
        if iid != self.keypad_iid || cid != self.button_cid || refresh {
            return;
        }
        if pressed {
            if self.token.lock().is_some() {
                return; // already armed
            }
            let Some(this) = self.self_ref.upgrade() else {
                return;
            };
            debug!(keypad = self.keypad_iid, button = self.button_cid, "hold armed");
            let token = self.timer.add_event(self.delay, move || this.on_expiry());
            *self.token.lock() = Some(token);
        } else if let Some(token) = self.token.lock().take() {
            debug!(keypad = self.keypad_iid, button = self.button_cid, "hold cancelled");
            self.timer.cancel_event(token);
        }
    }
}

/// Watches a device for sitting in a designated "bad" state past a
/// threshold; raises a notification once, and clears it when the device
/// recovers.
pub struct ParanoidRule {
    self_ref: Weak<ParanoidRule>,
    device: Arc<dyn Device>,
    bad_state: String,
    delay: Duration,
    alias: String,
    notifier: Arc<Notifier>,
    timer: Arc<Timer>,
    state: Mutex<ParanoidState>,
}

#[derive(Default)]
struct ParanoidState {
    token: Option<u64>,
    alarmed: bool,
}

impl ParanoidRule {
    pub fn build(house: &Arc<House>, spec: &ParanoidSpec) -> Result<Arc<Self>, GatewayError> {
        let (gateway_id, devid) = spec.device.split_once('/').ok_or_else(|| {
            GatewayError::MissingDevice(format!(
                "paranoid device must be gateway/devid: {}",
                spec.device
            ))
        })?;
        let device = house
            .get_device_by_gateway_and_id(gateway_id, devid)
            .map_err(|e| GatewayError::MissingDevice(e.to_string()))?;

        let rule = Arc::new_cyclic(|weak| Self {
            self_ref: weak.clone(),
            device: Arc::clone(&device),
            bad_state: spec.state.clone(),
            delay: Duration::from_secs_f64(spec.delay),
            alias: spec.alias.clone(),
            notifier: Arc::clone(house.notify()),
            timer: Arc::clone(house.timer()),
            state: Mutex::new(ParanoidState::default()),
        });
        house.events().subscribe(
            device.info().device_id,
            Arc::clone(&rule) as Arc<dyn DeviceEventHandler>,
        );
        Ok(rule)
    }

    pub fn alarmed(&self) -> bool {
        self.state.lock().alarmed
    }

    async fn on_expiry(self: Arc<Self>) {
        {
            let mut state = self.state.lock();
            state.token = None;
        }
        // Still bad after the whole delay?
        if !self.device.is_in_state(&self.bad_state).await {
            return;
        }
        self.state.lock().alarmed = true;
        let message = format!(
            "{} has been {} for {} seconds",
            self.device.info().name,
            self.bad_state,
            self.delay.as_secs()
        );
        warn!(%message, "paranoid alarm raised");
        self.notifier.notify(&self.alias, None, &message).await;
    }
}

#[async_trait]
impl DeviceEventHandler for ParanoidRule {
    async fn on_event(&self, _device: &Arc<dyn Device>, _synthetic: bool) {
        let bad = self.device.is_in_state(&self.bad_state).await;

        enum Decision {
            Arm,
            Cancel { notify_clear: bool },
            Nothing,
        }
        let decision = {
            let state = self.state.lock();
            if bad {
                if state.token.is_none() && !state.alarmed {
                    Decision::Arm
                } else {
                    Decision::Nothing
                }
            } else if state.token.is_some() || state.alarmed {
                Decision::Cancel {
                    notify_clear: state.alarmed,
                }
            } else {
                Decision::Nothing
            }
        };

        match decision {
            Decision::Arm => {
                let Some(this) = self.self_ref.upgrade() else {
                    return;
                };
                debug!(device = %self.device.info().name, "paranoid watch armed");
                let token = self.timer.add_event(self.delay, move || this.on_expiry());
                self.state.lock().token = Some(token);
            }
            Decision::Cancel { notify_clear } => {
                let token = {
                    let mut state = self.state.lock();
                    state.alarmed = false;
                    state.token.take()
                };
                if let Some(token) = token {
                    self.timer.cancel_event(token);
                }
                if notify_clear {
                    let message =
                        format!("{} is no longer {}", self.device.info().name, self.bad_state);
                    info!(%message, "paranoid alarm cleared");
                    self.notifier.notify(&self.alias, None, &message).await;
                }
            }
            Decision::Nothing => {}
        }
    }
}

#[cfg(test)]
#[path = "rules_tests.rs"]
mod tests;
