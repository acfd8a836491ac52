// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! sg-house: the object model common to the whole system and the glue
//! between gateway plugins.
//!
//! Object instantiation works outside-in:
//! - the daemon creates a single [`House`]
//! - the House instantiates gateway plugins ([`Gateway`] implementations)
//! - each gateway creates zero or more [`Device`]s, and binds them to
//!   [`Area`]s by asking the House to look areas up (created on the fly)

pub mod device;
pub mod events;
pub mod gateway;
pub mod house;
pub mod notify;
pub mod reports;
pub mod supervise;
pub mod timer;

#[cfg(test)]
mod test_support;

pub use device::{Device, DeviceInfo};
pub use events::{DeviceEventHandler, EventBus};
pub use gateway::Gateway;
pub use house::{Area, House, HouseError};
pub use notify::{
    EmailConfig, EmailNotifyAdapter, NoOpNotifyAdapter, Notifier, NotifyAdapter, NotifyError,
};
pub use reports::{Reporter, ReportingConfig};
pub use supervise::Supervisor;
pub use timer::{Timer, TimerQueue};

#[cfg(any(test, feature = "test-support"))]
pub use notify::{FakeNotifyAdapter, NotifyCall};
