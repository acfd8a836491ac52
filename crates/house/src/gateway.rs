// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The gateway abstraction: one plugin owning one physical integration.

use std::any::Any;
use std::sync::Arc;

use crate::device::Device;

/// A plugin owning one physical integration (repeater, alarm panel, ...).
///
/// Gateways own their devices exclusively; tearing a gateway down removes
/// its devices.
pub trait Gateway: Send + Sync {
    /// Unique gateway id; the persistence database key.
    fn gateway_id(&self) -> &str;

    /// Look up a device by its gateway-scoped id.
    fn lookup(&self, gateway_devid: &str) -> Option<Arc<dyn Device>>;

    /// Concrete-type escape hatch for cross-gateway rules.
    fn as_any(&self) -> &dyn Any;
}
