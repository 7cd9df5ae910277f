//! The device subsystem as seen from the receive path.
//!
//! The engine never owns interfaces. It asks a [`DeviceDirectory`] whether an
//! interface exists and whether it is a CAN bus, and is told about attach and
//! detach through [`Engine::on_interface_attach`](crate::Engine::on_interface_attach)
//! and [`Engine::on_interface_detach`](crate::Engine::on_interface_detach).

use std::collections::HashMap;
use std::fmt;
use std::sync::{PoisonError, RwLock};

use serde::Serialize;

/// Interface index, as assigned by the device subsystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct InterfaceId(pub u32);

impl fmt::Display for InterfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What kind of link an interface is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    Can,
    Other,
}

/// Liveness and type queries answered by the device subsystem.
pub trait DeviceDirectory: Send + Sync {
    /// `None` when the interface does not exist.
    fn kind(&self, interface: InterfaceId) -> Option<DeviceKind>;

    fn is_can_interface(&self, interface: InterfaceId) -> bool {
        self.kind(interface) == Some(DeviceKind::Can)
    }
}

/// A directory backed by an in-memory table.
#[derive(Debug, Default)]
pub struct StaticDevices {
    devices: RwLock<HashMap<InterfaceId, DeviceKind>>,
}

impl StaticDevices {
    pub fn new() -> Self {
        Self::default()
    }

    /// Directory pre-populated with CAN interfaces.
    pub fn with_can(interfaces: impl IntoIterator<Item = InterfaceId>) -> Self {
        let devices = interfaces
            .into_iter()
            .map(|id| (id, DeviceKind::Can))
            .collect();
        Self {
            devices: RwLock::new(devices),
        }
    }

    pub fn insert(&self, interface: InterfaceId, kind: DeviceKind) {
        self.devices
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(interface, kind);
    }

    pub fn remove(&self, interface: InterfaceId) -> Option<DeviceKind> {
        self.devices
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&interface)
    }
}

impl DeviceDirectory for StaticDevices {
    fn kind(&self, interface: InterfaceId) -> Option<DeviceKind> {
        self.devices
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&interface)
            .copied()
    }
}
