use canrx_frame::Filter;

use crate::device::InterfaceId;

/// Errors returned by registration, unregistration and interface attach.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// The interface is unknown, detached, or has no receive registry.
    #[error("no CAN interface {0}")]
    NoDevice(InterfaceId),

    /// The interface exists but is not a CAN bus.
    #[error("interface {0} is not a CAN interface")]
    DeviceType(InterfaceId),

    /// A configured capacity limit was reached. Nothing was modified.
    #[error("capacity exhausted (limit {limit})")]
    Allocation { limit: usize },

    /// No live receiver matches the unregistration request.
    #[error("no receiver for filter {filter} on {}", scope_label(.interface))]
    NotFound {
        interface: Option<InterfaceId>,
        filter: Filter,
    },
}

pub type Result<T> = std::result::Result<T, RegistryError>;

fn scope_label(interface: &Option<InterfaceId>) -> String {
    match interface {
        Some(id) => format!("interface {id}"),
        None => "any interface".to_string(),
    }
}
