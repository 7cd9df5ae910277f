//! Identifier-filtered receive dispatch for CAN buses.
//!
//! canrx sorts subscriber filters into buckets at registration time and
//! delivers every received frame to the matching subscribers of its interface
//! and of the global registry, without taking a lock on the receive path.
//!
//! # Crate Structure
//!
//! - [`frame`]: Identifiers, frames, filters and their codecs
//! - [`engine`]: Classification, registries, dispatch and interface lifecycle

/// Re-export frame types.
pub mod frame {
    pub use canrx_frame::*;
}

/// Re-export engine types.
pub mod engine {
    pub use canrx_core::*;
}

pub use canrx_core::{Engine, EngineConfig, FrameHandler, InterfaceId, RegistryError, StaticDevices};
pub use canrx_frame::{CanId, Filter, Frame};
