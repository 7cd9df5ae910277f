//! Receive-side frame dispatch for CAN-style buses.
//!
//! Applications register a handler together with an identifier filter,
//! either on one interface or globally. Each frame that arrives on an
//! interface is delivered to every matching handler of that interface and of
//! the global registry.
//!
//! Filters are sorted into buckets when they are registered, so the common
//! cases (catch-all, one exact identifier) cost nothing per frame beyond the
//! handler call. Dispatch is lock-free and may run on many threads at once;
//! registration and interface lifecycle changes are serialized.
//!
//! ```
//! use std::sync::Arc;
//! use canrx_core::{Engine, InterfaceId, StaticDevices};
//! use canrx_frame::{CanId, Filter, Frame, SFF_MASK};
//!
//! let can0 = InterfaceId(1);
//! let engine = Engine::new(Arc::new(StaticDevices::with_can([can0])));
//! engine.on_interface_attach(can0)?;
//!
//! engine.register(
//!     Some(can0),
//!     Filter::new(0x123, SFF_MASK),
//!     Arc::new(|frame: &Frame| println!("{frame}")),
//!     "logger",
//! )?;
//!
//! let frame = Frame::new(CanId::standard(0x123), &[0xDE, 0xAD])?;
//! assert_eq!(engine.dispatch(can0, &frame), 1);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#[cfg(feature = "async")]
pub mod channel;
pub mod classify;
pub mod config;
pub mod device;
pub mod engine;
pub mod error;
pub mod lifecycle;
mod list;
pub mod receiver;
pub mod registry;
pub mod stats;

#[cfg(feature = "async")]
pub use channel::{channel_handler, ChannelHandler};
pub use classify::{classify, Bucket, SFF_BUCKETS};
pub use config::EngineConfig;
pub use device::{DeviceDirectory, DeviceKind, InterfaceId, StaticDevices};
pub use engine::Engine;
pub use error::{RegistryError, Result};
pub use lifecycle::InterfaceState;
pub use receiver::{FrameHandler, ReceiverHandle, ReceiverInfo};
pub use registry::Registry;
pub use stats::StatsSnapshot;
