use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use canrx_frame::{Filter, Frame};
use serde::Serialize;

use crate::classify::Bucket;
use crate::device::InterfaceId;

/// Something that wants to see matching frames.
///
/// Handlers run on the dispatch path, possibly on several threads at once,
/// and must not block. Identity for unregistration is the identity of the
/// `Arc<dyn FrameHandler>` allocation, so callback and context travel
/// together in one handler value.
pub trait FrameHandler: Send + Sync {
    fn on_frame(&self, frame: &Frame);
}

impl<F> FrameHandler for F
where
    F: Fn(&Frame) + Send + Sync,
{
    fn on_frame(&self, frame: &Frame) {
        self(frame)
    }
}

/// One live subscription stored in a registry bucket.
pub(crate) struct Receiver {
    original: Filter,
    normalized: Filter,
    bucket: Bucket,
    handler: Arc<dyn FrameHandler>,
    name: String,
    matches: AtomicU64,
}

impl Receiver {
    pub(crate) fn new(
        original: Filter,
        normalized: Filter,
        bucket: Bucket,
        handler: Arc<dyn FrameHandler>,
        name: String,
    ) -> Self {
        Self {
            original,
            normalized,
            bucket,
            handler,
            name,
            matches: AtomicU64::new(0),
        }
    }

    /// The normalized filter dispatch compares against.
    pub(crate) fn filter(&self) -> Filter {
        self.normalized
    }

    pub(crate) fn is_same_subscription(
        &self,
        normalized: Filter,
        handler: &Arc<dyn FrameHandler>,
    ) -> bool {
        self.normalized == normalized
            && std::ptr::addr_eq(Arc::as_ptr(&self.handler), Arc::as_ptr(handler))
    }

    pub(crate) fn deliver(&self, frame: &Frame) {
        self.handler.on_frame(frame);
        self.matches.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn info(&self, interface: Option<InterfaceId>) -> ReceiverInfo {
        ReceiverInfo {
            interface,
            bucket: self.bucket,
            id: self.normalized.id,
            mask: self.normalized.mask,
            name: self.name.clone(),
            matches: self.matches.load(Ordering::Relaxed),
        }
    }
}

impl fmt::Debug for Receiver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Receiver")
            .field("filter", &self.normalized)
            .field("bucket", &self.bucket)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}

/// Returned by a successful registration.
///
/// Holding a handle keeps the receiver's handler alive, not its registration;
/// pass it to [`Engine::unregister_handle`](crate::Engine::unregister_handle)
/// to remove exactly this receiver.
#[derive(Debug, Clone)]
pub struct ReceiverHandle {
    pub(crate) interface: Option<InterfaceId>,
    pub(crate) receiver: Arc<Receiver>,
}

impl ReceiverHandle {
    /// `None` for the global registry.
    pub fn interface(&self) -> Option<InterfaceId> {
        self.interface
    }

    /// The filter as the caller registered it.
    pub fn filter(&self) -> Filter {
        self.receiver.original
    }

    /// The filter as stored for dispatch.
    pub fn normalized(&self) -> Filter {
        self.receiver.normalized
    }

    pub fn bucket(&self) -> Bucket {
        self.receiver.bucket
    }

    pub fn name(&self) -> &str {
        &self.receiver.name
    }

    pub fn handler(&self) -> &Arc<dyn FrameHandler> {
        &self.receiver.handler
    }

    /// Frames delivered to this receiver so far.
    pub fn matches(&self) -> u64 {
        self.receiver.matches.load(Ordering::Relaxed)
    }
}

/// Point-in-time description of a registered receiver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReceiverInfo {
    pub interface: Option<InterfaceId>,
    pub bucket: Bucket,
    pub id: u32,
    pub mask: u32,
    pub name: String,
    pub matches: u64,
}
