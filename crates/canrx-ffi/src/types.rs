use std::collections::HashMap;
use std::ffi::c_void;
use std::sync::{Arc, Mutex};

use canrx_core::{Engine, FrameHandler, StaticDevices};
use canrx_frame::{CanId, Frame, FrameError, MAX_DLEN};

#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CanrxResult {
    Ok = 0,
    InvalidArgument = 1,
    NoDevice = 2,
    DeviceType = 3,
    Allocation = 4,
    NotFound = 5,
    FrameError = 6,
    Internal = 99,
}

#[allow(dead_code)]
pub const CANRX_OK: CanrxResult = CanrxResult::Ok;
#[allow(dead_code)]
pub const CANRX_ERR_INVALID_ARGUMENT: CanrxResult = CanrxResult::InvalidArgument;
#[allow(dead_code)]
pub const CANRX_ERR_NO_DEVICE: CanrxResult = CanrxResult::NoDevice;
#[allow(dead_code)]
pub const CANRX_ERR_DEVICE_TYPE: CanrxResult = CanrxResult::DeviceType;
#[allow(dead_code)]
pub const CANRX_ERR_ALLOCATION: CanrxResult = CanrxResult::Allocation;
#[allow(dead_code)]
pub const CANRX_ERR_NOT_FOUND: CanrxResult = CanrxResult::NotFound;
#[allow(dead_code)]
pub const CANRX_ERR_FRAME: CanrxResult = CanrxResult::FrameError;
#[allow(dead_code)]
pub const CANRX_ERR_INTERNAL: CanrxResult = CanrxResult::Internal;

/// Passed as `ifindex` to register in the global registry.
pub const CANRX_ANY_INTERFACE: i32 = -1;

/// Frame layout shared with C callers. Matches the 16-byte wire record.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CanrxFrame {
    pub can_id: u32,
    pub len: u8,
    pub pad: [u8; 3],
    pub data: [u8; MAX_DLEN],
}

impl CanrxFrame {
    pub(crate) fn to_frame(self) -> Result<Frame, FrameError> {
        if usize::from(self.len) > MAX_DLEN {
            return Err(FrameError::InvalidLength(self.len));
        }
        Ok(Frame {
            id: CanId::from_raw(self.can_id),
            len: self.len,
            data: self.data,
        })
    }
}

impl From<&Frame> for CanrxFrame {
    fn from(frame: &Frame) -> Self {
        Self {
            can_id: frame.id.raw(),
            len: frame.len,
            pad: [0; 3],
            data: frame.data,
        }
    }
}

/// Receive callback. `frame` is valid only for the duration of the call.
pub type CanrxRxCallback = unsafe extern "C" fn(frame: *const CanrxFrame, ctx: *mut c_void);

pub type CanrxEngineHandle = *mut c_void;

/// A foreign callback plus its context pointer.
pub(crate) struct ForeignHandler {
    pub(crate) callback: CanrxRxCallback,
    pub(crate) ctx: *mut c_void,
}

// SAFETY: registering a callback promises that it may be invoked with `ctx`
// from any thread that calls `canrx_dispatch`.
unsafe impl Send for ForeignHandler {}
// SAFETY: as above; the handler itself holds no Rust-side mutable state.
unsafe impl Sync for ForeignHandler {}

impl FrameHandler for ForeignHandler {
    fn on_frame(&self, frame: &Frame) {
        let raw = CanrxFrame::from(frame);
        // SAFETY: the caller registered `callback` for use with `ctx`, and
        // `raw` outlives the call.
        unsafe { (self.callback)(&raw, self.ctx) }
    }
}

/// Callback identity as seen by C callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct ForeignKey {
    pub(crate) callback: usize,
    pub(crate) ctx: usize,
}

impl ForeignKey {
    pub(crate) fn new(callback: CanrxRxCallback, ctx: *mut c_void) -> Self {
        Self {
            callback: callback as usize,
            ctx: ctx as usize,
        }
    }
}

/// One shared handler per (callback, ctx) pair, counted by live registrations.
pub(crate) struct HandlerSlot {
    pub(crate) handler: Arc<dyn FrameHandler>,
    pub(crate) registrations: usize,
}

pub(crate) struct EngineHandle {
    pub(crate) engine: Engine,
    pub(crate) devices: Arc<StaticDevices>,
    pub(crate) handlers: Mutex<HashMap<ForeignKey, HandlerSlot>>,
}
