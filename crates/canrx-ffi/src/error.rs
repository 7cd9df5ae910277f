use std::cell::RefCell;
use std::ffi::CString;
use std::os::raw::c_char;

use canrx_core::RegistryError;
use canrx_frame::FrameError;

use crate::types::CanrxResult;

thread_local! {
    static LAST_ERROR: RefCell<CString> = RefCell::new(CString::default());
}

pub(crate) fn clear_error_state() {
    LAST_ERROR.with(|state| {
        *state.borrow_mut() = CString::default();
    });
}

pub(crate) fn set_error_message(message: impl Into<String>) {
    let message = message.into();
    let sanitized = message.replace('\0', "?");
    LAST_ERROR.with(|state| {
        *state.borrow_mut() = CString::new(sanitized).unwrap_or_default();
    });
}

pub(crate) fn set_invalid_argument(message: impl Into<String>) -> CanrxResult {
    set_error_message(message);
    CanrxResult::InvalidArgument
}

pub(crate) fn set_panic_error() {
    set_error_message("panic across FFI boundary");
}

pub(crate) fn map_registry_error(err: &RegistryError) -> CanrxResult {
    set_error_message(err.to_string());
    match err {
        RegistryError::NoDevice(_) => CanrxResult::NoDevice,
        RegistryError::DeviceType(_) => CanrxResult::DeviceType,
        RegistryError::Allocation { .. } => CanrxResult::Allocation,
        RegistryError::NotFound { .. } => CanrxResult::NotFound,
    }
}

pub(crate) fn map_frame_error(err: &FrameError) -> CanrxResult {
    set_error_message(err.to_string());
    CanrxResult::FrameError
}

pub(crate) fn last_error_ptr() -> *const c_char {
    LAST_ERROR.with(|state| state.borrow().as_ptr())
}
