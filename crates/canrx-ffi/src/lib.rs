//! canrx-ffi: C-ABI exports for the canrx receive engine.
//!
//! Every export catches panics, reports failures through [`CanrxResult`], and
//! leaves a description for [`canrx_last_error`] on the calling thread.

mod args;
mod engine;
mod error;
mod types;

use std::panic::AssertUnwindSafe;

pub use engine::{
    canrx_dispatch, canrx_engine_free, canrx_engine_new, canrx_has_registry,
    canrx_interface_attach, canrx_interface_detach, canrx_register, canrx_unregister,
};
pub use types::{
    CanrxEngineHandle, CanrxFrame, CanrxResult, CanrxRxCallback, CANRX_ANY_INTERFACE,
    CANRX_ERR_ALLOCATION, CANRX_ERR_DEVICE_TYPE, CANRX_ERR_FRAME, CANRX_ERR_INTERNAL,
    CANRX_ERR_INVALID_ARGUMENT, CANRX_ERR_NOT_FOUND, CANRX_ERR_NO_DEVICE, CANRX_OK,
};

fn ffi_boundary<T>(on_panic: T, f: impl FnOnce() -> T) -> T {
    match std::panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(value) => value,
        Err(_) => {
            error::set_panic_error();
            on_panic
        }
    }
}

#[no_mangle]
pub extern "C" fn canrx_last_error() -> *const std::os::raw::c_char {
    ffi_boundary(std::ptr::null(), error::last_error_ptr)
}

#[no_mangle]
pub extern "C" fn canrx_clear_error() {
    ffi_boundary((), error::clear_error_state);
}

#[cfg(test)]
mod tests {
    use std::ffi::CStr;

    use super::*;

    #[test]
    fn last_error_starts_empty() {
        canrx_clear_error();
        let ptr = canrx_last_error();
        assert!(!ptr.is_null());

        // SAFETY: canrx_last_error returns a pointer to a thread-local CString.
        let text = unsafe { CStr::from_ptr(ptr).to_str().unwrap() };
        assert!(text.is_empty());
    }

    #[test]
    fn null_engine_sets_last_error() {
        // SAFETY: null handles are rejected before use.
        let result = unsafe { canrx_interface_attach(std::ptr::null_mut(), 1, true) };
        assert_eq!(result, CanrxResult::InvalidArgument);

        // SAFETY: canrx_last_error returns a pointer to a thread-local CString.
        let text = unsafe { CStr::from_ptr(canrx_last_error()).to_str().unwrap() };
        assert!(text.contains("engine handle"));
    }

    #[test]
    fn frame_layout_matches_wire_record() {
        assert_eq!(std::mem::size_of::<CanrxFrame>(), canrx_frame::CAN_MTU);
    }
}
