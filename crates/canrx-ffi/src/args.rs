use std::ffi::CStr;
use std::os::raw::c_char;

use canrx_core::InterfaceId;

use crate::error;

/// Convert an optional C string argument into UTF-8 `&str`.
///
/// # Safety
/// `value` must be null or point to a valid NUL-terminated C string.
pub(crate) unsafe fn optional_str_arg<'a>(
    value: *const c_char,
    name: &str,
) -> Result<Option<&'a str>, ()> {
    if value.is_null() {
        return Ok(None);
    }

    let as_cstr = {
        // SAFETY: The caller guarantees `value` points to a valid NUL-terminated C string.
        unsafe { CStr::from_ptr(value) }
    };

    match as_cstr.to_str() {
        Ok(v) => Ok(Some(v)),
        Err(_) => {
            let _ = error::set_invalid_argument(format!("{name} must be valid UTF-8"));
            Err(())
        }
    }
}

/// Negative values select the global registry.
pub(crate) fn interface_arg(ifindex: i32) -> Option<InterfaceId> {
    u32::try_from(ifindex).ok().map(InterfaceId)
}
