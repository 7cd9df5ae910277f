use std::collections::HashMap;
use std::ffi::c_void;
use std::os::raw::c_char;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use canrx_core::{DeviceKind, Engine, FrameHandler, InterfaceId, RegistryError, StaticDevices};
use canrx_frame::Filter;

use crate::args;
use crate::error;
use crate::types::{
    CanrxEngineHandle, CanrxFrame, CanrxResult, CanrxRxCallback, EngineHandle, ForeignHandler,
    ForeignKey, HandlerSlot,
};

fn with_engine<T>(handle: CanrxEngineHandle, on_error: T, f: impl FnOnce(&EngineHandle) -> T) -> T {
    if handle.is_null() {
        let _ = error::set_invalid_argument("engine handle cannot be null");
        return on_error;
    }

    let engine_handle = {
        // SAFETY: Pointer validity is guaranteed by the caller.
        unsafe { &*(handle as *const EngineHandle) }
    };

    f(engine_handle)
}

fn lock_handlers(handle: &EngineHandle) -> MutexGuard<'_, HashMap<ForeignKey, HandlerSlot>> {
    handle
        .handlers
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

/// Create an engine with no interfaces.
#[no_mangle]
pub extern "C" fn canrx_engine_new() -> CanrxEngineHandle {
    crate::ffi_boundary(std::ptr::null_mut(), || {
        error::clear_error_state();

        let devices = Arc::new(StaticDevices::new());
        let handle = EngineHandle {
            engine: Engine::new(devices.clone()),
            devices,
            handlers: Mutex::new(HashMap::new()),
        };
        Box::into_raw(Box::new(handle)) as CanrxEngineHandle
    })
}

/// Free an engine and every registry it still holds.
///
/// # Safety
/// `engine` must be null or a handle returned by `canrx_engine_new`, and no
/// other thread may be using it.
#[no_mangle]
pub unsafe extern "C" fn canrx_engine_free(engine: CanrxEngineHandle) {
    crate::ffi_boundary((), || {
        if engine.is_null() {
            return;
        }

        // SAFETY: Caller guarantees this handle was allocated by canrx_engine_new.
        let handle = unsafe { Box::from_raw(engine as *mut EngineHandle) };
        handle.engine.shutdown();
    });
}

/// Announce an interface. Non-CAN interfaces are recorded but get no registry.
///
/// # Safety
/// `engine` must be a valid engine handle.
#[no_mangle]
pub unsafe extern "C" fn canrx_interface_attach(
    engine: CanrxEngineHandle,
    ifindex: u32,
    is_can: bool,
) -> CanrxResult {
    crate::ffi_boundary(CanrxResult::Internal, || {
        error::clear_error_state();

        with_engine(engine, CanrxResult::InvalidArgument, |handle| {
            let interface = InterfaceId(ifindex);
            let kind = if is_can {
                DeviceKind::Can
            } else {
                DeviceKind::Other
            };
            handle.devices.insert(interface, kind);

            match handle.engine.on_interface_attach(interface) {
                Ok(()) => CanrxResult::Ok,
                Err(err) => error::map_registry_error(&err),
            }
        })
    })
}

/// Announce that an interface went away.
///
/// # Safety
/// `engine` must be a valid engine handle.
#[no_mangle]
pub unsafe extern "C" fn canrx_interface_detach(
    engine: CanrxEngineHandle,
    ifindex: u32,
) -> CanrxResult {
    crate::ffi_boundary(CanrxResult::Internal, || {
        error::clear_error_state();

        with_engine(engine, CanrxResult::InvalidArgument, |handle| {
            let interface = InterfaceId(ifindex);
            handle.engine.on_interface_detach(interface);
            handle.devices.remove(interface);
            CanrxResult::Ok
        })
    })
}

/// Register `callback` with `ctx` for frames matching `can_id`/`mask`.
///
/// `ifindex < 0` registers for every interface. `name` may be null.
///
/// # Safety
/// `engine` must be a valid engine handle. `name` must be null or a valid
/// NUL-terminated C string. `callback` may be invoked with `ctx` from any
/// thread calling `canrx_dispatch` until `canrx_unregister` returns and every
/// dispatch call that started before it has finished.
#[no_mangle]
pub unsafe extern "C" fn canrx_register(
    engine: CanrxEngineHandle,
    ifindex: i32,
    can_id: u32,
    mask: u32,
    callback: Option<CanrxRxCallback>,
    ctx: *mut c_void,
    name: *const c_char,
) -> CanrxResult {
    crate::ffi_boundary(CanrxResult::Internal, || {
        error::clear_error_state();

        let Some(callback) = callback else {
            return error::set_invalid_argument("callback cannot be null");
        };
        let name = {
            // SAFETY: We validate null and UTF-8 in helper.
            match unsafe { args::optional_str_arg(name, "name") } {
                Ok(v) => v.unwrap_or("ffi"),
                Err(()) => return CanrxResult::InvalidArgument,
            }
        };

        with_engine(engine, CanrxResult::InvalidArgument, |handle| {
            let key = ForeignKey::new(callback, ctx);
            let mut handlers = lock_handlers(handle);
            let handler = match handlers.get(&key) {
                Some(slot) => Arc::clone(&slot.handler),
                None => Arc::new(ForeignHandler { callback, ctx }) as Arc<dyn FrameHandler>,
            };

            let filter = Filter::new(can_id, mask);
            match handle.engine.register(
                args::interface_arg(ifindex),
                filter,
                Arc::clone(&handler),
                name,
            ) {
                Ok(_) => {
                    handlers
                        .entry(key)
                        .or_insert(HandlerSlot {
                            handler,
                            registrations: 0,
                        })
                        .registrations += 1;
                    CanrxResult::Ok
                }
                Err(err) => error::map_registry_error(&err),
            }
        })
    })
}

/// Remove one registration made with the same interface, filter, callback and ctx.
///
/// # Safety
/// `engine` must be a valid engine handle.
#[no_mangle]
pub unsafe extern "C" fn canrx_unregister(
    engine: CanrxEngineHandle,
    ifindex: i32,
    can_id: u32,
    mask: u32,
    callback: Option<CanrxRxCallback>,
    ctx: *mut c_void,
) -> CanrxResult {
    crate::ffi_boundary(CanrxResult::Internal, || {
        error::clear_error_state();

        let Some(callback) = callback else {
            return error::set_invalid_argument("callback cannot be null");
        };

        with_engine(engine, CanrxResult::InvalidArgument, |handle| {
            let interface = args::interface_arg(ifindex);
            let filter = Filter::new(can_id, mask);
            let key = ForeignKey::new(callback, ctx);
            let mut handlers = lock_handlers(handle);

            let Some(slot) = handlers.get_mut(&key) else {
                let err = RegistryError::NotFound { interface, filter };
                return error::map_registry_error(&err);
            };

            match handle.engine.unregister(interface, filter, &slot.handler) {
                Ok(()) => {
                    slot.registrations -= 1;
                    if slot.registrations == 0 {
                        handlers.remove(&key);
                    }
                    CanrxResult::Ok
                }
                Err(err) => error::map_registry_error(&err),
            }
        })
    })
}

/// Deliver one received frame. `out_matches` may be null.
///
/// # Safety
/// `engine` must be a valid engine handle. `frame` must be non-null and
/// readable. `out_matches` must be null or writable.
#[no_mangle]
pub unsafe extern "C" fn canrx_dispatch(
    engine: CanrxEngineHandle,
    ifindex: u32,
    frame: *const CanrxFrame,
    out_matches: *mut u32,
) -> CanrxResult {
    crate::ffi_boundary(CanrxResult::Internal, || {
        error::clear_error_state();

        if frame.is_null() {
            return error::set_invalid_argument("frame cannot be null");
        }
        let raw = {
            // SAFETY: Pointer was checked for null above; readability is guaranteed by the caller.
            unsafe { *frame }
        };
        let frame = match raw.to_frame() {
            Ok(frame) => frame,
            Err(err) => return error::map_frame_error(&err),
        };

        with_engine(engine, CanrxResult::InvalidArgument, |handle| {
            let matches = handle.engine.dispatch(InterfaceId(ifindex), &frame);
            if !out_matches.is_null() {
                // SAFETY: Pointer was checked for null above.
                unsafe {
                    *out_matches = matches;
                }
            }
            CanrxResult::Ok
        })
    })
}

/// Whether `ifindex` currently has a receive registry.
///
/// # Safety
/// `engine` must be a valid engine handle.
#[no_mangle]
pub unsafe extern "C" fn canrx_has_registry(engine: CanrxEngineHandle, ifindex: u32) -> bool {
    crate::ffi_boundary(false, || {
        with_engine(engine, false, |handle| {
            handle.engine.has_registry(InterfaceId(ifindex))
        })
    })
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use canrx_frame::{INV_FILTER, SFF_MASK};

    use super::*;
    use crate::types::CANRX_ANY_INTERFACE;

    unsafe extern "C" fn count_frame(frame: *const CanrxFrame, ctx: *mut c_void) {
        // SAFETY: tests pass a live AtomicU32 as ctx and a valid frame.
        let counter = unsafe { &*(ctx as *const AtomicU32) };
        let frame = unsafe { &*frame };
        assert!(frame.len <= 8);
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn data_frame(can_id: u32) -> CanrxFrame {
        CanrxFrame {
            can_id,
            len: 2,
            data: [0xCA, 0xFE, 0, 0, 0, 0, 0, 0],
            ..CanrxFrame::default()
        }
    }

    fn ctx(counter: &AtomicU32) -> *mut c_void {
        counter as *const AtomicU32 as *mut c_void
    }

    #[test]
    fn register_dispatch_unregister() {
        let engine = canrx_engine_new();
        let counter = AtomicU32::new(0);

        unsafe {
            assert_eq!(canrx_interface_attach(engine, 3, true), CanrxResult::Ok);
            assert_eq!(
                canrx_register(
                    engine,
                    3,
                    0x123,
                    SFF_MASK,
                    Some(count_frame),
                    ctx(&counter),
                    std::ptr::null()
                ),
                CanrxResult::Ok
            );

            let mut matches = 0;
            let frame = data_frame(0x123);
            assert_eq!(
                canrx_dispatch(engine, 3, &frame, &mut matches),
                CanrxResult::Ok
            );
            assert_eq!(matches, 1);

            assert_eq!(
                canrx_unregister(engine, 3, 0x123, SFF_MASK, Some(count_frame), ctx(&counter)),
                CanrxResult::Ok
            );
            assert_eq!(
                canrx_unregister(engine, 3, 0x123, SFF_MASK, Some(count_frame), ctx(&counter)),
                CanrxResult::NotFound
            );
            canrx_engine_free(engine);
        }
        assert_eq!(counter.load(Ordering::Relaxed), 1);
    }

    #[test]
    fn same_callback_different_ctx_are_distinct() {
        let engine = canrx_engine_new();
        let first = AtomicU32::new(0);
        let second = AtomicU32::new(0);
        let filter = (0x10 | INV_FILTER, SFF_MASK);

        unsafe {
            for counter in [&first, &second] {
                assert_eq!(
                    canrx_register(
                        engine,
                        CANRX_ANY_INTERFACE,
                        filter.0,
                        filter.1,
                        Some(count_frame),
                        ctx(counter),
                        std::ptr::null()
                    ),
                    CanrxResult::Ok
                );
            }

            let mut matches = 0;
            canrx_dispatch(engine, 7, &data_frame(0x11), &mut matches);
            assert_eq!(matches, 2);

            canrx_unregister(
                engine,
                CANRX_ANY_INTERFACE,
                filter.0,
                filter.1,
                Some(count_frame),
                ctx(&first),
            );
            canrx_dispatch(engine, 7, &data_frame(0x11), &mut matches);
            assert_eq!(matches, 1);
            canrx_engine_free(engine);
        }
        assert_eq!(first.load(Ordering::Relaxed), 1);
        assert_eq!(second.load(Ordering::Relaxed), 2);
    }

    #[test]
    fn register_errors_map_to_result_codes() {
        let engine = canrx_engine_new();
        let counter = AtomicU32::new(0);

        unsafe {
            canrx_interface_attach(engine, 4, false);
            assert_eq!(
                canrx_register(engine, 4, 0, 0, Some(count_frame), ctx(&counter), std::ptr::null()),
                CanrxResult::DeviceType
            );
            assert_eq!(
                canrx_register(engine, 5, 0, 0, Some(count_frame), ctx(&counter), std::ptr::null()),
                CanrxResult::NoDevice
            );
            assert_eq!(
                canrx_register(engine, 5, 0, 0, None, ctx(&counter), std::ptr::null()),
                CanrxResult::InvalidArgument
            );
            canrx_engine_free(engine);
        }
    }

    #[test]
    fn detach_defers_until_drained() {
        let engine = canrx_engine_new();
        let counter = AtomicU32::new(0);

        unsafe {
            canrx_interface_attach(engine, 2, true);
            canrx_register(engine, 2, 0, 0, Some(count_frame), ctx(&counter), std::ptr::null());
            canrx_interface_detach(engine, 2);
            assert!(canrx_has_registry(engine, 2));

            assert_eq!(
                canrx_unregister(engine, 2, 0, 0, Some(count_frame), ctx(&counter)),
                CanrxResult::Ok
            );
            assert!(!canrx_has_registry(engine, 2));
            canrx_engine_free(engine);
        }
    }

    #[test]
    fn oversized_frame_is_rejected() {
        let engine = canrx_engine_new();
        let frame = CanrxFrame {
            len: 9,
            ..CanrxFrame::default()
        };
        unsafe {
            assert_eq!(
                canrx_dispatch(engine, 1, &frame, std::ptr::null_mut()),
                CanrxResult::FrameError
            );
            canrx_engine_free(engine);
        }
    }
}
