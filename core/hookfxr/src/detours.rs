//! Replacement functions installed by the hook chain.
//!
//! Both run on whatever thread the host happens to use and reach the context
//! through the process-wide static.

use std::ffi::c_void;

use hookfxr_core::hook::hostpolicy::{CorehostLoadFn, HostInterface};
use hookfxr_core::pal;
use hookfxr_core::{abort_on_fatal, HookError};

use crate::context;
use crate::platform::WinModule;

/// `HMODULE LoadLibraryExW(LPCWSTR, HANDLE, DWORD)`
pub type LoadLibraryExWFn =
    unsafe extern "system" fn(name: *const u16, file: *mut c_void, flags: u32) -> *mut c_void;

pub unsafe extern "system" fn load_library_ex_w(
    name: *const u16,
    file: *mut c_void,
    flags: u32,
) -> *mut c_void {
    let ctx = context();
    let Some(original) = ctx.hooks().loader_original() else {
        abort_on_fatal(&HookError::InvalidState(ctx.hooks().state()));
    };
    let original: LoadLibraryExWFn = std::mem::transmute(original);

    let module = original(name, file, flags);
    let loaded = (!module.is_null()).then(|| WinModule::from_raw(module));

    if let Some(requested) = pal::units_from_ptr(name) {
        if let Err(e) = ctx.hooks().on_library_loaded(
            requested,
            loaded.as_ref(),
            corehost_load as *const c_void,
        ) {
            abort_on_fatal(&e);
        }
    }

    module
}

/// hostfxr passes the interface as const but hostpolicy only reads it during
/// this call, so the deps field is rewritten in place.
pub unsafe extern "C" fn corehost_load(init: *const HostInterface) -> i32 {
    let ctx = context();
    if let Err(e) = ctx.inject_deps(init.cast_mut()) {
        abort_on_fatal(&e);
    }

    let Some(original) = ctx.hooks().target_original() else {
        abort_on_fatal(&HookError::InvalidState(ctx.hooks().state()));
    };
    let original: CorehostLoadFn = std::mem::transmute(original);
    original(init)
}
