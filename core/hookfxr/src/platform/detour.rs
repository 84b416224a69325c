use std::ffi::c_void;

use hookfxr_core::{InterceptError, Interceptor};
use retour::RawDetour;

pub struct DetourHandle(RawDetour);

// The detour owns a trampoline that is only read after construction; enabling
// and disabling are serialized by the hook chain's state machine.
unsafe impl Send for DetourHandle {}
unsafe impl Sync for DetourHandle {}

/// Inline function patching through `retour`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RetourInterceptor;

impl Interceptor for RetourInterceptor {
    type Handle = DetourHandle;

    unsafe fn prepare(
        &self,
        target: *const c_void,
        detour: *const c_void,
    ) -> Result<DetourHandle, InterceptError> {
        RawDetour::new(target.cast(), detour.cast())
            .map(DetourHandle)
            .map_err(intercept_error)
    }

    unsafe fn enable(&self, handle: &DetourHandle) -> Result<(), InterceptError> {
        handle.0.enable().map_err(intercept_error)
    }

    unsafe fn disable(&self, handle: &DetourHandle) -> Result<(), InterceptError> {
        handle.0.disable().map_err(intercept_error)
    }

    fn original(&self, handle: &DetourHandle) -> *const c_void {
        let trampoline: *const () = handle.0.trampoline();
        trampoline.cast()
    }
}

fn intercept_error(err: retour::Error) -> InterceptError {
    InterceptError(err.to_string())
}
