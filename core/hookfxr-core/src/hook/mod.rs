//! Two-stage hook chain that merges the original application's deps.json.
//!
//! ## State Machine
//!
//! ```text
//! Uninstalled  --arm-->                 LoaderHooked   (LoadLibraryExW patched)
//! LoaderHooked --hostpolicy loaded-->   TargetHooked   (loader hook disabled,
//!                                                       corehost_load patched)
//! LoaderHooked --any integrity error--> Failed         (caller aborts)
//! ```
//!
//! Every library load passes through the loader detour until hostpolicy shows
//! up; the check for other modules is a filename comparison only. Once
//! hostpolicy is seen, the detour takes itself out and patches
//! `corehost_load`, whose detour then rewrites `additional_deps_serialized`.

pub mod hostpolicy;

use std::ffi::{c_void, OsString};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::{Mutex, OnceLock};

use thiserror::Error;

use crate::deps::companion_manifest;
use crate::pal::{self, PalChar, PalString, PATH_LIST_SEPARATOR};
use crate::resolver::{SymbolNotFound, SymbolResolver};

use hostpolicy::{
    HostInterface, COREHOST_LOAD_EXPORT, HOSTPOLICY_LIBRARY_NAME, HOST_INTERFACE_LAYOUT_VERSION_HI,
};

pub const LOADER_HOOK: &str = "LoadLibraryExW";
pub const TARGET_HOOK: &str = COREHOST_LOAD_EXPORT;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum HookState {
    Uninstalled = 0,
    LoaderHooked = 1,
    TargetHooked = 2,
    Failed = 3,
}

impl HookState {
    fn from_u8(value: u8) -> Self {
        match value {
            0 => HookState::Uninstalled,
            1 => HookState::LoaderHooked,
            2 => HookState::TargetHooked,
            _ => HookState::Failed,
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct InterceptError(pub String);

#[derive(Error, Debug)]
pub enum HookError {
    #[error("Failed to install {target} hook: {source}")]
    Install {
        target: &'static str,
        source: InterceptError,
    },

    #[error("Failed to disable {target} hook: {source}")]
    Disable {
        target: &'static str,
        source: InterceptError,
    },

    #[error("{0} (incompatible hostpolicy)")]
    ExportNotFound(#[from] SymbolNotFound),

    #[error("host_interface_t layout version {found:#x} does not match {expected:#x}")]
    AbiVersionMismatch { found: usize, expected: usize },

    #[error("Hook chain cannot proceed from state {0:?}")]
    InvalidState(HookState),
}

/// Runtime code patching capability.
///
/// `prepare` builds the trampoline without redirecting anything, so the
/// handle is stored before the first redirected call can arrive.
pub trait Interceptor: Send + Sync {
    type Handle: Send + Sync;

    /// # Safety
    ///
    /// `target` must be patchable code and `detour` a function with the same
    /// signature and calling convention.
    unsafe fn prepare(
        &self,
        target: *const c_void,
        detour: *const c_void,
    ) -> Result<Self::Handle, InterceptError>;

    /// # Safety
    ///
    /// Patches live code; see [`Interceptor::prepare`].
    unsafe fn enable(&self, handle: &Self::Handle) -> Result<(), InterceptError>;

    /// # Safety
    ///
    /// Patches live code; see [`Interceptor::prepare`].
    unsafe fn disable(&self, handle: &Self::Handle) -> Result<(), InterceptError>;

    /// Address that calls the unpatched function.
    fn original(&self, handle: &Self::Handle) -> *const c_void;
}

pub struct HookChain<I: Interceptor> {
    interceptor: I,
    state: AtomicU8,
    loader_claimed: AtomicBool,
    target_claimed: AtomicBool,
    loader: OnceLock<I::Handle>,
    target: OnceLock<I::Handle>,
    injected: Mutex<Vec<PalString>>,
}

impl<I: Interceptor> HookChain<I> {
    pub fn new(interceptor: I) -> Self {
        Self {
            interceptor,
            state: AtomicU8::new(HookState::Uninstalled as u8),
            loader_claimed: AtomicBool::new(false),
            target_claimed: AtomicBool::new(false),
            loader: OnceLock::new(),
            target: OnceLock::new(),
            injected: Mutex::new(Vec::new()),
        }
    }

    pub fn state(&self) -> HookState {
        HookState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn interceptor(&self) -> &I {
        &self.interceptor
    }

    /// Trampoline to the unpatched loader function, once armed.
    pub fn loader_original(&self) -> Option<*const c_void> {
        self.loader.get().map(|h| self.interceptor.original(h))
    }

    /// Trampoline to the unpatched `corehost_load`, once hooked.
    pub fn target_original(&self) -> Option<*const c_void> {
        self.target.get().map(|h| self.interceptor.original(h))
    }

    /// `Uninstalled -> LoaderHooked`. Only the first caller gets to try; a
    /// failed attempt is not retried.
    ///
    /// # Safety
    ///
    /// `loader_fn` must be the OS loader function and `loader_detour` a
    /// function with its exact signature.
    pub unsafe fn arm(
        &self,
        loader_fn: *const c_void,
        loader_detour: *const c_void,
    ) -> Result<(), HookError> {
        if self.loader_claimed.swap(true, Ordering::AcqRel) {
            return Err(HookError::InvalidState(self.state()));
        }

        self.install(&self.loader, LOADER_HOOK, loader_fn, loader_detour)?;
        self.state
            .store(HookState::LoaderHooked as u8, Ordering::Release);

        tracing::info!(hook = LOADER_HOOK, "Loader hook armed");
        Ok(())
    }

    /// Called by the loader detour after the original loader returned.
    /// `module` is `None` when that load failed, which is passed through.
    ///
    /// Returns quickly for every module except the first hostpolicy. An error
    /// from `LoaderHooked` leaves the chain `Failed` and must abort the
    /// process.
    ///
    /// # Safety
    ///
    /// `target_detour` must have the signature of
    /// [`hostpolicy::CorehostLoadFn`].
    pub unsafe fn on_library_loaded<S: SymbolResolver>(
        &self,
        requested: &[PalChar],
        module: Option<&S>,
        target_detour: *const c_void,
    ) -> Result<(), HookError> {
        let Some(module) = module else {
            return Ok(());
        };

        if !pal::file_name_matches(requested, HOSTPOLICY_LIBRARY_NAME) {
            return Ok(());
        }

        if self.target_claimed.load(Ordering::Acquire) {
            tracing::debug!("hostpolicy seen again, already handled");
            return Ok(());
        }

        let state = self.state();
        if state != HookState::LoaderHooked {
            return Err(HookError::InvalidState(state));
        }

        if self.target_claimed.swap(true, Ordering::AcqRel) {
            tracing::debug!("hostpolicy seen again, already handled");
            return Ok(());
        }

        tracing::info!("hostpolicy loaded, moving hook to {}", TARGET_HOOK);

        match self.hook_target(module, target_detour) {
            Ok(()) => {
                self.state
                    .store(HookState::TargetHooked as u8, Ordering::Release);
                tracing::info!(hook = TARGET_HOOK, "Target hook installed");
                Ok(())
            }
            Err(e) => {
                self.state.store(HookState::Failed as u8, Ordering::Release);
                Err(e)
            }
        }
    }

    unsafe fn hook_target<S: SymbolResolver>(
        &self,
        module: &S,
        target_detour: *const c_void,
    ) -> Result<(), HookError> {
        let state = self.state();
        let loader = self.loader.get().ok_or(HookError::InvalidState(state))?;

        self.interceptor
            .disable(loader)
            .map_err(|source| HookError::Disable {
                target: LOADER_HOOK,
                source,
            })?;

        let export = module.symbol(COREHOST_LOAD_EXPORT)?;
        self.install(&self.target, TARGET_HOOK, export.as_ptr(), target_detour)
    }

    unsafe fn install(
        &self,
        slot: &OnceLock<I::Handle>,
        name: &'static str,
        target: *const c_void,
        detour: *const c_void,
    ) -> Result<(), HookError> {
        let install_error = |source| HookError::Install {
            target: name,
            source,
        };

        let handle = self
            .interceptor
            .prepare(target, detour)
            .map_err(install_error)?;
        if slot.set(handle).is_err() {
            return Err(HookError::InvalidState(self.state()));
        }

        let handle = slot.get().ok_or(HookError::InvalidState(self.state()))?;
        self.interceptor.enable(handle).map_err(install_error)
    }

    /// Appends the companion manifest of `app_path` to the call's additional
    /// deps. Returns the injected manifest, if any.
    ///
    /// # Safety
    ///
    /// `init` must be null or point to a live `host_interface_t`.
    pub unsafe fn inject_deps(
        &self,
        app_path: Option<&Path>,
        init: *mut HostInterface,
    ) -> Result<Option<PathBuf>, HookError> {
        let Some(app_path) = app_path else {
            tracing::warn!("No application path recorded, skipping deps merge");
            return Ok(None);
        };

        let Some(manifest) = companion_manifest(app_path) else {
            return Ok(None);
        };

        let Some(init) = init.as_mut() else {
            tracing::warn!("corehost_load called without host interface");
            return Ok(None);
        };

        if init.version_hi != HOST_INTERFACE_LAYOUT_VERSION_HI {
            return Err(HookError::AbiVersionMismatch {
                found: init.version_hi,
                expected: HOST_INTERFACE_LAYOUT_VERSION_HI,
            });
        }

        let mut merged = OsString::new();
        if let Some(existing) = pal::path_from_ptr(init.additional_deps_serialized) {
            if !existing.as_os_str().is_empty() {
                merged.push(existing.as_os_str());
                merged.push(PATH_LIST_SEPARATOR.to_string());
            }
        }
        merged.push(manifest.as_os_str());

        let value = PalString::new(&merged);
        init.additional_deps_serialized = value.as_ptr();
        self.injected
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(value);

        tracing::info!(
            manifest = %manifest.display(),
            additional_deps = %merged.to_string_lossy(),
            "Merged companion deps.json"
        );
        Ok(Some(manifest))
    }
}

/// Logs a fatal integrity violation and terminates the process.
pub fn abort_on_fatal(err: &HookError) -> ! {
    tracing::error!(error = %err, "hookfxr integrity check failed, aborting");
    eprintln!("hookfxr critical: {}", err);
    std::process::abort()
}
