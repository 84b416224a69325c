//! Forwarding logic behind the exported hostfxr entry points.
//!
//! The platform layer owns the raw `extern "C"` signatures; this module
//! decides what gets forwarded and hands the final call back as a closure.

use std::ffi::c_void;
use std::path::Path;
use std::ptr::NonNull;

use crate::app_path::AppPathOverride;
use crate::resolver::{ModuleLoader, ResolverLocator, SymbolResolver};

/// `FrameworkMissingFailure` from the host's `error_codes.h`; makes the
/// launcher show its own "install .NET" prompt.
pub const FRAMEWORK_MISSING_FAILURE: i32 = 0x8000_8096_u32 as i32;

/// Returned when the genuine hostfxr lacks the export or the entry point is
/// not supported.
pub const GENERIC_FAILURE: i32 = -1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProxyExport {
    Main,
    MainStartupInfo,
    MainBundleStartupInfo,
}

impl ProxyExport {
    pub fn name(self) -> &'static str {
        match self {
            ProxyExport::Main => "hostfxr_main",
            ProxyExport::MainStartupInfo => "hostfxr_main_startupinfo",
            ProxyExport::MainBundleStartupInfo => "hostfxr_main_bundle_startupinfo",
        }
    }
}

/// What the exported function forwards to the genuine hostfxr.
#[derive(Debug)]
pub struct ForwardTarget<'a> {
    pub entry: NonNull<c_void>,
    pub dotnet_root: &'a Path,
    pub app_path: &'a Path,
}

pub struct ProxyFacade<'a, L: ModuleLoader> {
    app_path: &'a AppPathOverride,
    locator: &'a ResolverLocator<L>,
}

impl<'a, L: ModuleLoader> ProxyFacade<'a, L> {
    pub fn new(app_path: &'a AppPathOverride, locator: &'a ResolverLocator<L>) -> Self {
        Self { app_path, locator }
    }

    /// `hostfxr_main` carries no app path to rewrite and no launcher is
    /// known to call it, so it is refused. A missing runtime still reports
    /// [`FRAMEWORK_MISSING_FAILURE`] so the launcher shows its install prompt.
    pub fn main(&self) -> i32 {
        if let Err(e) = self.locator.resolve(Path::new("")) {
            tracing::error!(export = ProxyExport::Main.name(), error = %e, "Reporting missing framework");
            return FRAMEWORK_MISSING_FAILURE;
        }

        tracing::warn!(
            export = ProxyExport::Main.name(),
            "Unsupported entry point called"
        );
        GENERIC_FAILURE
    }

    /// Rewrites the app path, resolves hostfxr and calls `call` with the
    /// genuine export. The caller's `dotnet_root` is never forwarded.
    pub fn forward<F>(&self, export: ProxyExport, app_path: &Path, call: F) -> i32
    where
        F: FnOnce(ForwardTarget<'_>) -> i32,
    {
        let effective = self.app_path.apply(app_path);

        let handle = match self.locator.resolve(&effective) {
            Ok(handle) => handle,
            Err(e) => {
                tracing::error!(export = export.name(), error = %e, "Reporting missing framework");
                return FRAMEWORK_MISSING_FAILURE;
            }
        };

        let entry = match handle.module.symbol(export.name()) {
            Ok(entry) => entry,
            Err(e) => {
                tracing::error!(error = %e, "Genuine hostfxr lacks entry point");
                return GENERIC_FAILURE;
            }
        };

        tracing::debug!(
            export = export.name(),
            app = %effective.display(),
            dotnet_root = %handle.dotnet_root.display(),
            "Forwarding to genuine hostfxr"
        );

        let status = call(ForwardTarget {
            entry,
            dotnet_root: &handle.dotnet_root,
            app_path: &effective,
        });

        tracing::info!(export = export.name(), status, "Genuine hostfxr returned");
        status
    }
}
