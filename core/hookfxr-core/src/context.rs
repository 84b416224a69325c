//! The process-wide hookfxr context.
//!
//! One [`Hookfxr`] is built at process attach and every exported entry point
//! and detour works through it. It owns the config snapshot, the app path
//! override, the hostfxr locator and the hook chain.

use std::ffi::c_void;
use std::path::Path;

use crate::app_path::AppPathOverride;
use crate::config::HookfxrConfig;
use crate::hook::hostpolicy::HostInterface;
use crate::hook::{HookChain, HookError, Interceptor};
use crate::proxy::{ForwardTarget, ProxyExport, ProxyFacade};
use crate::resolver::{ModuleLoader, ResolverLocator, ResolverSource};

/// Environment variable the SDK locator consults for the runtime root.
pub const DOTNET_ROOT_ENV: &str = "DOTNET_ROOT";

pub struct Hookfxr<L: ModuleLoader, I: Interceptor> {
    config: HookfxrConfig,
    app_path: AppPathOverride,
    locator: ResolverLocator<L>,
    hooks: HookChain<I>,
}

impl<L: ModuleLoader, I: Interceptor> Hookfxr<L, I> {
    /// Builds the context and publishes the runtime root override, if any,
    /// before anything can resolve hostfxr.
    pub fn new(
        config: HookfxrConfig,
        loader: L,
        sources: Vec<Box<dyn ResolverSource>>,
        interceptor: I,
    ) -> Self {
        if let Some(root) = &config.dotnet_root_override {
            tracing::info!(dotnet_root = %root.display(), "Publishing {}", DOTNET_ROOT_ENV);
            std::env::set_var(DOTNET_ROOT_ENV, root);
        }

        tracing::debug!(?config, "hookfxr configured");

        Self {
            app_path: AppPathOverride::from_config(&config),
            locator: ResolverLocator::new(loader, sources, config.dotnet_root_override.clone()),
            hooks: HookChain::new(interceptor),
            config,
        }
    }

    pub fn config(&self) -> &HookfxrConfig {
        &self.config
    }

    pub fn app_path(&self) -> &AppPathOverride {
        &self.app_path
    }

    pub fn locator(&self) -> &ResolverLocator<L> {
        &self.locator
    }

    pub fn hooks(&self) -> &HookChain<I> {
        &self.hooks
    }

    pub fn proxy(&self) -> ProxyFacade<'_, L> {
        ProxyFacade::new(&self.app_path, &self.locator)
    }

    /// Arms the loader hook when deps merging is enabled.
    ///
    /// Returns whether the hook was armed.
    ///
    /// # Safety
    ///
    /// See [`HookChain::arm`].
    pub unsafe fn arm_hooks(
        &self,
        loader_fn: *const c_void,
        loader_detour: *const c_void,
    ) -> Result<bool, HookError> {
        if !self.config.merge_deps_json {
            tracing::info!("deps.json merging disabled, loader stays untouched");
            return Ok(false);
        }

        self.hooks.arm(loader_fn, loader_detour)?;
        Ok(true)
    }

    /// Forwards a `hostfxr_main_*startupinfo` call; see [`ProxyFacade::forward`].
    pub fn forward<F>(&self, export: ProxyExport, app_path: &Path, call: F) -> i32
    where
        F: FnOnce(ForwardTarget<'_>) -> i32,
    {
        self.proxy().forward(export, app_path, call)
    }

    /// Merges the recorded original application's deps.json into `init`.
    ///
    /// # Safety
    ///
    /// See [`HookChain::inject_deps`].
    pub unsafe fn inject_deps(&self, init: *mut HostInterface) -> Result<(), HookError> {
        let original = self.app_path.original();
        self.hooks.inject_deps(original.as_deref(), init)?;
        Ok(())
    }
}
