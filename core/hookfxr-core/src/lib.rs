//! Platform-independent core of hookfxr.
//!
//! hookfxr is a stand-in `hostfxr` that a .NET apphost loads in place of the
//! real one. It can start a different entry assembly than the launcher asked
//! for, and it merges the original application's `deps.json` into
//! hostpolicy's dependency resolution.
//!
//! Everything that touches the OS (module loading, symbol lookup, code
//! patching, registry and SDK lookups) sits behind a trait implemented by the
//! `hookfxr` cdylib; this crate holds the decisions.

pub mod app_path;
pub mod config;
pub mod context;
pub mod deps;
pub mod hook;
pub mod pal;
pub mod paths;
pub mod proxy;
pub mod resolver;

pub use app_path::AppPathOverride;
pub use config::{ConfigError, HookfxrConfig};
pub use context::Hookfxr;
pub use deps::{companion_manifest, deps_path_of};
pub use hook::{abort_on_fatal, HookChain, HookError, HookState, InterceptError, Interceptor};
pub use proxy::{ForwardTarget, ProxyExport, FRAMEWORK_MISSING_FAILURE, GENERIC_FAILURE};
pub use resolver::{
    ModuleLoader, ResolveError, ResolverCandidate, ResolverHandle, ResolverLocator, ResolverSource,
    SharedHostInstall, SymbolNotFound, SymbolResolver,
};
