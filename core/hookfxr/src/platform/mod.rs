//! Windows implementations of the core capability traits.

mod detour;
mod module;
mod sources;

pub use detour::{DetourHandle, RetourInterceptor};
pub use module::{loader_function, WinModule, WinModuleLoader};
pub use sources::{NethostSource, RegistrySource};

use hookfxr_core::ResolverSource;

/// Search order for the genuine hostfxr: the SDK locator, then the
/// installed-runtime registration.
pub fn resolver_sources() -> Vec<Box<dyn ResolverSource>> {
    vec![Box::new(NethostSource), Box::new(RegistrySource)]
}
