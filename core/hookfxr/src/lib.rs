//! hookfxr: a drop-in `hostfxr` for .NET apphost launchers.
//!
//! Placed next to a launcher as `hostfxr.dll`, it is loaded instead of the
//! runtime's hostfxr. On process attach it reads `hookfxr.ini`, sets up
//! logging and arms the loader hook; the exported `hostfxr_main_*` entry
//! points then forward to the genuine hostfxr with the configured entry
//! assembly.

pub mod logging;

#[cfg(windows)]
mod detours;
#[cfg(windows)]
mod exports;
#[cfg(windows)]
mod platform;

#[cfg(windows)]
pub use windows_attach::DllMain;

#[cfg(windows)]
mod windows_attach {
    use std::ffi::c_void;
    use std::path::PathBuf;
    use std::sync::OnceLock;

    use hookfxr_core::paths::launcher_dir;
    use hookfxr_core::{abort_on_fatal, HookError, HookState, Hookfxr, HookfxrConfig};

    use crate::detours;
    use crate::logging;
    use crate::platform::{self, RetourInterceptor, WinModuleLoader};

    const DLL_PROCESS_ATTACH: u32 = 1;

    pub(crate) type Context = Hookfxr<WinModuleLoader, RetourInterceptor>;

    static CONTEXT: OnceLock<Context> = OnceLock::new();

    /// The context built at process attach.
    pub(crate) fn context() -> &'static Context {
        match CONTEXT.get() {
            Some(ctx) => ctx,
            None => abort_on_fatal(&HookError::InvalidState(HookState::Uninstalled)),
        }
    }

    #[no_mangle]
    #[allow(non_snake_case)]
    pub unsafe extern "system" fn DllMain(
        _module: *mut c_void,
        reason: u32,
        _reserved: *mut c_void,
    ) -> i32 {
        if reason == DLL_PROCESS_ATTACH {
            attach();
        }
        1
    }

    fn attach() {
        let dir = launcher_dir().unwrap_or_else(|| PathBuf::from("."));
        logging::init(&dir);

        tracing::info!(
            version = env!("CARGO_PKG_VERSION"),
            launcher_dir = %dir.display(),
            "hookfxr attached"
        );

        let ctx = CONTEXT.get_or_init(|| {
            let config = HookfxrConfig::load(&dir, std::env::args_os());
            Hookfxr::new(
                config,
                WinModuleLoader::new(),
                platform::resolver_sources(),
                RetourInterceptor,
            )
        });

        let loader = match platform::loader_function() {
            Ok(loader) => loader,
            Err(e) => abort_on_fatal(&HookError::from(e)),
        };

        let armed = unsafe {
            ctx.arm_hooks(
                loader.as_ptr(),
                detours::load_library_ex_w as *const c_void,
            )
        };
        if let Err(e) = armed {
            abort_on_fatal(&e);
        }
    }
}

#[cfg(windows)]
pub(crate) use windows_attach::context;
