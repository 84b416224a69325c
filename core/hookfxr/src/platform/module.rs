use std::ffi::{c_void, CString};
use std::path::Path;
use std::ptr::NonNull;

use hookfxr_core::hook::LOADER_HOOK;
use hookfxr_core::pal::PalString;
use hookfxr_core::{ModuleLoader, ResolveError, SymbolNotFound, SymbolResolver};
use windows::core::{PCSTR, PCWSTR};
use windows::Win32::Foundation::HMODULE;
use windows::Win32::System::LibraryLoader::{
    GetModuleHandleExW, GetModuleHandleW, GetProcAddress, LoadLibraryW,
    GET_MODULE_HANDLE_EX_FLAG_FROM_ADDRESS, GET_MODULE_HANDLE_EX_FLAG_UNCHANGED_REFCOUNT,
};

const KERNEL32: &str = "kernel32.dll";

/// A loaded module. Never freed; hostfxr and hostpolicy live as long as the
/// process.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WinModule(HMODULE);

// HMODULE is a base address, valid on any thread while the module stays loaded.
unsafe impl Send for WinModule {}
unsafe impl Sync for WinModule {}

impl WinModule {
    pub fn from_raw(module: *mut c_void) -> Self {
        Self(HMODULE(module))
    }

    /// An already loaded module, by name.
    pub fn loaded(name: &str) -> Result<Self, ResolveError> {
        let wide = PalString::new(name);
        unsafe { GetModuleHandleW(PCWSTR(wide.as_ptr())) }
            .map(Self)
            .map_err(|e| ResolveError::Load {
                path: name.into(),
                reason: e.to_string(),
            })
    }

    /// The module containing this code, i.e. the proxy DLL.
    pub fn current() -> Option<Self> {
        let mut module = HMODULE::default();
        let address = Self::current as *const () as *const u16;
        unsafe {
            GetModuleHandleExW(
                GET_MODULE_HANDLE_EX_FLAG_FROM_ADDRESS | GET_MODULE_HANDLE_EX_FLAG_UNCHANGED_REFCOUNT,
                PCWSTR(address),
                &mut module,
            )
        }
        .ok()?;
        Some(Self(module))
    }
}

impl SymbolResolver for WinModule {
    fn symbol(&self, name: &str) -> Result<NonNull<c_void>, SymbolNotFound> {
        let not_found = || SymbolNotFound(name.to_string());
        let c_name = CString::new(name).map_err(|_| not_found())?;

        let proc = unsafe { GetProcAddress(self.0, PCSTR(c_name.as_ptr().cast())) }
            .ok_or_else(not_found)?;
        NonNull::new(proc as *mut c_void).ok_or_else(not_found)
    }
}

/// `LoadLibraryW` loader that refuses to hand back the proxy's own module.
#[derive(Debug, Clone, Copy)]
pub struct WinModuleLoader {
    own: Option<WinModule>,
}

impl WinModuleLoader {
    pub fn new() -> Self {
        let own = WinModule::current();
        if own.is_none() {
            tracing::warn!("Could not determine the proxy's own module handle");
        }
        Self { own }
    }
}

impl Default for WinModuleLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ModuleLoader for WinModuleLoader {
    type Module = WinModule;

    fn is_self(&self, module: &WinModule) -> bool {
        self.own.as_ref() == Some(module)
    }

    fn load(&self, path: &Path) -> Result<WinModule, ResolveError> {
        let wide = PalString::from_path(path);
        unsafe { LoadLibraryW(PCWSTR(wide.as_ptr())) }
            .map(WinModule)
            .map_err(|e| ResolveError::Load {
                path: path.to_path_buf(),
                reason: e.to_string(),
            })
    }
}

/// Address of kernel32's `LoadLibraryExW`, the function the loader hook patches.
pub fn loader_function() -> Result<NonNull<c_void>, SymbolNotFound> {
    let kernel32 =
        WinModule::loaded(KERNEL32).map_err(|_| SymbolNotFound(format!("{KERNEL32}!{LOADER_HOOK}")))?;
    kernel32.symbol(LOADER_HOOK)
}
