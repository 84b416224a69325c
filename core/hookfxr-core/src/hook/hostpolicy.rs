//! The slice of hostpolicy's ABI touched by the export hook.
//!
//! `host_interface_t` is append-only upstream; the layout version only changes
//! when a compatible reading of the prefix is no longer possible.

use crate::pal::PalChar;

#[cfg(windows)]
pub const HOSTPOLICY_LIBRARY_NAME: &str = "hostpolicy.dll";

#[cfg(target_os = "macos")]
pub const HOSTPOLICY_LIBRARY_NAME: &str = "libhostpolicy.dylib";

#[cfg(not(any(windows, target_os = "macos")))]
pub const HOSTPOLICY_LIBRARY_NAME: &str = "libhostpolicy.so";

/// Export hostfxr calls to hand the resolved settings to hostpolicy.
pub const COREHOST_LOAD_EXPORT: &str = "corehost_load";

/// `HOST_INTERFACE_LAYOUT_VERSION_HI` from hostpolicy's `host_interface.h`.
pub const HOST_INTERFACE_LAYOUT_VERSION_HI: usize = 0x1604_1101;

/// `int corehost_load(const host_interface_t* init)`
pub type CorehostLoadFn = unsafe extern "C" fn(init: *const HostInterface) -> i32;

#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct StrArr {
    pub len: usize,
    pub arr: *const *const PalChar,
}

/// Prefix of `host_interface_t` up to `additional_deps_serialized`.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct HostInterface {
    pub version_lo: usize,
    pub version_hi: usize,
    pub config_keys: StrArr,
    pub config_values: StrArr,
    pub fx_dir: *const PalChar,
    pub fx_name: *const PalChar,
    pub deps_file: *const PalChar,
    pub is_framework_dependent: usize,
    pub search_paths: StrArr,
    pub patch_roll_forward: usize,
    pub prerelease_roll_forward: usize,
    pub host_mode: usize,
    pub tfm: *const PalChar,
    pub additional_deps_serialized: *const PalChar,
}

#[cfg(test)]
impl HostInterface {
    pub(crate) fn empty(version_hi: usize) -> Self {
        let none = StrArr {
            len: 0,
            arr: std::ptr::null(),
        };
        Self {
            version_lo: std::mem::size_of::<Self>(),
            version_hi,
            config_keys: none,
            config_values: none,
            fx_dir: std::ptr::null(),
            fx_name: std::ptr::null(),
            deps_file: std::ptr::null(),
            is_framework_dependent: 0,
            search_paths: none,
            patch_roll_forward: 0,
            prerelease_roll_forward: 0,
            host_mode: 0,
            tfm: std::ptr::null(),
            additional_deps_serialized: std::ptr::null(),
        }
    }
}
