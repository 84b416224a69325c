use std::ffi::OsString;
use std::os::windows::ffi::OsStringExt;
use std::path::{Path, PathBuf};

use hookfxr_core::pal::PalString;
use hookfxr_core::{ResolverCandidate, ResolverSource, SharedHostInstall};
use netcorehost::nethost;
use netcorehost::pdcstring::PdCString;
use windows::core::PCWSTR;
use windows::Win32::System::Registry::{RegGetValueW, HKEY_LOCAL_MACHINE, RRF_RT_REG_SZ};

#[cfg(target_arch = "x86_64")]
const INSTALL_ARCH: &str = "x64";

#[cfg(target_arch = "x86")]
const INSTALL_ARCH: &str = "x86";

#[cfg(target_arch = "aarch64")]
const INSTALL_ARCH: &str = "arm64";

/// The SDK's own locator (`nethost`): honors `DOTNET_ROOT`, app-local
/// installs and the global install location.
#[derive(Debug, Default, Clone, Copy)]
pub struct NethostSource;

impl ResolverSource for NethostSource {
    fn name(&self) -> &'static str {
        "nethost"
    }

    fn find(&self, app_path: &Path, dotnet_root: Option<&Path>) -> Option<ResolverCandidate> {
        let found = match dotnet_root {
            Some(root) => {
                let root = PdCString::from_os_str(root.as_os_str()).ok()?;
                nethost::get_hostfxr_path_with_dotnet_root(root)
            }
            None if !app_path.as_os_str().is_empty() => {
                let assembly = PdCString::from_os_str(app_path.as_os_str()).ok()?;
                nethost::get_hostfxr_path_with_assembly_path(assembly)
            }
            None => nethost::get_hostfxr_path(),
        };

        let candidate = match found {
            Ok(path) => ResolverCandidate::from_hostfxr_path(
                PathBuf::from(path.to_os_string()),
                dotnet_root,
            ),
            Err(e) => {
                tracing::debug!(error = %e, "nethost could not locate hostfxr");
                None
            }
        };

        // The app-local lookup finds this proxy; retry against the
        // environment and global install only.
        if candidate.is_none() && dotnet_root.is_none() && !app_path.as_os_str().is_empty() {
            return Self.find(Path::new(""), None);
        }
        candidate
    }
}

/// The shared host registered by the runtime installer under
/// `HKLM\SOFTWARE\dotnet\Setup\InstalledVersions\<arch>\sharedhost`.
#[derive(Debug, Default, Clone, Copy)]
pub struct RegistrySource;

impl RegistrySource {
    pub fn shared_host() -> Option<SharedHostInstall> {
        let key = PalString::new(format!(
            r"SOFTWARE\dotnet\Setup\InstalledVersions\{INSTALL_ARCH}\sharedhost"
        ));

        let root = read_string(&key, "Path")?;
        let version = read_string(&key, "Version")?;

        Some(SharedHostInstall {
            root: PathBuf::from(root),
            version: version.to_string_lossy().into_owned(),
        })
    }
}

impl ResolverSource for RegistrySource {
    fn name(&self) -> &'static str {
        "registry"
    }

    fn find(&self, _app_path: &Path, dotnet_root: Option<&Path>) -> Option<ResolverCandidate> {
        let install = Self::shared_host()?;
        match dotnet_root {
            Some(root) => ResolverCandidate::from_hostfxr_path(install.hostfxr_path(), Some(root)),
            None => Some(install.into_candidate()),
        }
    }
}

fn read_string(key: &PalString, value: &str) -> Option<OsString> {
    let value = PalString::new(value);
    let mut size = 0u32;

    unsafe {
        RegGetValueW(
            HKEY_LOCAL_MACHINE,
            PCWSTR(key.as_ptr()),
            PCWSTR(value.as_ptr()),
            RRF_RT_REG_SZ,
            None,
            None,
            Some(&mut size as *mut u32),
        )
    }
    .ok()
    .ok()?;

    let mut buffer = vec![0u16; (size as usize).div_ceil(2)];
    unsafe {
        RegGetValueW(
            HKEY_LOCAL_MACHINE,
            PCWSTR(key.as_ptr()),
            PCWSTR(value.as_ptr()),
            RRF_RT_REG_SZ,
            None,
            Some(buffer.as_mut_ptr().cast()),
            Some(&mut size as *mut u32),
        )
    }
    .ok()
    .ok()?;

    let len = buffer.iter().position(|&unit| unit == 0).unwrap_or(buffer.len());
    Some(OsString::from_wide(&buffer[..len]))
}
