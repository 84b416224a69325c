//! hookfxr configuration.
//!
//! Settings come from `hookfxr.ini` next to the launcher executable and are
//! then overridden by `--hookfxr-*` flags found on the launcher's command line:
//!
//! ```ini
//! [hookfxr]
//! enable = true
//! target_assembly = Mods\Loader.dll
//! dotnet_root_override =
//! merge_deps_json = true
//! ```
//!
//! Section and key names ignore case, values may be quoted or bare, and
//! backslashes are taken literally so Windows paths need no escaping.
//! Booleans are true only for `true` or `1` (any case).
//!
//! Reads are best-effort; a missing or malformed file yields defaults so the
//! launcher keeps starting the original application.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use fs_err as fs;
use ini::{Ini, ParseOption, Properties};
use thiserror::Error;

use crate::paths::make_absolute;

pub const CONFIG_FILE_NAME: &str = "hookfxr.ini";
pub const CONFIG_SECTION: &str = "hookfxr";

pub const FLAG_ENABLE: &str = "--hookfxr-enable";
pub const FLAG_DISABLE: &str = "--hookfxr-disable";
pub const FLAG_TARGET: &str = "--hookfxr-target";
pub const FLAG_DOTNET_ROOT: &str = "--hookfxr-dotnet-root";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Read(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] ini::ParseError),
}

/// Immutable settings snapshot taken at process attach.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookfxrConfig {
    /// Whether the entry assembly is replaced at all.
    pub enable: bool,
    /// Absolute path of the assembly started instead of the launcher's own.
    pub target_assembly: Option<PathBuf>,
    /// Runtime root used instead of the default search; published as `DOTNET_ROOT`.
    pub dotnet_root_override: Option<PathBuf>,
    /// Whether the original application's deps.json is merged into hostpolicy.
    pub merge_deps_json: bool,
}

impl Default for HookfxrConfig {
    fn default() -> Self {
        Self {
            enable: false,
            target_assembly: None,
            dotnet_root_override: None,
            merge_deps_json: true,
        }
    }
}

fn read_bool(section: Option<&Properties>, key: &str, default: bool) -> bool {
    match section.and_then(|s| s.get(key)) {
        Some(value) => {
            let value = value.trim();
            value.eq_ignore_ascii_case("true") || value == "1"
        }
        None => default,
    }
}

fn read_path(section: Option<&Properties>, key: &str) -> Option<PathBuf> {
    let value = section.and_then(|s| s.get(key))?.trim();
    if value.is_empty() {
        None
    } else {
        Some(PathBuf::from(value))
    }
}

impl HookfxrConfig {
    /// Loads the snapshot for a launcher living in `launcher_dir`.
    ///
    /// `args` is the full launcher command line including the program name.
    pub fn load<I>(launcher_dir: &Path, args: I) -> Self
    where
        I: IntoIterator<Item = OsString>,
    {
        let path = launcher_dir.join(CONFIG_FILE_NAME);

        let mut config = if path.exists() {
            match Self::from_file(&path, launcher_dir) {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "Ignoring unusable config file, using defaults"
                    );
                    Self::default()
                }
            }
        } else {
            tracing::info!(
                dir = %launcher_dir.display(),
                "{} not found, using default configuration",
                CONFIG_FILE_NAME
            );
            Self::default()
        };

        config.apply_args(args, launcher_dir);
        config
    }

    /// Reads the `[hookfxr]` section of a config file.
    pub fn from_file(path: &Path, launcher_dir: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Ok(Self::from_ini_str(&content, launcher_dir)?)
    }

    /// Parses config file contents; relative targets resolve against
    /// `launcher_dir`.
    pub fn from_ini_str(content: &str, launcher_dir: &Path) -> Result<Self, ini::ParseError> {
        let options = ParseOption {
            enabled_escape: false,
            ..ParseOption::default()
        };
        let file = Ini::load_from_str_opt(content, options)?;
        let section = file.section(Some(CONFIG_SECTION));

        Ok(Self {
            enable: read_bool(section, "enable", false),
            target_assembly: read_path(section, "target_assembly")
                .map(|target| make_absolute(&target, launcher_dir)),
            dotnet_root_override: read_path(section, "dotnet_root_override"),
            merge_deps_json: read_bool(section, "merge_deps_json", true),
        })
    }

    /// Applies `--hookfxr-*` flags. The first item is the program name and
    /// every argument hookfxr does not know is left for the launcher.
    pub fn apply_args<I>(&mut self, args: I, launcher_dir: &Path)
    where
        I: IntoIterator<Item = OsString>,
    {
        let mut args = args.into_iter().skip(1);

        while let Some(arg) = args.next() {
            let Some(flag) = arg.to_str() else {
                continue;
            };

            match flag {
                FLAG_ENABLE => self.enable = true,
                FLAG_DISABLE => self.enable = false,
                FLAG_TARGET => {
                    if let Some(value) = args.next() {
                        self.target_assembly =
                            Some(make_absolute(Path::new(&value), launcher_dir));
                    }
                }
                FLAG_DOTNET_ROOT => {
                    if let Some(value) = args.next() {
                        self.dotnet_root_override = Some(PathBuf::from(value));
                    }
                }
                _ => {}
            }
        }
    }
}
