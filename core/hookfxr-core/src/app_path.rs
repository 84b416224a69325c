//! Entry assembly substitution.
//!
//! Every proxy call records the launcher's real application path before the
//! override is applied. The hostpolicy hook runs later without access to the
//! call arguments, and the deps.json it injects must belong to the real
//! application rather than to the substituted assembly.

use std::path::{Path, PathBuf};
use std::sync::RwLock;

use crate::config::HookfxrConfig;

pub struct AppPathOverride {
    enabled: bool,
    target: Option<PathBuf>,
    original: RwLock<Option<PathBuf>>,
}

impl AppPathOverride {
    pub fn new(enabled: bool, target: Option<PathBuf>) -> Self {
        Self {
            enabled,
            target,
            original: RwLock::new(None),
        }
    }

    pub fn from_config(config: &HookfxrConfig) -> Self {
        Self::new(config.enable, config.target_assembly.clone())
    }

    /// Records `app_path` as the original and returns the path to forward.
    pub fn apply(&self, app_path: &Path) -> PathBuf {
        self.record(app_path);

        match self.active_target() {
            Some(target) => {
                tracing::info!(
                    original = %app_path.display(),
                    target = %target.display(),
                    "Replacing entry assembly"
                );
                target.to_path_buf()
            }
            None => app_path.to_path_buf(),
        }
    }

    /// Most recent unmodified application path seen by a proxy call.
    pub fn original(&self) -> Option<PathBuf> {
        self.original
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    fn record(&self, app_path: &Path) {
        let mut original = self.original.write().unwrap_or_else(|e| e.into_inner());
        *original = if app_path.as_os_str().is_empty() {
            None
        } else {
            Some(app_path.to_path_buf())
        };
    }

    fn active_target(&self) -> Option<&Path> {
        if !self.enabled {
            return None;
        }
        self.target
            .as_deref()
            .filter(|target| !target.as_os_str().is_empty())
    }
}
