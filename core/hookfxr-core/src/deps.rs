//! Companion dependency manifest lookup.
//!
//! An application `Game.exe` ships its dependency closure in
//! `Game.deps.json` right next to it. hookfxr hands that manifest to
//! hostpolicy as an additional deps file so the substituted entry assembly
//! still sees the original application's dependencies.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

pub const DEPS_SUFFIX: &str = ".deps.json";

/// Maps an application path to its companion manifest path.
///
/// The extension of the final component is replaced by `.deps.json`; a file
/// name without an extension gets the suffix appended.
pub fn deps_path_of(app_path: &Path) -> PathBuf {
    match app_path.file_stem() {
        Some(stem) => {
            let mut name = stem.to_os_string();
            name.push(DEPS_SUFFIX);
            app_path.with_file_name(name)
        }
        None => {
            let mut whole = OsString::from(app_path.as_os_str());
            whole.push(DEPS_SUFFIX);
            PathBuf::from(whole)
        }
    }
}

/// Returns the companion manifest path only if a file exists there.
pub fn companion_manifest(app_path: &Path) -> Option<PathBuf> {
    let deps = deps_path_of(app_path);
    if deps.is_file() {
        Some(deps)
    } else {
        tracing::debug!(deps = %deps.display(), "No companion manifest");
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fs_err as fs;
    use tempfile::tempdir;

    #[test]
    fn test_extension_is_replaced() {
        assert_eq!(
            deps_path_of(Path::new(r"C:\Game\Game.exe")),
            PathBuf::from(r"C:\Game\Game.deps.json")
        );
        assert_eq!(
            deps_path_of(Path::new("/opt/game/Game.dll")),
            PathBuf::from("/opt/game/Game.deps.json")
        );
    }

    #[test]
    fn test_missing_extension_gets_suffix() {
        assert_eq!(deps_path_of(Path::new("noext")), PathBuf::from("noext.deps.json"));
        assert_eq!(
            deps_path_of(Path::new("/opt/game/launcher")),
            PathBuf::from("/opt/game/launcher.deps.json")
        );
    }

    #[test]
    fn test_only_final_extension_is_replaced() {
        assert_eq!(
            deps_path_of(Path::new("/opt/My.Game.App.dll")),
            PathBuf::from("/opt/My.Game.App.deps.json")
        );
    }

    #[test]
    fn test_dotted_directory_is_not_an_extension() {
        assert_eq!(
            deps_path_of(Path::new("/opt/game.v2/launcher")),
            PathBuf::from("/opt/game.v2/launcher.deps.json")
        );
    }

    #[test]
    fn test_is_deterministic() {
        let path = Path::new(r"C:\Game\Game.exe");
        assert_eq!(deps_path_of(path), deps_path_of(path));
    }

    #[test]
    fn test_companion_manifest_requires_file() {
        let temp = tempdir().unwrap();
        let app = temp.path().join("Game.exe");

        assert!(companion_manifest(&app).is_none());

        fs::write(temp.path().join("Game.deps.json"), "{}").unwrap();
        assert_eq!(
            companion_manifest(&app),
            Some(temp.path().join("Game.deps.json"))
        );
    }

    #[test]
    fn test_companion_manifest_ignores_directories() {
        let temp = tempdir().unwrap();
        fs::create_dir(temp.path().join("Game.deps.json")).unwrap();

        assert!(companion_manifest(&temp.path().join("Game.exe")).is_none());
    }
}
