use std::path::{Path, PathBuf};

/// Makes `path` absolute, resolving relative paths against `base_dir`.
///
/// Falls back to the plain join when the platform cannot normalize it.
pub fn make_absolute(path: &Path, base_dir: &Path) -> PathBuf {
    if path.is_absolute() {
        return path.to_path_buf();
    }

    let joined = base_dir.join(path);
    std::path::absolute(&joined).unwrap_or(joined)
}

/// Directory containing the running executable (the launcher), if known.
pub fn launcher_dir() -> Option<PathBuf> {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf))
}
