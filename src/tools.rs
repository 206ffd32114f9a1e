//! Lookup of external executables on `PATH`

use std::env;
use std::path::{Path, PathBuf};

fn is_executable(path: &Path) -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        path.metadata()
            .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
            .unwrap_or(false)
    }
    #[cfg(not(unix))]
    {
        path.is_file()
    }
}

/// Locate `tool` in the directories of `search_path`.
///
/// A tool given with a path separator is checked as-is.
pub fn find_in(tool: &str, search_path: &std::ffi::OsStr) -> Option<PathBuf> {
    if tool.contains(std::path::MAIN_SEPARATOR) {
        let candidate = PathBuf::from(tool);
        return is_executable(&candidate).then_some(candidate);
    }
    env::split_paths(search_path)
        .map(|dir| dir.join(tool))
        .find(|candidate| is_executable(candidate))
}

/// Locate `tool` on the process `PATH`.
pub fn find_executable(tool: &str) -> Option<PathBuf> {
    let search_path = env::var_os("PATH")?;
    find_in(tool, &search_path)
}

/// Whether `tool` can be run from `PATH`.
pub fn is_available(tool: &str) -> bool {
    find_executable(tool).is_some()
}
