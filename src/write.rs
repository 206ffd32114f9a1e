//! Writing target files to disk
//!
//! Every provider finishes by handing its merged content to this module.
//!
//! ## Process
//!
//! 1.  **Create Directories**: Creates the parent directory of the target
//!     recursively if it is missing.
//!
//! 2.  **Write Content**: Writes the content to a temporary file in the same
//!     directory, so a crash never leaves a half-written config behind.
//!
//! 3.  **Set Permissions**: On Unix-like systems the temporary file is set to
//!     the requested mode (owner read/write for every target this tool
//!     writes) before it is moved over the target.
//!
//! 4.  **Persist**: Renames the temporary file over the target.
//!
//! A target that is a symlink (a config kept in a dotfiles repository, for
//! instance) is resolved first, and the file it points at is replaced; the
//! link itself stays in place.

use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// Owner read/write only. SSH ignores some directives in config files that
/// are readable by group or others.
pub const PRIVATE_MODE: u32 = 0o600;

/// Read a target file, treating a missing file as empty content.
pub fn read_existing(path: &Path) -> Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(content) => Ok(Some(content)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(Error::Filesystem {
            message: format!("Failed to read '{}': {}", path.display(), e),
        }),
    }
}

/// Links followed before giving up on a symlinked target.
const MAX_LINK_HOPS: usize = 40;

/// The file a write to `path` should replace: `path` itself, or the end of
/// its symlink chain. A dangling link resolves to the missing file it names.
pub fn resolve_target(path: &Path) -> Result<PathBuf> {
    let mut current = path.to_path_buf();
    for _ in 0..MAX_LINK_HOPS {
        let is_link = fs::symlink_metadata(&current)
            .map(|meta| meta.file_type().is_symlink())
            .unwrap_or(false);
        if !is_link {
            return Ok(current);
        }

        let link = fs::read_link(&current).map_err(|e| Error::Filesystem {
            message: format!("Failed to read link '{}': {}", current.display(), e),
        })?;
        current = match current.parent() {
            Some(parent) => parent.join(link),
            None => link,
        };
    }
    Err(Error::Filesystem {
        message: format!("Too many levels of symbolic links at '{}'", path.display()),
    })
}

/// Atomically write `content` to `path` with the given Unix mode.
pub fn write_file(path: &Path, content: &str, mode: u32) -> Result<()> {
    let resolved = resolve_target(path)?;
    let path = resolved.as_path();
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    fs::create_dir_all(parent).map_err(|e| Error::Filesystem {
        message: format!("Failed to create directory '{}': {}", parent.display(), e),
    })?;

    let mut staged = tempfile::NamedTempFile::new_in(parent).map_err(|e| Error::Filesystem {
        message: format!(
            "Failed to create temporary file in '{}': {}",
            parent.display(),
            e
        ),
    })?;

    staged
        .write_all(content.as_bytes())
        .map_err(|e| Error::Filesystem {
            message: format!("Failed to write file '{}': {}", path.display(), e),
        })?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(staged.path(), fs::Permissions::from_mode(mode)).map_err(|e| {
            Error::Filesystem {
                message: format!("Failed to set permissions on '{}': {}", path.display(), e),
            }
        })?;
    }
    #[cfg(not(unix))]
    let _ = mode;

    staged.persist(path).map_err(|e| Error::Filesystem {
        message: format!("Failed to replace '{}': {}", path.display(), e.error),
    })?;

    Ok(())
}

/// Write a target file readable only by its owner.
pub fn write_private(path: &Path, content: &str) -> Result<()> {
    write_file(path, content, PRIVATE_MODE)
}
