//! Backup manager
//!
//! Snapshots a single target file before a provider rewrites it, and puts
//! it back when generation fails or the user asks for it.
//!
//! Layout under the backup root:
//!
//! ```text
//! <root>/<provider>/<basename>.<YYYYMMDD-HHMMSS-mmm>.backup
//! <root>/<provider>/<basename>.<YYYYMMDD-HHMMSS-mmm>.backup.json
//! ```
//!
//! The `.json` sidecar carries [`BackupMetadata`]; listing, restoring and
//! pruning are driven entirely by sidecars.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// The only restore method this tool writes: copy the snapshot back over
/// the original path.
pub const RESTORE_COPY: &str = "copy";

const BACKUP_EXTENSION: &str = "backup";
const SIDECAR_SUFFIX: &str = ".json";

/// Sidecar metadata describing one backup
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackupMetadata {
    pub provider: String,
    pub original_path: PathBuf,
    pub backup_path: PathBuf,
    pub timestamp: DateTime<Utc>,
    pub restore_method: String,
}

/// Creates, lists, restores and prunes backups below one root directory
#[derive(Debug, Clone)]
pub struct BackupManager {
    root: PathBuf,
}

impl BackupManager {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Backup root directory
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding one provider's backups
    pub fn provider_dir(&self, provider: &str) -> PathBuf {
        self.root.join(provider)
    }

    /// Snapshot `path` for `provider`.
    ///
    /// Fails if the source file does not exist. Returns the backup path and
    /// the metadata written to its sidecar.
    pub fn backup(&self, provider: &str, path: &Path) -> Result<(PathBuf, BackupMetadata)> {
        if !path.is_file() {
            return Err(Error::Backup {
                path: path.display().to_string(),
                message: "source file does not exist".to_string(),
            });
        }

        let basename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .ok_or_else(|| Error::Backup {
                path: path.display().to_string(),
                message: "source path has no file name".to_string(),
            })?;

        let dir = self.provider_dir(provider);
        fs::create_dir_all(&dir).map_err(|e| Error::Backup {
            path: dir.display().to_string(),
            message: format!("failed to create backup directory: {}", e),
        })?;

        let now = Utc::now();
        let stamp = format!(
            "{}-{:03}",
            now.format("%Y%m%d-%H%M%S"),
            now.timestamp_subsec_millis()
        );
        let backup_path = unique_backup_path(&dir, &basename, &stamp);

        fs::copy(path, &backup_path).map_err(|e| Error::Backup {
            path: path.display().to_string(),
            message: format!("failed to copy to {}: {}", backup_path.display(), e),
        })?;

        let metadata = BackupMetadata {
            provider: provider.to_string(),
            original_path: path.to_path_buf(),
            backup_path: backup_path.clone(),
            timestamp: now,
            restore_method: RESTORE_COPY.to_string(),
        };

        let json = serde_json::to_string_pretty(&metadata)?;
        if let Err(e) = fs::write(sidecar_path(&backup_path), json) {
            // A backup without a sidecar can be neither listed nor restored.
            let _ = fs::remove_file(&backup_path);
            return Err(Error::Backup {
                path: backup_path.display().to_string(),
                message: format!("failed to write metadata: {}", e),
            });
        }

        debug!(
            "Backed up {} to {}",
            path.display(),
            backup_path.display()
        );
        Ok((backup_path, metadata))
    }

    /// Copy a backup back over the path it was taken from.
    pub fn restore(&self, backup_path: &Path) -> Result<BackupMetadata> {
        let metadata = read_sidecar(&sidecar_path(backup_path))?;

        if !backup_path.is_file() {
            return Err(Error::Backup {
                path: backup_path.display().to_string(),
                message: "backup file is missing".to_string(),
            });
        }

        if metadata.restore_method != RESTORE_COPY {
            return Err(Error::NotImplemented {
                feature: format!("restore method '{}'", metadata.restore_method),
            });
        }

        if let Some(parent) = metadata.original_path.parent() {
            fs::create_dir_all(parent).map_err(|e| Error::Backup {
                path: parent.display().to_string(),
                message: format!("failed to recreate directory: {}", e),
            })?;
        }

        fs::copy(backup_path, &metadata.original_path).map_err(|e| Error::Backup {
            path: backup_path.display().to_string(),
            message: format!(
                "failed to restore to {}: {}",
                metadata.original_path.display(),
                e
            ),
        })?;

        debug!(
            "Restored {} from {}",
            metadata.original_path.display(),
            backup_path.display()
        );
        Ok(metadata)
    }

    /// List one provider's backups, newest first.
    ///
    /// Sidecars that cannot be parsed are skipped with a warning.
    pub fn list(&self, provider: &str) -> Result<Vec<BackupMetadata>> {
        let dir = self.provider_dir(provider);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut backups = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let path = entry?.path();
            let is_sidecar = path
                .file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.ends_with(&format!(".{}{}", BACKUP_EXTENSION, SIDECAR_SUFFIX)));
            if !is_sidecar {
                continue;
            }

            match read_sidecar(&path) {
                Ok(metadata) => backups.push(metadata),
                Err(e) => warn!("Skipping unreadable backup metadata {}: {}", path.display(), e),
            }
        }

        backups.sort_by(|a, b| {
            b.timestamp
                .cmp(&a.timestamp)
                .then_with(|| b.backup_path.cmp(&a.backup_path))
        });
        Ok(backups)
    }

    /// Keep the `keep` newest backups of `provider` and delete the rest.
    ///
    /// Each backup file is removed before its sidecar, so an interrupted
    /// prune never leaves a listed backup without content. Returns the
    /// removed backup paths.
    pub fn clean(&self, provider: &str, keep: usize) -> Result<Vec<PathBuf>> {
        let mut removed = Vec::new();

        for metadata in self.list(provider)?.into_iter().skip(keep) {
            match fs::remove_file(&metadata.backup_path) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(Error::Backup {
                        path: metadata.backup_path.display().to_string(),
                        message: format!("failed to delete backup: {}", e),
                    })
                }
            }
            fs::remove_file(sidecar_path(&metadata.backup_path)).map_err(|e| Error::Backup {
                path: metadata.backup_path.display().to_string(),
                message: format!("failed to delete metadata: {}", e),
            })?;
            removed.push(metadata.backup_path);
        }

        Ok(removed)
    }
}

/// Sidecar location for a backup file
pub fn sidecar_path(backup_path: &Path) -> PathBuf {
    let mut name = backup_path.as_os_str().to_os_string();
    name.push(SIDECAR_SUFFIX);
    PathBuf::from(name)
}

fn read_sidecar(path: &Path) -> Result<BackupMetadata> {
    let content = fs::read_to_string(path).map_err(|e| Error::Backup {
        path: path.display().to_string(),
        message: format!("failed to read metadata: {}", e),
    })?;
    serde_json::from_str(&content).map_err(|e| Error::Backup {
        path: path.display().to_string(),
        message: format!("failed to parse metadata: {}", e),
    })
}

/// Pick `<basename>.<stamp>.backup`, adding `-1`, `-2`, ... to the stamp if
/// a snapshot from the same millisecond already exists.
fn unique_backup_path(dir: &Path, basename: &str, stamp: &str) -> PathBuf {
    let mut candidate = dir.join(format!("{}.{}.{}", basename, stamp, BACKUP_EXTENSION));
    let mut counter = 1;
    while candidate.exists() {
        candidate = dir.join(format!(
            "{}.{}-{}.{}",
            basename, stamp, counter, BACKUP_EXTENSION
        ));
        counter += 1;
    }
    candidate
}
