//! # Provider Abstraction
//!
//! A provider owns one target file. It validates its own configuration,
//! turns its inventory into records, merges them into the file through the
//! matching engine in [`crate::merge`], and writes the result.
//!
//! Providers are used as `Arc<dyn Provider>` trait objects by the
//! [`Registry`](crate::registry::Registry) and the
//! [`Engine`](crate::engine::Engine). Run flags arrive as an immutable
//! [`RunOptions`] value on every call.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use log::{log, Level};
use serde::Serialize;

use crate::backup::{BackupManager, BackupMetadata};
use crate::error::{Error, Result};
use crate::merge::MergeStats;
use crate::write;

/// Flags for one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Compute everything but write nothing.
    pub dry_run: bool,
    /// Write target files even when their content is unchanged.
    pub force: bool,
    /// Do not snapshot target files before writing.
    pub skip_backup: bool,
    /// Log per-provider progress at info level instead of debug.
    pub verbose: bool,
}

impl RunOptions {
    /// Level used for per-provider progress messages.
    pub fn progress_level(&self) -> Level {
        if self.verbose {
            Level::Info
        } else {
            Level::Debug
        }
    }
}

/// Outcome of one provider operation
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExecutionResult {
    pub provider: String,
    pub files_created: Vec<PathBuf>,
    pub files_skipped: Vec<PathBuf>,
    pub warnings: Vec<String>,
    pub backup_path: Option<PathBuf>,
    pub metadata: BTreeMap<String, serde_json::Value>,
}

impl ExecutionResult {
    pub fn new(provider: &str) -> Self {
        Self {
            provider: provider.to_string(),
            ..Self::default()
        }
    }

    /// A result for a provider that did not run.
    pub fn skipped(provider: &str, reason: impl Into<String>) -> Self {
        let mut result = Self::new(provider);
        result.warnings.push(reason.into());
        result.insert_metadata("skipped", true);
        result
    }

    pub fn is_skipped(&self) -> bool {
        self.metadata
            .get("skipped")
            .and_then(serde_json::Value::as_bool)
            .unwrap_or(false)
    }

    pub fn insert_metadata(&mut self, key: &str, value: impl Into<serde_json::Value>) {
        self.metadata.insert(key.to_string(), value.into());
    }

    /// Record merge statistics; superseded user records become warnings.
    pub fn record_merge(&mut self, stats: &MergeStats, record_kind: &str) {
        self.insert_metadata("kept", stats.kept);
        self.insert_metadata("replaced", stats.replaced_managed);
        for name in &stats.superseded {
            self.warnings.push(format!(
                "user-defined {} '{}' was replaced by a generated one",
                record_kind, name
            ));
        }
    }
}

/// Capability contract every provider implements
pub trait Provider: Send + Sync {
    /// Unique registry name.
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// The file this provider maintains.
    fn target_path(&self) -> &Path;

    /// Executable that must be on `PATH` for the provider to run.
    fn required_tool(&self) -> Option<&str>;

    fn is_enabled(&self) -> bool;

    /// Check the provider's configuration without touching any file.
    fn validate(&self) -> Result<()>;

    /// Build records, merge them into the target and write it.
    fn generate(&self, options: &RunOptions) -> Result<ExecutionResult>;

    /// Remove this provider's records from the target.
    fn clean(&self) -> Result<ExecutionResult>;

    /// Snapshot the target file.
    fn backup(&self, manager: &BackupManager) -> Result<(PathBuf, BackupMetadata)> {
        manager.backup(self.name(), self.target_path())
    }

    /// Put a snapshot back. An empty path means there is nothing to restore.
    fn restore(&self, manager: &BackupManager, backup_path: &Path) -> Result<()> {
        if backup_path.as_os_str().is_empty() {
            return Ok(());
        }
        let metadata = manager.restore(backup_path)?;
        log::info!(
            "Restored {} from {}",
            metadata.original_path.display(),
            backup_path.display()
        );
        Ok(())
    }

    /// Whether a run with `options` should snapshot the target first.
    fn needs_backup(&self, options: &RunOptions) -> bool {
        !options.dry_run && self.target_path().exists()
    }
}

/// Reject empty and relative target paths.
pub fn validate_target_path(provider: &str, field: &str, path: &Path) -> Result<()> {
    if path.as_os_str().is_empty() {
        return Err(Error::validation(provider, format!("{} must not be empty", field)));
    }
    if !path.is_absolute() {
        return Err(Error::validation(
            provider,
            format!("{} must be an absolute path, got '{}'", field, path.display()),
        ));
    }
    Ok(())
}

/// Write merged content to a target, honouring dry-run and force.
///
/// Without `force`, content identical to the previous file is not
/// rewritten and the path is reported as skipped.
pub fn write_output(
    result: &mut ExecutionResult,
    path: &Path,
    previous: Option<&str>,
    content: &str,
    options: &RunOptions,
) -> Result<()> {
    let changed = previous != Some(content);
    result.insert_metadata("dry_run", options.dry_run);
    result.insert_metadata("changed", changed);

    if options.dry_run {
        log!(
            options.progress_level(),
            "[{}] dry run: would write {}",
            result.provider,
            path.display()
        );
        result.files_skipped.push(path.to_path_buf());
        return Ok(());
    }

    if !changed && !options.force {
        log!(
            options.progress_level(),
            "[{}] {} is up to date",
            result.provider,
            path.display()
        );
        result.files_skipped.push(path.to_path_buf());
        return Ok(());
    }

    write::write_private(path, content)?;
    log!(
        options.progress_level(),
        "[{}] wrote {}",
        result.provider,
        path.display()
    );
    result.files_created.push(path.to_path_buf());
    Ok(())
}

/// Rewrite a target after removing managed records. Missing targets and
/// unchanged content are no-ops.
pub fn write_cleaned(
    result: &mut ExecutionResult,
    path: &Path,
    previous: &str,
    content: &str,
) -> Result<()> {
    if previous == content {
        result.files_skipped.push(path.to_path_buf());
        return Ok(());
    }
    write::write_private(path, content)?;
    result.files_created.push(path.to_path_buf());
    Ok(())
}
