//! Default values for cfgweave configuration.
//!
//! This module provides centralized default paths and settings used by the
//! configuration loader and the providers, so every command resolves the
//! same locations.

use std::path::{Path, PathBuf};

/// Sentinel comment written on the line directly above every managed block
/// in formats that carry an explicit ownership marker.
pub const MANAGED_MARKER: &str = "# managed-by: cfgweave";

/// Number of backups kept per provider when the configuration does not say.
pub const DEFAULT_BACKUP_KEEP: usize = 10;

/// Resolve a path relative to the user's home directory.
///
/// Falls back to the current directory when the home directory cannot be
/// determined; such paths are relative and fail provider validation.
fn home_path(relative: &str) -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(relative)
}

/// Returns the default configuration file location.
///
/// - Linux: `~/.config/cfgweave/config.yaml`
/// - macOS: `~/Library/Application Support/cfgweave/config.yaml`
///
/// This can be overridden by `--config` or the `CFGWEAVE_CONFIG`
/// environment variable.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from(".cfgweave"))
        .join("cfgweave")
        .join("config.yaml")
}

/// Returns the default backup root directory.
///
/// Uses the platform data directory (`~/.local/share/cfgweave/backups` on
/// Linux), falling back to `.cfgweave-backups` in the current directory.
pub fn default_backup_dir() -> PathBuf {
    dirs::data_dir()
        .map(|dir| dir.join("cfgweave"))
        .unwrap_or_else(|| PathBuf::from(".cfgweave-backups"))
        .join("backups")
}

pub fn default_ssh_config() -> PathBuf {
    home_path(".ssh/config")
}

pub fn default_aws_config() -> PathBuf {
    home_path(".aws/config")
}

pub fn default_steampipe_config() -> PathBuf {
    home_path(".steampipe/config/aws.spc")
}

pub fn default_kubeconfig() -> PathBuf {
    home_path(".kube/config")
}

/// Expand a leading `~/` (or a bare `~`) to the home directory.
///
/// Any other path is returned unchanged.
pub fn expand_tilde(path: &Path) -> PathBuf {
    let Some(text) = path.to_str() else {
        return path.to_path_buf();
    };
    if text == "~" {
        return dirs::home_dir().unwrap_or_else(|| path.to_path_buf());
    }
    match text.strip_prefix("~/") {
        Some(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => path.to_path_buf(),
        },
        None => path.to_path_buf(),
    }
}
