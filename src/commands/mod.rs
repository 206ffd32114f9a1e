//! # CLI Command Implementations
//!
//! This module contains the implementation for each subcommand of the
//! `cfgweave` command-line tool. Each subcommand is defined in its own file.
//!
//! ## Structure
//!
//! Each command module typically contains:
//! - An `Args` struct that defines the command-specific arguments and options,
//!   derived using `clap`.
//! - An `execute` function that takes the parsed `Args` and the shared
//!   [`Context`] and performs the command's logic by calling into the
//!   `cfgweave` library.

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::ValueEnum;

use cfgweave::config::{self, Config};
use cfgweave::defaults;
use cfgweave::output::OutputConfig;

pub mod backups;
pub mod clean;
pub mod completions;
pub mod generate;
pub mod providers;
pub mod validate;

/// Report format for commands that print run results
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

/// Options shared by every command
#[derive(Debug, Clone)]
pub struct Context {
    pub config_path: Option<PathBuf>,
    pub output: OutputConfig,
}

impl Context {
    pub fn config_path(&self) -> PathBuf {
        self.config_path
            .clone()
            .unwrap_or_else(defaults::default_config_path)
    }

    /// Load the configuration file, which must exist.
    pub fn load_config(&self) -> Result<Config> {
        let path = self.config_path();
        if !path.exists() {
            anyhow::bail!("Configuration file not found: {}", path.display());
        }
        config::from_file(&path)
            .with_context(|| format!("Failed to load configuration from {}", path.display()))
    }

    /// Load the configuration file, falling back to defaults when absent.
    pub fn load_config_or_default(&self) -> Result<Config> {
        if self.config_path().exists() {
            self.load_config()
        } else {
            log::debug!(
                "No configuration at {}, using defaults",
                self.config_path().display()
            );
            Ok(Config::default())
        }
    }
}
