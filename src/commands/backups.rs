//! Backups command implementation
//!
//! Lists, restores and prunes the snapshots the engine takes before it
//! rewrites a target file.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, Subcommand};

use cfgweave::backup::BackupManager;
use cfgweave::output::emoji;

use super::Context;

/// Arguments for the backups command
#[derive(Args, Debug)]
pub struct BackupsArgs {
    #[command(subcommand)]
    pub action: BackupsAction,
}

#[derive(Subcommand, Debug)]
pub enum BackupsAction {
    /// List a provider's backups, newest first
    List {
        /// Provider name
        provider: String,
    },
    /// Copy a backup back over the file it was taken from
    Restore {
        /// Path of the backup file (not its .json sidecar)
        backup: PathBuf,
    },
    /// Delete all but the newest backups of a provider
    Prune {
        /// Provider name
        provider: String,
        /// Number of backups to keep
        #[arg(long, default_value_t = cfgweave::defaults::DEFAULT_BACKUP_KEEP)]
        keep: usize,
    },
}

/// Execute the backups command
pub fn execute(args: BackupsArgs, context: &Context) -> Result<()> {
    let config = context.load_config_or_default()?;
    let manager = BackupManager::new(&config.backup.dir);

    match args.action {
        BackupsAction::List { provider } => {
            let backups = manager.list(&provider)?;
            if backups.is_empty() {
                println!("No backups for {} in {}", provider, manager.provider_dir(&provider).display());
                return Ok(());
            }
            for metadata in backups {
                println!(
                    "{}  {}  <- {}",
                    metadata.timestamp.format("%Y-%m-%d %H:%M:%S"),
                    metadata.backup_path.display(),
                    metadata.original_path.display()
                );
            }
        }
        BackupsAction::Restore { backup } => {
            let metadata = manager.restore(&backup)?;
            println!(
                "{} Restored {} from {}",
                emoji(&context.output, "♻️", "[OK]"),
                metadata.original_path.display(),
                backup.display()
            );
        }
        BackupsAction::Prune { provider, keep } => {
            let removed = manager.clean(&provider, keep)?;
            println!(
                "{} Removed {} backups of {} (kept {})",
                emoji(&context.output, "🧹", "[CLEAN]"),
                removed.len(),
                provider,
                keep
            );
        }
    }
    Ok(())
}
