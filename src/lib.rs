//! # cfgweave
//!
//! This library generates and reconciles local configuration files (AWS CLI
//! profiles, Steampipe connections, SSH client config, kubeconfig) from an
//! inventory of accounts, hosts and clusters. It is used by the `cfgweave`
//! command-line tool but can be embedded in other programs.
//!
//! Every regeneration keeps what a person added by hand and fully replaces
//! what a previous run wrote.
//!
//! ## Quick Example
//!
//! ```
//! use cfgweave::merge::spc::{merge_spc, Connection};
//!
//! let previous = "connection \"local\" {\n  plugin = \"csv\"\n}\n";
//! let generated = [Connection::for_profile(
//!     "aws_prod_account",
//!     "aws",
//!     "prod-account/AdminAccess",
//!     &["*".to_string()],
//! )];
//!
//! let (content, stats) = merge_spc(previous, &generated).unwrap();
//! assert!(content.contains("connection \"local\""));
//! assert!(content.contains("connection \"aws_prod_account\""));
//! assert_eq!(stats.kept, 1);
//! ```
//!
//! ## Core Concepts
//!
//! - **Configuration (`config`)**: The YAML file listing the providers to run
//!   and the inventory each one generates from.
//! - **Merge engines (`merge`)**: Per-format parsers that decide which
//!   records of an existing file survive a regeneration.
//! - **Providers (`provider`, `providers`)**: One per target file; validate,
//!   generate, back up, restore and clean.
//! - **Registry (`registry`)**: The providers configured for this process.
//! - **Engine (`engine`)**: Runs providers in dependency order with backup
//!   and rollback around each one.
//! - **Backups (`backup`)**: Timestamped snapshots with JSON sidecars.
//!
//! ## Execution Flow
//!
//! 1.  **Load**: Parse the configuration and build the registry.
//! 2.  **Resolve**: Pick the requested providers and order them.
//! 3.  **Validate**: Check each provider's settings before touching files.
//! 4.  **Backup**: Snapshot the target when it exists.
//! 5.  **Generate**: Merge the fresh records into the target and write it.
//! 6.  **Rollback**: Restore the snapshot if generation fails.

pub mod backup;
pub mod config;
pub mod defaults;
pub mod engine;
pub mod error;
pub mod merge;
pub mod output;
pub mod provider;
pub mod providers;
pub mod registry;
pub mod tools;
pub mod write;

#[cfg(test)]
mod merge_proptest;
