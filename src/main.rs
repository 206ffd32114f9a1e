//! # cfgweave CLI
//!
//! This is the binary entry point for the `cfgweave` command-line tool.
//!
//! Its primary responsibilities are:
//! - Parsing command-line arguments using `clap`.
//! - Setting up logging.
//! - Executing the appropriate command and turning library errors into a
//!   non-zero exit status.
//!
//! The core application logic lives in the `lib.rs` library crate; the binary
//! is a thin wrapper around it.

mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;

fn main() -> Result<()> {
    let cli = cli::Cli::parse();
    cli.execute()
}
