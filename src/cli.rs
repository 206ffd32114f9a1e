//! CLI argument parsing and command dispatch

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::commands;
use cfgweave::output::OutputConfig;

/// cfgweave - Generate local tool configuration without losing manual edits
#[derive(Parser, Debug)]
#[command(name = "cfgweave")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Path to the configuration file
    #[arg(long, global = true, value_name = "PATH", env = "CFGWEAVE_CONFIG")]
    config: Option<PathBuf>,

    /// Colorize output (always, never, auto)
    #[arg(long, global = true, value_name = "WHEN", default_value = "auto")]
    color: String,

    /// Set log level (error, warn, info, debug, trace); RUST_LOG takes precedence
    #[arg(
        long,
        global = true,
        value_name = "LEVEL",
        default_value = "warn",
        value_parser = ["off", "error", "warn", "info", "debug", "trace"]
    )]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate configuration files for the selected providers
    Generate(commands::generate::GenerateArgs),

    /// Check provider configuration without writing anything
    Validate(commands::validate::ValidateArgs),

    /// Remove one provider's generated records from its target file
    Clean(commands::clean::CleanArgs),

    /// List known providers and their status
    Providers(commands::providers::ProvidersArgs),

    /// List, restore and prune backups
    Backups(commands::backups::BackupsArgs),

    /// Generate shell completion scripts
    Completions(commands::completions::CompletionsArgs),
}

fn init_logging(level: &str) {
    let env = env_logger::Env::default().filter_or("RUST_LOG", level);
    // A logger may already be installed when running inside tests.
    let _ = env_logger::Builder::from_env(env)
        .format_timestamp(None)
        .format_target(false)
        .try_init();
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        init_logging(&self.log_level);

        let context = commands::Context {
            config_path: self.config,
            output: OutputConfig::from_env_and_flag(&self.color),
        };

        match self.command {
            Commands::Generate(args) => commands::generate::execute(args, &context),
            Commands::Validate(args) => commands::validate::execute(args, &context),
            Commands::Clean(args) => commands::clean::execute(args, &context),
            Commands::Providers(args) => commands::providers::execute(args, &context),
            Commands::Backups(args) => commands::backups::execute(args, &context),
            Commands::Completions(args) => commands::completions::execute(args),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_generate_flags() {
        let cli = Cli::try_parse_from([
            "cfgweave",
            "--config",
            "/tmp/cfgweave.yaml",
            "generate",
            "aws",
            "ssh",
            "-n",
            "--no-backup",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/cfgweave.yaml")));
        match cli.command {
            Commands::Generate(args) => {
                assert_eq!(args.providers, vec!["aws", "ssh"]);
                assert!(args.dry_run);
                assert!(args.no_backup);
                assert!(!args.force);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_rejects_unknown_log_level() {
        assert!(Cli::try_parse_from(["cfgweave", "--log-level", "loud", "providers"]).is_err());
    }
}
