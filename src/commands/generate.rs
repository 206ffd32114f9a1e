//! Generate command implementation
//!
//! Runs the engine over the selected providers and prints one report per
//! provider. Partial results are printed even when the run aborts.

use anyhow::Result;
use clap::Args;

use cfgweave::engine::{Engine, RunError};
use cfgweave::output::{emoji, format_results, results_json};
use cfgweave::provider::RunOptions;

use super::{Context, OutputFormat};

/// Arguments for the generate command
#[derive(Args, Debug)]
pub struct GenerateArgs {
    /// Providers to run (default: every configured provider)
    #[arg(value_name = "PROVIDER")]
    pub providers: Vec<String>,

    /// Show what would be done without writing any file
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Rewrite target files even when their content is unchanged
    #[arg(short, long)]
    pub force: bool,

    /// Do not back up target files before writing
    #[arg(long)]
    pub no_backup: bool,

    /// Log per-provider progress
    #[arg(short, long)]
    pub verbose: bool,

    /// Report format
    #[arg(long, value_enum, default_value = "text")]
    pub format: OutputFormat,
}

/// Execute the generate command
pub fn execute(args: GenerateArgs, context: &Context) -> Result<()> {
    let config = context.load_config()?;
    let engine = Engine::from_config(&config)?;

    if engine.registry().is_empty()? {
        println!(
            "No providers configured in {}",
            context.config_path().display()
        );
        return Ok(());
    }

    let options = RunOptions {
        dry_run: args.dry_run,
        force: args.force,
        skip_backup: args.no_backup,
        verbose: args.verbose,
    };

    let (results, failure) = match engine.run(&args.providers, &options) {
        Ok(results) => (results, None),
        Err(RunError { results, source }) => (results, Some(source)),
    };

    match args.format {
        OutputFormat::Json => println!("{}", results_json(results.iter())?),
        OutputFormat::Text => {
            if args.dry_run {
                println!(
                    "{} DRY RUN MODE - No changes will be made",
                    emoji(&context.output, "🔎", "[DRY]")
                );
            }
            if !results.is_empty() {
                println!("{}", format_results(&context.output, results.iter()));
            }
        }
    }

    match failure {
        Some(error) => {
            if args.format == OutputFormat::Text {
                eprintln!("{} Generate failed", emoji(&context.output, "❌", "[FAIL]"));
            }
            Err(error.into())
        }
        None => Ok(()),
    }
}
