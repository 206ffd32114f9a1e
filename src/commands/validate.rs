//! # Validate Command Implementation
//!
//! Checks every selected provider's configuration without reading or
//! writing any target file. All providers are checked; the command fails
//! if any of them is invalid.

use anyhow::Result;
use clap::Args;

use cfgweave::engine::Engine;
use cfgweave::output::emoji;

use super::Context;

/// Check provider configuration
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Providers to check (default: every configured provider)
    #[arg(value_name = "PROVIDER")]
    pub providers: Vec<String>,
}

/// Execute the `validate` command.
pub fn execute(args: ValidateArgs, context: &Context) -> Result<()> {
    let config = context.load_config()?;
    let engine = Engine::from_config(&config)?;
    let report = engine.validate_all(&args.providers)?;

    let mut failures = 0;
    for (name, outcome) in &report {
        match outcome {
            Ok(()) => println!("{} {}: valid", emoji(&context.output, "✅", "[OK]"), name),
            Err(e) => {
                failures += 1;
                println!("{} {}", emoji(&context.output, "❌", "[FAIL]"), e);
            }
        }
    }

    if failures > 0 {
        anyhow::bail!(
            "{} of {} providers failed validation",
            failures,
            report.len()
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::{context_with, ssh_config_yaml};
    use tempfile::TempDir;

    #[test]
    fn test_validate_good_config() {
        let temp_dir = TempDir::new().unwrap();
        let context = context_with(temp_dir.path(), &ssh_config_yaml(temp_dir.path()));
        execute(ValidateArgs { providers: vec![] }, &context).unwrap();
    }

    #[test]
    fn test_validate_reports_bad_port() {
        let temp_dir = TempDir::new().unwrap();
        let yaml = format!(
            "providers:\n  ssh:\n    path: {}/ssh_config\n    hosts:\n      - pattern: web\n        port: 99999\n",
            temp_dir.path().display()
        );
        let context = context_with(temp_dir.path(), &yaml);
        let err = execute(ValidateArgs { providers: vec![] }, &context).unwrap_err();
        assert!(err.to_string().contains("1 of 1 providers failed validation"));
    }
}
