//! Clean command implementation

use anyhow::Result;
use clap::Args;

use cfgweave::engine::Engine;
use cfgweave::output::emoji;

use super::Context;

/// Arguments for the clean command
#[derive(Args, Debug)]
pub struct CleanArgs {
    /// Provider whose generated records are removed
    #[arg(value_name = "PROVIDER")]
    pub provider: String,
}

/// Execute the clean command
pub fn execute(args: CleanArgs, context: &Context) -> Result<()> {
    let config = context.load_config()?;
    let engine = Engine::from_config(&config)?;
    let result = engine.clean(&args.provider)?;

    let removed = result
        .metadata
        .get("removed")
        .and_then(serde_json::Value::as_u64)
        .unwrap_or(0);
    match result.files_created.first() {
        Some(path) => println!(
            "{} {}: removed {} generated records from {}",
            emoji(&context.output, "🧹", "[CLEAN]"),
            args.provider,
            removed,
            path.display()
        ),
        None => println!(
            "{} {}: nothing to remove",
            emoji(&context.output, "➖", "[SAME]"),
            args.provider
        ),
    }
    Ok(())
}
