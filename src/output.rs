//! # Run Reports
//!
//! Text and JSON renderings of [`ExecutionResult`]s, plus the color and
//! emoji switch used by every command.
//!
//! With `--color=auto` colors are off when `NO_COLOR` is set (any value,
//! see https://no-color.org/), when `CLICOLOR=0` or `TERM=dumb`, and when
//! stdout is not a terminal. `CLICOLOR_FORCE` turns them on regardless of
//! the terminal; `--color=always` and `--color=never` override everything.

use std::env;

use console::style;

use crate::error::Result;
use crate::provider::ExecutionResult;

/// Color and emoji switch for command output
#[derive(Debug, Clone)]
pub struct OutputConfig {
    pub use_color: bool,
}

impl OutputConfig {
    /// Resolve the `--color` flag against the environment.
    ///
    /// `--color=always` forces colors on (overriding `NO_COLOR`),
    /// `--color=never` forces them off, and `auto` detects support from
    /// the environment and whether stdout is a terminal.
    pub fn from_env_and_flag(color_flag: &str) -> Self {
        let use_color = match color_flag.to_lowercase().as_str() {
            "always" => true,
            "never" => false,
            _ => Self::detect_color_support(),
        };

        Self { use_color }
    }

    fn detect_color_support() -> bool {
        let disabled = env::var_os("NO_COLOR").is_some()
            || env::var("CLICOLOR").is_ok_and(|v| v == "0");
        if disabled {
            return false;
        }
        if env::var("CLICOLOR_FORCE").is_ok_and(|v| !v.is_empty() && v != "0") {
            return true;
        }
        !env::var("TERM").is_ok_and(|v| v == "dumb")
            && console::Term::stdout().features().colors_supported()
    }

    pub fn with_color() -> Self {
        Self { use_color: true }
    }

    pub fn without_color() -> Self {
        Self { use_color: false }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self::from_env_and_flag("auto")
    }
}

/// Returns the emoji when colors are enabled, else the plain alternative.
pub fn emoji<'a>(config: &OutputConfig, emoji_str: &'a str, plain: &'a str) -> &'a str {
    if config.use_color {
        emoji_str
    } else {
        plain
    }
}

fn status_line(config: &OutputConfig, result: &ExecutionResult) -> String {
    let name = if config.use_color {
        style(&result.provider).bold().to_string()
    } else {
        result.provider.clone()
    };

    if result.is_skipped() {
        return format!("{} {}: skipped", emoji(config, "⏭️", "[SKIP]"), name);
    }

    let dry_run = result
        .metadata
        .get("dry_run")
        .and_then(serde_json::Value::as_bool)
        .unwrap_or(false);

    if let Some(path) = result.files_created.first() {
        format!("{} {}: wrote {}", emoji(config, "✅", "[OK]"), name, path.display())
    } else if let Some(path) = result.files_skipped.first() {
        if dry_run {
            format!(
                "{} {}: would write {}",
                emoji(config, "🔎", "[DRY]"),
                name,
                path.display()
            )
        } else {
            format!(
                "{} {}: {} is up to date",
                emoji(config, "➖", "[SAME]"),
                name,
                path.display()
            )
        }
    } else {
        format!("{} {}: done", emoji(config, "✅", "[OK]"), name)
    }
}

/// Human-readable lines for one provider result.
pub fn format_result(config: &OutputConfig, result: &ExecutionResult) -> Vec<String> {
    let mut lines = vec![status_line(config, result)];

    if let Some(backup) = &result.backup_path {
        lines.push(format!("   backup: {}", backup.display()));
    }
    for (key, value) in &result.metadata {
        if matches!(key.as_str(), "dry_run" | "skipped" | "changed") {
            continue;
        }
        lines.push(format!("   {}: {}", key, value));
    }
    for warning in &result.warnings {
        let text = if config.use_color {
            style(warning).yellow().to_string()
        } else {
            warning.clone()
        };
        lines.push(format!("   {} {}", emoji(config, "⚠️", "[WARN]"), text));
    }
    lines
}

/// Human-readable report for a sequence of results.
pub fn format_results<'a>(
    config: &OutputConfig,
    results: impl IntoIterator<Item = &'a ExecutionResult>,
) -> String {
    results
        .into_iter()
        .flat_map(|result| format_result(config, result))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Pretty JSON array of results.
pub fn results_json<'a>(results: impl IntoIterator<Item = &'a ExecutionResult>) -> Result<String> {
    let results: Vec<&ExecutionResult> = results.into_iter().collect();
    Ok(serde_json::to_string_pretty(&results)?)
}
