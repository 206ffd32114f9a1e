//! Providers command implementation
//!
//! Lists every provider this build knows about, whether it is configured,
//! its target file and whether its external tool is available.

use anyhow::Result;
use clap::Args;
use console::style;

use cfgweave::providers::{build_registry, known_providers};
use cfgweave::tools;

use super::Context;

/// Arguments for the providers command
#[derive(Args, Debug)]
pub struct ProvidersArgs {}

/// One row of the providers listing
#[derive(Debug, PartialEq, Eq)]
pub struct ProviderRow {
    pub name: String,
    pub status: String,
    pub target: String,
    pub description: String,
}

/// Build the listing for the loaded configuration.
pub fn rows(context: &Context) -> Result<Vec<ProviderRow>> {
    let config = context.load_config_or_default()?;
    let registry = build_registry(&config)?;

    let mut rows = Vec::new();
    for name in known_providers() {
        let row = match registry.get(name) {
            Ok(provider) => {
                let status = if !provider.is_enabled() {
                    "disabled".to_string()
                } else {
                    match provider.required_tool() {
                        Some(tool) if !tools::is_available(tool) => format!("missing '{}'", tool),
                        _ => "ready".to_string(),
                    }
                };
                ProviderRow {
                    name: name.to_string(),
                    status,
                    target: provider.target_path().display().to_string(),
                    description: provider.description().to_string(),
                }
            }
            Err(_) => ProviderRow {
                name: name.to_string(),
                status: "not configured".to_string(),
                target: "-".to_string(),
                description: String::new(),
            },
        };
        rows.push(row);
    }
    Ok(rows)
}

/// Execute the providers command
pub fn execute(_args: ProvidersArgs, context: &Context) -> Result<()> {
    for row in rows(context)? {
        let status = if context.output.use_color {
            match row.status.as_str() {
                "ready" => style(&row.status).green().to_string(),
                "not configured" => style(&row.status).dim().to_string(),
                _ => style(&row.status).yellow().to_string(),
            }
        } else {
            row.status.clone()
        };
        println!("{:<12} {:<16} {}", row.name, status, row.target);
        if !row.description.is_empty() {
            println!("{:<12} {}", "", row.description);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::{context_with, ssh_config_yaml};
    use tempfile::TempDir;

    #[test]
    fn test_rows_mark_configured_providers() {
        let temp_dir = TempDir::new().unwrap();
        let context = context_with(temp_dir.path(), &ssh_config_yaml(temp_dir.path()));

        let rows = rows(&context).unwrap();
        let names: Vec<&str> = rows.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["aws", "kubeconfig", "ssh", "steampipe"]);

        let ssh = &rows[2];
        assert_eq!(ssh.status, "ready");
        assert!(ssh.target.ends_with("ssh_config"));
        assert_eq!(rows[0].status, "not configured");
    }
}
