//! Steampipe AWS connection provider
//!
//! Profiles come from the configuration or, when none are listed, from the
//! SSO profiles of the AWS config file (sections carrying
//! `sso_account_id`). Profiles are grouped by account identifier and one
//! connection is generated per account.

use std::path::Path;

use log::{log, warn};
use regex::Regex;

use crate::config::SteampipeProviderConfig;
use crate::error::{Error, Result};
use crate::merge::account_of_profile;
use crate::merge::ini::profiles_with_key;
use crate::merge::spc::{connection_name, merge_spc, Connection};
use crate::provider::{
    validate_target_path, write_cleaned, write_output, ExecutionResult, Provider, RunOptions,
};
use crate::write::read_existing;

pub const NAME: &str = "steampipe";

const SSO_ACCOUNT_KEY: &str = "sso_account_id";

/// Maintains the AWS connections of a Steampipe `.spc` file
#[derive(Debug, Clone)]
pub struct SteampipeProvider {
    config: SteampipeProviderConfig,
}

fn role_of_profile(profile: &str) -> &str {
    profile.split_once('/').map_or("", |(_, role)| role)
}

/// Pick one profile per account.
///
/// Accounts keep the order in which they are first seen. Within an account
/// the first role found in `preferred_roles` wins (case-insensitive), else
/// the first profile listed.
pub fn select_profiles(profiles: &[String], preferred_roles: &[String]) -> Vec<String> {
    let mut groups: Vec<(String, Vec<&String>)> = Vec::new();
    for profile in profiles {
        let account = account_of_profile(profile);
        match groups.iter_mut().find(|(key, _)| *key == account) {
            Some((_, members)) => members.push(profile),
            None => groups.push((account, vec![profile])),
        }
    }

    groups
        .into_iter()
        .map(|(_, members)| {
            preferred_roles
                .iter()
                .find_map(|preferred| {
                    members
                        .iter()
                        .find(|profile| role_of_profile(profile).eq_ignore_ascii_case(preferred))
                })
                .unwrap_or(&members[0])
                .to_string()
        })
        .collect()
}

impl SteampipeProvider {
    pub fn new(config: SteampipeProviderConfig) -> Self {
        Self { config }
    }

    /// Profiles to generate connections from.
    pub fn discover_profiles(&self) -> Result<Vec<String>> {
        if !self.config.profiles.is_empty() {
            return Ok(self.config.profiles.clone());
        }
        match read_existing(&self.config.aws_config)? {
            Some(content) => Ok(profiles_with_key(&content, SSO_ACCOUNT_KEY)),
            None => {
                warn!(
                    "[{}] AWS config {} does not exist; no profiles to read",
                    NAME,
                    self.config.aws_config.display()
                );
                Ok(Vec::new())
            }
        }
    }

    /// Generated connections for `profiles`, aggregator last.
    pub fn connections(&self, profiles: &[String]) -> Result<Vec<Connection>> {
        let mut connections: Vec<Connection> =
            select_profiles(profiles, &self.config.preferred_roles)
                .iter()
                .map(|profile| {
                    Connection::for_profile(
                        connection_name(&self.config.prefix, profile),
                        &self.config.plugin,
                        profile,
                        &self.config.regions,
                    )
                })
                .collect();

        if let Some(aggregator) = &self.config.aggregator {
            if connections.iter().any(|c| &c.name == aggregator) {
                return Err(Error::validation(
                    NAME,
                    format!("aggregator '{}' has the same name as an account connection", aggregator),
                ));
            }
            connections.push(Connection::aggregator(
                aggregator.as_str(),
                &self.config.plugin,
                &[format!("{}*", self.config.prefix)],
            ));
        }
        Ok(connections)
    }
}

impl Provider for SteampipeProvider {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Steampipe AWS connections, one per account"
    }

    fn target_path(&self) -> &Path {
        &self.config.path
    }

    fn required_tool(&self) -> Option<&str> {
        self.config.tool.as_deref()
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    fn validate(&self) -> Result<()> {
        validate_target_path(NAME, "path", &self.config.path)?;
        validate_target_path(NAME, "aws_config", &self.config.aws_config)?;

        let identifier = Regex::new(r"^[a-z0-9_]*$")?;
        if !identifier.is_match(&self.config.prefix) {
            return Err(Error::validation(
                NAME,
                format!(
                    "prefix '{}' may only contain lowercase letters, digits and '_'",
                    self.config.prefix
                ),
            ));
        }
        if let Some(aggregator) = &self.config.aggregator {
            if aggregator.is_empty() || !identifier.is_match(aggregator) {
                return Err(Error::validation(
                    NAME,
                    format!(
                        "aggregator '{}' may only contain lowercase letters, digits and '_'",
                        aggregator
                    ),
                ));
            }
        }
        if self.config.plugin.trim().is_empty() {
            return Err(Error::validation(NAME, "plugin must not be empty"));
        }
        if self.config.regions.is_empty() {
            return Err(Error::validation(NAME, "regions must list at least one region"));
        }
        for profile in &self.config.profiles {
            let account = profile.split('/').next().unwrap_or_default();
            if account.trim().is_empty() {
                return Err(Error::validation(
                    NAME,
                    format!("profile '{}' has no account part", profile),
                ));
            }
        }
        Ok(())
    }

    fn generate(&self, options: &RunOptions) -> Result<ExecutionResult> {
        let mut result = ExecutionResult::new(NAME);

        let profiles = self.discover_profiles()?;
        if profiles.is_empty() {
            result
                .warnings
                .push("no AWS SSO profiles found; no account connections generated".to_string());
        }
        let connections = self.connections(&profiles)?;
        log!(
            options.progress_level(),
            "[{}] {} profiles -> {} connections",
            NAME,
            profiles.len(),
            connections.len()
        );

        let path = self.target_path();
        let previous = read_existing(path)?;
        let (content, stats) = merge_spc(previous.as_deref().unwrap_or_default(), &connections)?;

        result.record_merge(&stats, "connection");
        let names: Vec<String> = connections.iter().map(|c| c.name.clone()).collect();
        result.insert_metadata("connection_count", names.len());
        result.insert_metadata("connections", names);
        result.insert_metadata("profiles_seen", profiles.len());

        write_output(&mut result, path, previous.as_deref(), &content, options)?;
        Ok(result)
    }

    fn clean(&self) -> Result<ExecutionResult> {
        let mut result = ExecutionResult::new(NAME);
        let Some(previous) = read_existing(self.target_path())? else {
            return Ok(result);
        };
        let (content, stats) = merge_spc(&previous, &[])?;
        result.insert_metadata("removed", stats.replaced_managed);
        write_cleaned(&mut result, self.target_path(), &previous, &content)?;
        Ok(result)
    }
}
