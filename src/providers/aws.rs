//! AWS CLI config provider
//!
//! Writes one `[sso-session]` section and a `[profile <account>/<role>]`
//! section per account role to the AWS config file. Runs before the
//! providers that read those profiles back.

use std::collections::HashSet;
use std::path::Path;

use log::log;

use crate::config::{AwsAccount, AwsProviderConfig};
use crate::error::{Error, Result};
use crate::merge::ini::{merge_ini, IniSection};
use crate::provider::{
    validate_target_path, write_cleaned, write_output, ExecutionResult, Provider, RunOptions,
};
use crate::write::read_existing;

pub const NAME: &str = "aws";

/// Maintains the SSO profiles of `~/.aws/config`
#[derive(Debug, Clone)]
pub struct AwsProvider {
    config: AwsProviderConfig,
}

impl AwsProvider {
    pub fn new(config: AwsProviderConfig) -> Self {
        Self { config }
    }

    /// Profile name for one role of an account.
    pub fn profile_name(account: &AwsAccount, role: &str) -> String {
        format!("{}/{}", account.name, role)
    }

    /// Generated sections, session first.
    pub fn sections(&self) -> Vec<IniSection> {
        let session = &self.config.sso_session;
        let mut sections = vec![IniSection::generated(format!("sso-session {}", session.name))
            .with_entry("sso_start_url", &session.start_url)
            .with_entry("sso_region", &session.region)
            .with_entry("sso_registration_scopes", &session.scopes)];

        for account in &self.config.accounts {
            let region = account.region.as_deref().unwrap_or(&self.config.region);
            for role in &account.roles {
                sections.push(
                    IniSection::generated(format!("profile {}", Self::profile_name(account, role)))
                        .with_entry("sso_session", &session.name)
                        .with_entry("sso_account_id", &account.id)
                        .with_entry("sso_role_name", role)
                        .with_entry("region", region)
                        .with_entry("output", &self.config.output),
                );
            }
        }
        sections
    }

    fn check_label(&self, what: &str, value: &str) -> Result<()> {
        if value.trim().is_empty() {
            return Err(Error::validation(NAME, format!("{} must not be empty", what)));
        }
        if value
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '/' | '[' | ']'))
        {
            return Err(Error::validation(
                NAME,
                format!(
                    "{} '{}' must not contain whitespace, '/', '[' or ']'",
                    what, value
                ),
            ));
        }
        Ok(())
    }
}

impl Provider for AwsProvider {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "AWS CLI SSO session and profiles"
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

        let session = &self.config.sso_session;
        self.check_label("sso_session.name", &session.name)?;
        let start_url = url::Url::parse(&session.start_url)?;
        if start_url.scheme() != "https" {
            return Err(Error::validation(
                NAME,
                format!("sso_session.start_url must use https, got '{}'", session.start_url),
            ));
        }
        if session.region.trim().is_empty() {
            return Err(Error::validation(NAME, "sso_session.region must not be empty"));
        }
        if self.config.region.trim().is_empty() {
            return Err(Error::validation(NAME, "region must not be empty"));
        }

        let mut profiles = HashSet::new();
        for account in &self.config.accounts {
            if account.id.len() != 12 || !account.id.chars().all(|c| c.is_ascii_digit()) {
                return Err(Error::validation(
                    NAME,
                    format!("account id '{}' must be twelve digits", account.id),
                ));
            }
            self.check_label("account name", &account.name)?;
            if account.roles.is_empty() {
                return Err(Error::validation(
                    NAME,
                    format!("account '{}' lists no roles", account.name),
                ));
            }
            for role in &account.roles {
                self.check_label("role", role)?;
                let profile = Self::profile_name(account, role);
                if !profiles.insert(profile.clone()) {
                    return Err(Error::validation(
                        NAME,
                        format!("profile '{}' is generated twice", profile),
                    ));
                }
            }
        }
        Ok(())
    }

    fn generate(&self, options: &RunOptions) -> Result<ExecutionResult> {
        let path = self.target_path();
        let previous = read_existing(path)?;
        let sections = self.sections();
        log!(
            options.progress_level(),
            "[{}] generated {} sections",
            NAME,
            sections.len()
        );

        let (content, stats) = merge_ini(previous.as_deref().unwrap_or_default(), &sections);

        let mut result = ExecutionResult::new(NAME);
        result.record_merge(&stats, "section");
        let profiles: Vec<String> = sections
            .iter()
            .filter_map(|section| section.profile_name().map(str::to_string))
            .collect();
        result.insert_metadata("profile_count", profiles.len());
        result.insert_metadata("profiles", profiles);
        result.insert_metadata("sso_session", self.config.sso_session.name.as_str());

        write_output(&mut result, path, previous.as_deref(), &content, options)?;
        Ok(result)
    }

    fn clean(&self) -> Result<ExecutionResult> {
        let mut result = ExecutionResult::new(NAME);
        let Some(previous) = read_existing(self.target_path())? else {
            return Ok(result);
        };
        let (content, stats) = merge_ini(&previous, &[]);
        result.insert_metadata("removed", stats.replaced_managed);
        write_cleaned(&mut result, self.target_path(), &previous, &content)?;
        Ok(result)
    }
}
