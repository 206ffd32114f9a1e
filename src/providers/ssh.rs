//! SSH client config provider

use std::collections::HashSet;
use std::path::Path;

use log::log;

use crate::config::{SshHostConfig, SshProviderConfig};
use crate::error::{Error, Result};
use crate::merge::ssh::{merge_ssh, normalize_pattern, remove_hosts, HostBlock};
use crate::provider::{
    validate_target_path, write_cleaned, write_output, ExecutionResult, Provider, RunOptions,
};
use crate::write::read_existing;

pub const NAME: &str = "ssh";

/// Maintains host blocks and `Host *` defaults in `~/.ssh/config`
#[derive(Debug, Clone)]
pub struct SshProvider {
    config: SshProviderConfig,
}

fn directives(host: &SshHostConfig) -> Vec<(String, String)> {
    let mut options = Vec::new();
    let mut push = |key: &str, value: Option<String>| {
        if let Some(value) = value {
            options.push((key.to_string(), value));
        }
    };
    push("HostName", host.hostname.clone());
    push("User", host.user.clone());
    push("Port", host.port.map(|port| port.to_string()));
    push("IdentityFile", host.identity_file.clone());
    push("ProxyJump", host.proxy_jump.clone());
    options.extend(host.options.iter().map(|(k, v)| (k.clone(), v.clone())));
    options
}

fn check_directive(owner: &str, key: &str, value: &str) -> Result<()> {
    if key.is_empty() || key.contains(|c: char| c.is_whitespace() || c == '=') {
        return Err(Error::validation(
            NAME,
            format!("{}: '{}' is not a valid directive name", owner, key),
        ));
    }
    if value.trim().is_empty() || value.contains('\n') {
        return Err(Error::validation(
            NAME,
            format!("{}: directive '{}' needs a single-line value", owner, key),
        ));
    }
    Ok(())
}

/// OpenSSH keywords are case-insensitive; a second spelling would emit two
/// lines of which only the first takes effect.
fn check_unique_directives<'a>(owner: &str, keys: impl IntoIterator<Item = &'a str>) -> Result<()> {
    let mut seen = HashSet::new();
    for key in keys {
        if !seen.insert(key.to_ascii_lowercase()) {
            return Err(Error::validation(
                NAME,
                format!("{}: directive '{}' is set more than once", owner, key),
            ));
        }
    }
    Ok(())
}

impl SshProvider {
    pub fn new(config: SshProviderConfig) -> Self {
        Self { config }
    }

    /// Generated host blocks in configuration order.
    pub fn host_blocks(&self) -> Vec<HostBlock> {
        self.config
            .hosts
            .iter()
            .map(|host| HostBlock::generated(&host.pattern, directives(host)))
            .collect()
    }

    pub fn global_options(&self) -> Vec<(String, String)> {
        self.config
            .global
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

impl Provider for SshProvider {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "OpenSSH client host blocks"
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

        let mut seen = HashSet::new();
        for host in &self.config.hosts {
            let pattern = normalize_pattern(&host.pattern);
            if pattern.is_empty() {
                return Err(Error::validation(NAME, "host pattern must not be empty"));
            }
            if pattern == "*" {
                return Err(Error::validation(
                    NAME,
                    "'Host *' is configured through 'global', not as a host",
                ));
            }
            if !seen.insert(pattern.clone()) {
                return Err(Error::validation(
                    NAME,
                    format!("host '{}' is listed more than once", pattern),
                ));
            }
            if let Some(port) = host.port {
                if !(1..=65535).contains(&port) {
                    return Err(Error::validation(
                        NAME,
                        format!("host '{}': port {} is out of range 1-65535", pattern, port),
                    ));
                }
            }
            let owner = format!("host '{}'", pattern);
            let directives = directives(host);
            for (key, value) in &directives {
                check_directive(&owner, key, value)?;
            }
            check_unique_directives(&owner, directives.iter().map(|(key, _)| key.as_str()))?;
        }

        for (key, value) in &self.config.global {
            check_directive("global", key, value)?;
        }
        check_unique_directives("global", self.config.global.keys().map(String::as_str))?;
        Ok(())
    }

    fn generate(&self, options: &RunOptions) -> Result<ExecutionResult> {
        let path = self.target_path();
        let previous = read_existing(path)?;
        let hosts = self.host_blocks();
        let global = self.global_options();
        log!(
            options.progress_level(),
            "[{}] {} hosts, {} global options",
            NAME,
            hosts.len(),
            global.len()
        );

        let (content, stats) = merge_ssh(previous.as_deref().unwrap_or_default(), &hosts, &global);

        let mut result = ExecutionResult::new(NAME);
        result.record_merge(&stats, "host");
        let patterns: Vec<String> = hosts.iter().map(|h| h.pattern.clone()).collect();
        result.insert_metadata("host_count", patterns.len());
        result.insert_metadata("hosts", patterns);
        result.insert_metadata("global_options", global.len());

        write_output(&mut result, path, previous.as_deref(), &content, options)?;
        Ok(result)
    }

    fn clean(&self) -> Result<ExecutionResult> {
        let mut result = ExecutionResult::new(NAME);
        let Some(previous) = read_existing(self.target_path())? else {
            return Ok(result);
        };
        let patterns: Vec<String> = self.config.hosts.iter().map(|h| h.pattern.clone()).collect();
        let (content, stats) = remove_hosts(&previous, &patterns);
        result.insert_metadata("removed", stats.superseded.len());
        write_cleaned(&mut result, self.target_path(), &previous, &content)?;
        Ok(result)
    }
}
