//! # Configuration Schema and Parsing
//!
//! This module defines the data structures that represent the cfgweave
//! configuration file and the logic for loading it.
//!
//! ## Key Components
//!
//! - **`Config`**: The whole file: backup settings plus one optional section
//!   per provider. A provider without a section is not registered.
//!
//! - **Provider sections** (`AwsProviderConfig`, `SteampipeProviderConfig`,
//!   `SshProviderConfig`, `KubeProviderConfig`): the target path, the
//!   enabled flag, the external tool the provider needs, and the inventory
//!   of records the provider generates from.
//!
//! ## Parsing
//!
//! `parse` accepts YAML. An empty document (or one containing only
//! comments) yields the default configuration. Unknown keys are rejected so
//! a typo never silently disables a setting. Paths starting with `~/` are
//! expanded after parsing; validation of the remaining fields happens in
//! each provider's `validate`.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::defaults;
use crate::error::{Error, Result};

fn default_true() -> bool {
    true
}

fn default_backup_keep() -> Option<usize> {
    Some(defaults::DEFAULT_BACKUP_KEEP)
}

/// Backup behaviour shared by every provider
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BackupSettings {
    /// Whether the engine snapshots target files before rewriting them.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Root directory; each provider gets a subdirectory.
    #[serde(default = "defaults::default_backup_dir")]
    pub dir: PathBuf,
    /// How many backups to keep per provider after a successful run; at
    /// least 1. `null` disables automatic pruning.
    #[serde(default = "default_backup_keep")]
    pub keep: Option<usize>,
}

impl Default for BackupSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            dir: defaults::default_backup_dir(),
            keep: default_backup_keep(),
        }
    }
}

/// Top-level configuration file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    #[serde(default)]
    pub backup: BackupSettings,
    #[serde(default)]
    pub providers: ProvidersConfig,
}

/// One optional section per known provider
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub aws: Option<AwsProviderConfig>,
    #[serde(default)]
    pub steampipe: Option<SteampipeProviderConfig>,
    #[serde(default)]
    pub ssh: Option<SshProviderConfig>,
    #[serde(default)]
    pub kubeconfig: Option<KubeProviderConfig>,
}

////// AWS //////

fn default_aws_tool() -> Option<String> {
    Some("aws".to_string())
}

fn default_aws_region() -> String {
    "us-east-1".to_string()
}

fn default_aws_output() -> String {
    "json".to_string()
}

fn default_sso_scopes() -> String {
    "sso:account:access".to_string()
}

/// IAM Identity Center session shared by all generated profiles
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SsoSession {
    pub name: String,
    pub start_url: String,
    pub region: String,
    #[serde(default = "default_sso_scopes")]
    pub scopes: String,
}

/// An account discovered by the identity provider, with the roles the user
/// may assume in it
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AwsAccount {
    /// Twelve-digit account id.
    pub id: String,
    /// Human readable account name; becomes the profile name prefix.
    pub name: String,
    pub roles: Vec<String>,
    /// Overrides the provider-level region for this account's profiles.
    #[serde(default)]
    pub region: Option<String>,
}

/// `providers.aws` section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AwsProviderConfig {
    #[serde(default = "defaults::default_aws_config")]
    pub path: PathBuf,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_aws_tool")]
    pub tool: Option<String>,
    pub sso_session: SsoSession,
    #[serde(default = "default_aws_region")]
    pub region: String,
    #[serde(default = "default_aws_output")]
    pub output: String,
    #[serde(default)]
    pub accounts: Vec<AwsAccount>,
}

////// STEAMPIPE //////

fn default_steampipe_tool() -> Option<String> {
    Some("steampipe".to_string())
}

fn default_connection_prefix() -> String {
    "aws_".to_string()
}

fn default_plugin() -> String {
    "aws".to_string()
}

fn default_regions() -> Vec<String> {
    vec!["*".to_string()]
}

/// `providers.steampipe` section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SteampipeProviderConfig {
    #[serde(default = "defaults::default_steampipe_config")]
    pub path: PathBuf,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_steampipe_tool")]
    pub tool: Option<String>,
    /// AWS config file the SSO profiles are enumerated from when `profiles`
    /// is empty.
    #[serde(default = "defaults::default_aws_config")]
    pub aws_config: PathBuf,
    #[serde(default = "default_connection_prefix")]
    pub prefix: String,
    #[serde(default = "default_plugin")]
    pub plugin: String,
    #[serde(default = "default_regions")]
    pub regions: Vec<String>,
    /// Explicit `<account>/<role>` profile names.
    #[serde(default)]
    pub profiles: Vec<String>,
    /// Role preference used when an account has several profiles.
    #[serde(default)]
    pub preferred_roles: Vec<String>,
    /// Name of a generated aggregator connection spanning every account.
    #[serde(default)]
    pub aggregator: Option<String>,
}

////// SSH //////

fn default_ssh_tool() -> Option<String> {
    Some("ssh".to_string())
}

/// A host block the SSH provider maintains
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SshHostConfig {
    pub pattern: String,
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default)]
    pub user: Option<String>,
    /// Kept wider than `u16` so out-of-range values reach validation.
    #[serde(default)]
    pub port: Option<u32>,
    #[serde(default)]
    pub identity_file: Option<String>,
    #[serde(default)]
    pub proxy_jump: Option<String>,
    /// Any further directives, written in key order.
    #[serde(default)]
    pub options: BTreeMap<String, String>,
}

/// `providers.ssh` section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SshProviderConfig {
    #[serde(default = "defaults::default_ssh_config")]
    pub path: PathBuf,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_ssh_tool")]
    pub tool: Option<String>,
    /// Options upserted into the `Host *` block.
    #[serde(default)]
    pub global: BTreeMap<String, String>,
    #[serde(default)]
    pub hosts: Vec<SshHostConfig>,
}

////// KUBECONFIG //////

fn default_kube_tool() -> Option<String> {
    Some("kubectl".to_string())
}

/// A cluster discovered for the kubeconfig provider
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KubeClusterConfig {
    pub name: String,
    pub server: String,
    #[serde(default)]
    pub certificate_authority_data: Option<String>,
    pub region: String,
    /// AWS profile used by `aws eks get-token`.
    #[serde(default)]
    pub profile: Option<String>,
    #[serde(default)]
    pub namespace: Option<String>,
}

/// `providers.kubeconfig` section
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct KubeProviderConfig {
    #[serde(default = "defaults::default_kubeconfig")]
    pub path: PathBuf,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_kube_tool")]
    pub tool: Option<String>,
    /// Glob patterns of extra kubeconfig files merged into the target.
    #[serde(default)]
    pub sources: Vec<String>,
    #[serde(default)]
    pub context_prefix: String,
    #[serde(default)]
    pub current_context: Option<String>,
    #[serde(default)]
    pub clusters: Vec<KubeClusterConfig>,
}

impl Config {
    /// Expand `~/` in every path-valued field.
    pub fn expand_paths(&mut self) {
        self.backup.dir = defaults::expand_tilde(&self.backup.dir);
        if let Some(aws) = &mut self.providers.aws {
            aws.path = defaults::expand_tilde(&aws.path);
        }
        if let Some(steampipe) = &mut self.providers.steampipe {
            steampipe.path = defaults::expand_tilde(&steampipe.path);
            steampipe.aws_config = defaults::expand_tilde(&steampipe.aws_config);
        }
        if let Some(ssh) = &mut self.providers.ssh {
            ssh.path = defaults::expand_tilde(&ssh.path);
        }
        if let Some(kube) = &mut self.providers.kubeconfig {
            kube.path = defaults::expand_tilde(&kube.path);
            for source in &mut kube.sources {
                if let Some(rest) = source.strip_prefix("~/") {
                    if let Some(home) = dirs::home_dir() {
                        *source = home.join(rest).to_string_lossy().into_owned();
                    }
                }
            }
        }
    }
}

/// Parse a YAML configuration string
///
/// # Examples
///
/// ```
/// use cfgweave::config;
///
/// let config = config::parse("backup:\n  keep: 3\n").unwrap();
/// assert_eq!(config.backup.keep, Some(3));
/// assert!(config.providers.ssh.is_none());
/// ```
pub fn parse(yaml_content: &str) -> Result<Config> {
    let raw: serde_yaml::Value =
        serde_yaml::from_str(yaml_content).map_err(|e| Error::ConfigParse {
            message: e.to_string(),
            hint: None,
        })?;

    if raw.is_null() {
        return Ok(Config::default());
    }

    let mut config: Config = serde_yaml::from_value(raw).map_err(|e| {
        let message = e.to_string();
        let hint = if message.contains("unknown field") {
            Some("check the key spelling; each section accepts only its documented keys".to_string())
        } else if message.contains("missing field") {
            Some("a required key is absent from one of the provider sections".to_string())
        } else {
            None
        };
        Error::ConfigParse { message, hint }
    })?;

    if config.backup.keep == Some(0) {
        return Err(Error::ConfigParse {
            message: "backup.keep must be at least 1".to_string(),
            hint: Some("use `keep: ~` to keep every backup".to_string()),
        });
    }

    config.expand_paths();
    Ok(config)
}

/// Load and parse a configuration file
pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Config> {
    let content = std::fs::read_to_string(path).map_err(Error::Io)?;
    parse(&content)
}
