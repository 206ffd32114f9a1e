//! # Provider Implementations
//!
//! One module per target file:
//!
//! - `aws`: `~/.aws/config` SSO session and profiles
//! - `steampipe`: `~/.steampipe/config/aws.spc` connections, one per account
//! - `ssh`: `~/.ssh/config` host blocks and `Host *` defaults
//! - `kubeconfig`: `~/.kube/config` clusters, contexts and users
//!
//! Providers are only registered when their section is present in the
//! configuration file. [`build_registry`] walks a static table of
//! constructors instead of any form of self-registration.

use std::sync::Arc;

use crate::config::Config;
use crate::error::Result;
use crate::provider::Provider;
use crate::registry::Registry;

pub mod aws;
pub mod kubeconfig;
pub mod ssh;
pub mod steampipe;

/// Builds a provider from its configuration section, if present.
type Factory = fn(&Config) -> Option<Arc<dyn Provider>>;

fn build_aws(config: &Config) -> Option<Arc<dyn Provider>> {
    let section = config.providers.aws.clone()?;
    Some(Arc::new(aws::AwsProvider::new(section)))
}

fn build_steampipe(config: &Config) -> Option<Arc<dyn Provider>> {
    let section = config.providers.steampipe.clone()?;
    Some(Arc::new(steampipe::SteampipeProvider::new(section)))
}

fn build_ssh(config: &Config) -> Option<Arc<dyn Provider>> {
    let section = config.providers.ssh.clone()?;
    Some(Arc::new(ssh::SshProvider::new(section)))
}

fn build_kubeconfig(config: &Config) -> Option<Arc<dyn Provider>> {
    let section = config.providers.kubeconfig.clone()?;
    Some(Arc::new(kubeconfig::KubeconfigProvider::new(section)))
}

/// Every provider this build knows about
const FACTORIES: &[(&str, Factory)] = &[
    (aws::NAME, build_aws),
    (kubeconfig::NAME, build_kubeconfig),
    (ssh::NAME, build_ssh),
    (steampipe::NAME, build_steampipe),
];

/// Names of every known provider, whether configured or not.
pub fn known_providers() -> Vec<&'static str> {
    FACTORIES.iter().map(|(name, _)| *name).collect()
}

/// Register a provider for each section present in `config`.
pub fn build_registry(config: &Config) -> Result<Registry> {
    let registry = Registry::new();
    for (name, factory) in FACTORIES {
        if let Some(provider) = factory(config) {
            log::debug!("Registering provider '{}'", name);
            registry.register(provider)?;
        }
    }
    Ok(registry)
}
