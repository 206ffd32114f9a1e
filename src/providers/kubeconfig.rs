//! Kubeconfig provider
//!
//! Each configured EKS cluster yields a cluster, a context and a user
//! entry. The user authenticates through `aws eks get-token` with the
//! cluster's AWS profile exported as `AWS_PROFILE`.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use log::{log, warn};
use serde::Serialize;

use crate::config::{KubeClusterConfig, KubeProviderConfig};
use crate::error::{Error, Result};
use crate::merge::kubeconfig::{merge_kubeconfig, remove_kube_entries, KubeEntries, NamedEntry};
use crate::provider::{
    validate_target_path, write_cleaned, write_output, ExecutionResult, Provider, RunOptions,
};
use crate::write::read_existing;

pub const NAME: &str = "kubeconfig";

const EXEC_API_VERSION: &str = "client.authentication.k8s.io/v1beta1";

#[derive(Serialize)]
struct ClusterItem<'a> {
    name: &'a str,
    cluster: ClusterSpec<'a>,
}

#[derive(Serialize)]
struct ClusterSpec<'a> {
    server: &'a str,
    #[serde(
        rename = "certificate-authority-data",
        skip_serializing_if = "Option::is_none"
    )]
    certificate_authority_data: Option<&'a str>,
}

#[derive(Serialize)]
struct ContextItem<'a> {
    name: String,
    context: ContextSpec<'a>,
}

#[derive(Serialize)]
struct ContextSpec<'a> {
    cluster: &'a str,
    user: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    namespace: Option<&'a str>,
}

#[derive(Serialize)]
struct UserItem<'a> {
    name: &'a str,
    user: UserSpec<'a>,
}

#[derive(Serialize)]
struct UserSpec<'a> {
    exec: ExecSpec<'a>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ExecSpec<'a> {
    api_version: &'a str,
    command: &'a str,
    args: Vec<&'a str>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    env: Vec<EnvVar<'a>>,
}

#[derive(Serialize)]
struct EnvVar<'a> {
    name: &'a str,
    value: &'a str,
}

/// Maintains EKS cluster access entries in a kubeconfig file
#[derive(Debug, Clone)]
pub struct KubeconfigProvider {
    config: KubeProviderConfig,
}

impl KubeconfigProvider {
    pub fn new(config: KubeProviderConfig) -> Self {
        Self { config }
    }

    pub fn context_name(&self, cluster: &KubeClusterConfig) -> String {
        format!("{}{}", self.config.context_prefix, cluster.name)
    }

    /// Generated cluster, context and user entries.
    pub fn entries(&self) -> Result<KubeEntries> {
        let mut entries = KubeEntries::default();
        for cluster in &self.config.clusters {
            let cluster_item = ClusterItem {
                name: &cluster.name,
                cluster: ClusterSpec {
                    server: &cluster.server,
                    certificate_authority_data: cluster.certificate_authority_data.as_deref(),
                },
            };
            let context_item = ContextItem {
                name: self.context_name(cluster),
                context: ContextSpec {
                    cluster: &cluster.name,
                    user: &cluster.name,
                    namespace: cluster.namespace.as_deref(),
                },
            };
            let env = cluster
                .profile
                .as_deref()
                .map(|profile| EnvVar {
                    name: "AWS_PROFILE",
                    value: profile,
                })
                .into_iter()
                .collect();
            let user_item = UserItem {
                name: &cluster.name,
                user: UserSpec {
                    exec: ExecSpec {
                        api_version: EXEC_API_VERSION,
                        command: "aws",
                        args: vec![
                            "--region",
                            cluster.region.as_str(),
                            "eks",
                            "get-token",
                            "--cluster-name",
                            cluster.name.as_str(),
                            "--output",
                            "json",
                        ],
                        env,
                    },
                },
            };

            entries
                .clusters
                .push(NamedEntry::from_value(serde_yaml::to_value(&cluster_item)?));
            entries
                .contexts
                .push(NamedEntry::from_value(serde_yaml::to_value(&context_item)?));
            entries
                .users
                .push(NamedEntry::from_value(serde_yaml::to_value(&user_item)?));
        }
        Ok(entries)
    }

    /// Files matched by the source globs, sorted, without the target itself.
    pub fn source_files(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for pattern in &self.config.sources {
            for entry in glob::glob(pattern)? {
                match entry {
                    Ok(path) if path.is_file() && path != self.config.path => {
                        if !files.contains(&path) {
                            files.push(path);
                        }
                    }
                    Ok(_) => {}
                    Err(e) => warn!("[{}] skipping unreadable source: {}", NAME, e),
                }
            }
        }
        files.sort();
        Ok(files)
    }
}

impl Provider for KubeconfigProvider {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Kubernetes client access to EKS clusters"
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

        for pattern in &self.config.sources {
            glob::Pattern::new(pattern)?;
        }

        let mut names = HashSet::new();
        for cluster in &self.config.clusters {
            if cluster.name.trim().is_empty() {
                return Err(Error::validation(NAME, "cluster name must not be empty"));
            }
            if !names.insert(cluster.name.as_str()) {
                return Err(Error::validation(
                    NAME,
                    format!("cluster '{}' is listed more than once", cluster.name),
                ));
            }
            let server = url::Url::parse(&cluster.server)?;
            if server.scheme() != "https" {
                return Err(Error::validation(
                    NAME,
                    format!("cluster '{}': server must use https", cluster.name),
                ));
            }
            if cluster.region.trim().is_empty() {
                return Err(Error::validation(
                    NAME,
                    format!("cluster '{}': region must not be empty", cluster.name),
                ));
            }
        }

        if let Some(context) = &self.config.current_context {
            if context.trim().is_empty() {
                return Err(Error::validation(NAME, "current_context must not be empty"));
            }
        }
        Ok(())
    }

    fn generate(&self, options: &RunOptions) -> Result<ExecutionResult> {
        let entries = self.entries()?;
        let mut sources = Vec::new();
        for file in self.source_files()? {
            match read_existing(&file)? {
                Some(content) => sources.push(content),
                None => warn!("[{}] source {} vanished", NAME, file.display()),
            }
        }
        log!(
            options.progress_level(),
            "[{}] {} clusters, {} source files",
            NAME,
            self.config.clusters.len(),
            sources.len()
        );

        let path = self.target_path();
        let previous = read_existing(path)?;
        let (content, stats) = merge_kubeconfig(
            previous.as_deref().unwrap_or_default(),
            &sources,
            &entries,
            self.config.current_context.as_deref(),
        )?;

        let mut result = ExecutionResult::new(NAME);
        result.record_merge(&stats, "entry");
        let contexts: Vec<String> = entries.contexts.iter().map(|e| e.name.clone()).collect();
        result.insert_metadata("cluster_count", entries.clusters.len());
        result.insert_metadata("contexts", contexts);
        result.insert_metadata("source_files", sources.len());

        write_output(&mut result, path, previous.as_deref(), &content, options)?;
        Ok(result)
    }

    fn clean(&self) -> Result<ExecutionResult> {
        let mut result = ExecutionResult::new(NAME);
        let Some(previous) = read_existing(self.target_path())? else {
            return Ok(result);
        };
        let (content, stats) = remove_kube_entries(&previous, &self.entries()?)?;
        result.insert_metadata("removed", stats.superseded.len());
        write_cleaned(&mut result, self.target_path(), &previous, &content)?;
        Ok(result)
    }
}
