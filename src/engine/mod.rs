//! # Orchestration Engine
//!
//! Drives one run across the selected providers.
//!
//! ## Process
//!
//! 1.  **Resolve**: Look up each requested provider. Any unknown name
//!     aborts before a file is touched. An empty selection means every
//!     registered provider, in sorted-name order.
//!
//! 2.  **Order**: Move the providers whose output others read to the front
//!     (see [`ordering`]).
//!
//! 3.  **Run each provider**:
//!     - skip it, with a warning, when it is disabled or its tool is not on
//!       `PATH`
//!     - validate it; a failure aborts the run
//!     - snapshot its target when a backup is due; a failed snapshot is
//!       only a warning
//!     - generate; on failure restore the snapshot and abort, on success
//!       prune old backups
//!
//! An aborted run returns a [`RunError`] carrying the results of every
//! provider that finished before the failure.

use std::sync::Arc;

use log::{error, info, log, warn};
use serde::Serialize;

use crate::backup::BackupManager;
use crate::config::{BackupSettings, Config};
use crate::defaults::DEFAULT_BACKUP_KEEP;
use crate::error::{Error, Result};
use crate::provider::{ExecutionResult, Provider, RunOptions};
use crate::providers;
use crate::registry::Registry;
use crate::tools;

pub mod ordering;

/// Backup behaviour of the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineSettings {
    pub backups_enabled: bool,
    /// Backups kept per provider after a successful generation; `None` keeps all.
    pub keep: Option<usize>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            backups_enabled: true,
            keep: Some(DEFAULT_BACKUP_KEEP),
        }
    }
}

impl From<&BackupSettings> for EngineSettings {
    fn from(settings: &BackupSettings) -> Self {
        Self {
            backups_enabled: settings.enabled,
            keep: settings.keep,
        }
    }
}

/// Per-provider results of a run, in execution order
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct RunResults(Vec<ExecutionResult>);

impl RunResults {
    pub fn get(&self, provider: &str) -> Option<&ExecutionResult> {
        self.0.iter().find(|result| result.provider == provider)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ExecutionResult> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Provider names in execution order.
    pub fn names(&self) -> Vec<&str> {
        self.0.iter().map(|result| result.provider.as_str()).collect()
    }

    fn push(&mut self, result: ExecutionResult) {
        self.0.push(result);
    }
}

impl IntoIterator for RunResults {
    type Item = ExecutionResult;
    type IntoIter = std::vec::IntoIter<ExecutionResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// A run that stopped early
#[derive(Debug, thiserror::Error)]
#[error("{source}")]
pub struct RunError {
    /// Results of the providers that completed before the failure.
    pub results: RunResults,
    #[source]
    pub source: Error,
}

impl RunError {
    fn new(results: RunResults, source: Error) -> Self {
        Self { results, source }
    }
}

/// Runs providers from a registry
pub struct Engine {
    registry: Arc<Registry>,
    backups: BackupManager,
    settings: EngineSettings,
}

impl Engine {
    pub fn new(registry: Arc<Registry>, backups: BackupManager, settings: EngineSettings) -> Self {
        Self {
            registry,
            backups,
            settings,
        }
    }

    /// Build the registry and backup manager described by `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let registry = providers::build_registry(config)?;
        Ok(Self::new(
            Arc::new(registry),
            BackupManager::new(config.backup.dir.clone()),
            EngineSettings::from(&config.backup),
        ))
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn backups(&self) -> &BackupManager {
        &self.backups
    }

    fn resolve(&self, selection: &[String]) -> Result<Vec<Arc<dyn Provider>>> {
        let names = if selection.is_empty() {
            self.registry.list()?
        } else {
            let mut names: Vec<String> = Vec::with_capacity(selection.len());
            for name in selection {
                if !names.contains(name) {
                    names.push(name.clone());
                }
            }
            names
        };

        let providers = names
            .iter()
            .map(|name| self.registry.get(name))
            .collect::<Result<Vec<_>>>()?;
        Ok(ordering::prioritize(providers, |provider| provider.name()))
    }

    fn should_backup(&self, provider: &dyn Provider, options: &RunOptions) -> bool {
        !options.dry_run
            && !options.skip_backup
            && self.settings.backups_enabled
            && provider.is_enabled()
            && provider.needs_backup(options)
    }

    /// Apply the retention limit once a generation has succeeded. The
    /// snapshot just taken always survives.
    fn prune_backups(&self, name: &str) {
        if let Some(keep) = self.settings.keep {
            if let Err(e) = self.backups.clean(name, keep.max(1)) {
                warn!("[{}] pruning old backups failed: {}", name, e);
            }
        }
    }

    /// Reason a provider cannot run in this environment, if any.
    fn skip_reason(provider: &dyn Provider) -> Option<String> {
        if !provider.is_enabled() {
            return Some("provider is disabled".to_string());
        }
        match provider.required_tool() {
            Some(tool) if !tools::is_available(tool) => {
                Some(format!("required tool '{}' was not found on PATH", tool))
            }
            _ => None,
        }
    }

    /// Run the selected providers (all when `selection` is empty).
    pub fn run(
        &self,
        selection: &[String],
        options: &RunOptions,
    ) -> std::result::Result<RunResults, RunError> {
        let mut results = RunResults::default();
        let providers = match self.resolve(selection) {
            Ok(providers) => providers,
            Err(e) => return Err(RunError::new(results, e)),
        };
        let level = options.progress_level();

        for provider in providers {
            let name = provider.name().to_string();

            if let Some(reason) = Self::skip_reason(provider.as_ref()) {
                warn!("Skipping provider '{}': {}", name, reason);
                results.push(ExecutionResult::skipped(&name, reason));
                continue;
            }

            log!(level, "[{}] validating", name);
            if let Err(e) = provider.validate() {
                return Err(RunError::new(results, e.in_provider(&name, "validation")));
            }

            let mut warnings = Vec::new();
            let mut backup_path = None;
            if self.should_backup(provider.as_ref(), options) {
                match provider.backup(&self.backups) {
                    Ok((path, _)) => {
                        log!(level, "[{}] backed up to {}", name, path.display());
                        backup_path = Some(path);
                    }
                    Err(e) => {
                        warn!("[{}] backup failed, continuing without one: {}", name, e);
                        warnings.push(format!("backup failed: {}", e));
                    }
                }
            }

            log!(level, "[{}] generating", name);
            match provider.generate(options) {
                Ok(mut result) => {
                    if backup_path.is_some() {
                        self.prune_backups(&name);
                    }
                    warnings.append(&mut result.warnings);
                    result.warnings = warnings;
                    result.backup_path = backup_path;
                    results.push(result);
                }
                Err(e) => {
                    if let Some(path) = &backup_path {
                        match provider.restore(&self.backups, path) {
                            Ok(()) => info!("[{}] restored previous file after failure", name),
                            Err(restore_error) => {
                                error!("[{}] restore from backup failed: {}", name, restore_error)
                            }
                        }
                    }
                    return Err(RunError::new(results, e.in_provider(&name, "generation")));
                }
            }
        }

        Ok(results)
    }

    /// Validate the selected providers, reporting each outcome.
    ///
    /// Only name resolution can fail the call itself.
    pub fn validate_all(&self, selection: &[String]) -> Result<Vec<(String, Result<()>)>> {
        Ok(self
            .resolve(selection)?
            .into_iter()
            .map(|provider| {
                let name = provider.name().to_string();
                let outcome = provider
                    .validate()
                    .map_err(|e| e.in_provider(&name, "validation"));
                (name, outcome)
            })
            .collect())
    }

    /// Remove one provider's records from its target.
    pub fn clean(&self, name: &str) -> Result<ExecutionResult> {
        let provider = self.registry.get(name)?;
        provider.clean().map_err(|e| e.in_provider(name, "clean"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::{Path, PathBuf};
    use std::sync::Mutex;
    use tempfile::TempDir;

    type CallLog = Arc<Mutex<Vec<String>>>;

    struct MockProvider {
        name: &'static str,
        target: PathBuf,
        enabled: bool,
        tool: Option<&'static str>,
        fail_validate: bool,
        fail_generate: bool,
        calls: CallLog,
    }

    impl MockProvider {
        fn new(name: &'static str, dir: &Path, calls: &CallLog) -> Self {
            Self {
                name,
                target: dir.join(format!("{}.conf", name)),
                enabled: true,
                tool: None,
                fail_validate: false,
                fail_generate: false,
                calls: Arc::clone(calls),
            }
        }
    }

    impl Provider for MockProvider {
        fn name(&self) -> &str {
            self.name
        }
        fn description(&self) -> &str {
            "mock"
        }
        fn target_path(&self) -> &Path {
            &self.target
        }
        fn required_tool(&self) -> Option<&str> {
            self.tool
        }
        fn is_enabled(&self) -> bool {
            self.enabled
        }
        fn validate(&self) -> Result<()> {
            self.calls.lock().unwrap().push(format!("validate:{}", self.name));
            if self.fail_validate {
                return Err(Error::validation(self.name, "bad settings"));
            }
            Ok(())
        }
        fn generate(&self, options: &RunOptions) -> Result<ExecutionResult> {
            self.calls.lock().unwrap().push(format!("generate:{}", self.name));
            if options.dry_run {
                return Ok(ExecutionResult::new(self.name));
            }
            if self.fail_generate {
                fs::write(&self.target, "half written").unwrap();
                return Err(Error::Merge {
                    operation: "mock".to_string(),
                    message: "boom".to_string(),
                });
            }
            fs::write(&self.target, format!("generated by {}\n", self.name)).unwrap();
            let mut result = ExecutionResult::new(self.name);
            result.files_created.push(self.target.clone());
            Ok(result)
        }
        fn clean(&self) -> Result<ExecutionResult> {
            self.calls.lock().unwrap().push(format!("clean:{}", self.name));
            Ok(ExecutionResult::new(self.name))
        }
    }

    struct Fixture {
        dir: TempDir,
        calls: CallLog,
        registry: Arc<Registry>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                dir: TempDir::new().unwrap(),
                calls: CallLog::default(),
                registry: Arc::new(Registry::new()),
            }
        }

        fn mock(&self, name: &'static str) -> MockProvider {
            MockProvider::new(name, self.dir.path(), &self.calls)
        }

        fn add(&self, provider: MockProvider) {
            self.registry.register(Arc::new(provider)).unwrap();
        }

        fn engine(&self, settings: EngineSettings) -> Engine {
            Engine::new(
                Arc::clone(&self.registry),
                BackupManager::new(self.dir.path().join("backups")),
                settings,
            )
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn generated(&self) -> Vec<String> {
            self.calls()
                .into_iter()
                .filter_map(|call| call.strip_prefix("generate:").map(str::to_string))
                .collect()
        }
    }

    fn names(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_run_all_sorted_with_aws_first() {
        let fixture = Fixture::new();
        for name in ["ssh", "steampipe", "aws", "kubeconfig"] {
            fixture.add(fixture.mock(name));
        }

        let results = fixture
            .engine(EngineSettings::default())
            .run(&[], &RunOptions::default())
            .unwrap();

        assert_eq!(results.names(), vec!["aws", "kubeconfig", "ssh", "steampipe"]);
        assert_eq!(fixture.generated(), vec!["aws", "kubeconfig", "ssh", "steampipe"]);
    }

    #[test]
    fn test_explicit_selection_keeps_order_after_priority() {
        let fixture = Fixture::new();
        for name in ["ssh", "steampipe", "aws"] {
            fixture.add(fixture.mock(name));
        }

        let results = fixture
            .engine(EngineSettings::default())
            .run(&names(&["steampipe", "ssh", "aws", "ssh"]), &RunOptions::default())
            .unwrap();

        assert_eq!(results.names(), vec!["aws", "steampipe", "ssh"]);
    }

    #[test]
    fn test_unknown_provider_aborts_before_side_effects() {
        let fixture = Fixture::new();
        fixture.add(fixture.mock("ssh"));

        let err = fixture
            .engine(EngineSettings::default())
            .run(&names(&["ssh", "nope"]), &RunOptions::default())
            .unwrap_err();

        assert!(matches!(err.source, Error::ProviderNotFound { ref name } if name == "nope"));
        assert!(err.results.is_empty());
        assert!(fixture.calls().is_empty());
    }

    #[test]
    fn test_disabled_provider_is_skipped() {
        let fixture = Fixture::new();
        let mut ssh = fixture.mock("ssh");
        ssh.enabled = false;
        fixture.add(ssh);

        let results = fixture
            .engine(EngineSettings::default())
            .run(&[], &RunOptions::default())
            .unwrap();

        let result = results.get("ssh").unwrap();
        assert!(result.is_skipped());
        assert_eq!(result.warnings, vec!["provider is disabled"]);
        assert!(fixture.calls().is_empty());
    }

    #[test]
    fn test_missing_tool_is_skipped_with_warning() {
        testing_logger::setup();
        let fixture = Fixture::new();
        let mut kube = fixture.mock("kubeconfig");
        kube.tool = Some("cfgweave-missing-tool-91c3");
        fixture.add(kube);
        fixture.add(fixture.mock("ssh"));

        let results = fixture
            .engine(EngineSettings::default())
            .run(&[], &RunOptions::default())
            .unwrap();

        assert!(results.get("kubeconfig").unwrap().is_skipped());
        assert!(!results.get("ssh").unwrap().is_skipped());
        assert_eq!(fixture.generated(), vec!["ssh"]);
        testing_logger::validate(|captured| {
            assert!(captured.iter().any(|entry| entry.level == log::Level::Warn
                && entry.body.contains("cfgweave-missing-tool-91c3")));
        });
    }

    #[test]
    fn test_validation_failure_returns_partial_results() {
        let fixture = Fixture::new();
        fixture.add(fixture.mock("aws"));
        let mut ssh = fixture.mock("ssh");
        ssh.fail_validate = true;
        fixture.add(ssh);
        fixture.add(fixture.mock("steampipe"));

        let err = fixture
            .engine(EngineSettings::default())
            .run(&[], &RunOptions::default())
            .unwrap_err();

        assert_eq!(err.results.names(), vec!["aws"]);
        assert!(matches!(
            err.source,
            Error::Provider { ref provider, ref operation, .. }
                if provider == "ssh" && operation == "validation"
        ));
        assert_eq!(fixture.generated(), vec!["aws"]);
    }

    #[test]
    fn test_generation_failure_restores_backup() {
        let fixture = Fixture::new();
        let mut ssh = fixture.mock("ssh");
        ssh.fail_generate = true;
        let target = ssh.target.clone();
        fs::write(&target, "original\n").unwrap();
        fixture.add(ssh);

        let err = fixture
            .engine(EngineSettings::default())
            .run(&[], &RunOptions::default())
            .unwrap_err();

        assert_eq!(fs::read_to_string(&target).unwrap(), "original\n");
        assert!(err.to_string().contains("generation failed for provider 'ssh'"));
        assert!(err.results.is_empty());
    }

    #[test]
    fn test_failed_generation_restores_with_zero_retention() {
        let fixture = Fixture::new();
        let mut ssh = fixture.mock("ssh");
        ssh.fail_generate = true;
        let target = ssh.target.clone();
        fs::write(&target, "original\n").unwrap();
        fixture.add(ssh);
        let engine = fixture.engine(EngineSettings {
            backups_enabled: true,
            keep: Some(0),
        });

        assert!(engine.run(&[], &RunOptions::default()).is_err());
        assert_eq!(fs::read_to_string(&target).unwrap(), "original\n");
        assert_eq!(engine.backups().list("ssh").unwrap().len(), 1);
    }

    #[test]
    fn test_zero_retention_keeps_latest_snapshot() {
        let fixture = Fixture::new();
        let ssh = fixture.mock("ssh");
        fs::write(&ssh.target, "original\n").unwrap();
        fixture.add(ssh);
        let engine = fixture.engine(EngineSettings {
            backups_enabled: true,
            keep: Some(0),
        });

        let results = engine.run(&[], &RunOptions::default()).unwrap();
        let backup = results.get("ssh").unwrap().backup_path.clone().unwrap();
        assert!(backup.exists());
        assert_eq!(engine.backups().list("ssh").unwrap().len(), 1);
    }

    #[test]
    fn test_backup_taken_and_pruned() {
        let fixture = Fixture::new();
        let ssh = fixture.mock("ssh");
        let target = ssh.target.clone();
        fs::write(&target, "original\n").unwrap();
        fixture.add(ssh);
        let engine = fixture.engine(EngineSettings {
            backups_enabled: true,
            keep: Some(1),
        });

        let first = engine.run(&[], &RunOptions::default()).unwrap();
        let backup = first.get("ssh").unwrap().backup_path.clone().unwrap();
        assert_eq!(fs::read_to_string(&backup).unwrap(), "original\n");

        engine.run(&[], &RunOptions::default()).unwrap();
        assert_eq!(engine.backups().list("ssh").unwrap().len(), 1);
    }

    #[test]
    fn test_no_backup_for_new_target() {
        let fixture = Fixture::new();
        fixture.add(fixture.mock("ssh"));
        let results = fixture
            .engine(EngineSettings::default())
            .run(&[], &RunOptions::default())
            .unwrap();
        assert!(results.get("ssh").unwrap().backup_path.is_none());
    }

    #[test]
    fn test_no_backup_when_dry_run_skipped_or_disabled() {
        let fixture = Fixture::new();
        let ssh = fixture.mock("ssh");
        fs::write(&ssh.target, "original\n").unwrap();
        fixture.add(ssh);

        let dry_run = RunOptions {
            dry_run: true,
            ..RunOptions::default()
        };
        let skip = RunOptions {
            skip_backup: true,
            ..RunOptions::default()
        };
        let disabled = EngineSettings {
            backups_enabled: false,
            keep: None,
        };

        for (settings, options) in [
            (EngineSettings::default(), dry_run),
            (EngineSettings::default(), skip),
            (disabled, RunOptions::default()),
        ] {
            let results = fixture.engine(settings).run(&[], &options).unwrap();
            assert!(results.get("ssh").unwrap().backup_path.is_none());
        }
        assert!(!fixture.dir.path().join("backups").exists());
    }

    #[test]
    fn test_backup_failure_is_a_warning() {
        let fixture = Fixture::new();
        let ssh = fixture.mock("ssh");
        fs::write(&ssh.target, "original\n").unwrap();
        fixture.add(ssh);
        // A file where the backup root should be makes every snapshot fail.
        fs::write(fixture.dir.path().join("backups"), "not a directory").unwrap();

        let results = fixture
            .engine(EngineSettings::default())
            .run(&[], &RunOptions::default())
            .unwrap();

        let result = results.get("ssh").unwrap();
        assert!(result.backup_path.is_none());
        assert!(result.warnings[0].starts_with("backup failed"));
        assert_eq!(fixture.generated(), vec!["ssh"]);
    }

    #[test]
    fn test_validate_all_reports_each_provider() {
        let fixture = Fixture::new();
        fixture.add(fixture.mock("aws"));
        let mut ssh = fixture.mock("ssh");
        ssh.fail_validate = true;
        fixture.add(ssh);

        let report = fixture
            .engine(EngineSettings::default())
            .validate_all(&[])
            .unwrap();

        assert_eq!(report.len(), 2);
        assert!(report[0].1.is_ok());
        assert_eq!(report[1].0, "ssh");
        assert!(report[1].1.is_err());
        assert!(fixture.generated().is_empty());
    }

    #[test]
    fn test_clean_passes_through() {
        let fixture = Fixture::new();
        fixture.add(fixture.mock("ssh"));
        let engine = fixture.engine(EngineSettings::default());

        engine.clean("ssh").unwrap();
        assert_eq!(fixture.calls(), vec!["clean:ssh"]);
        assert!(matches!(
            engine.clean("nope"),
            Err(Error::ProviderNotFound { .. })
        ));
    }

    #[test]
    fn test_engine_settings_from_backup_settings() {
        let settings = BackupSettings {
            enabled: false,
            dir: PathBuf::from("/tmp/backups"),
            keep: Some(3),
        };
        assert_eq!(
            EngineSettings::from(&settings),
            EngineSettings {
                backups_enabled: false,
                keep: Some(3),
            }
        );
    }
}
