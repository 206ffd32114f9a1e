//! Shared test utilities for integration and E2E tests.
//!
//! Add `mod common;` to a test file, then build a [`TestFixture`]. Every
//! target file lives below the fixture's temporary directory and external
//! tool checks are switched off (`tool: ~`).

use assert_fs::prelude::*;
use std::path::{Path, PathBuf};

/// Re-export commonly used test dependencies for convenience.
#[allow(unused_imports)]
pub mod prelude {
    pub use assert_cmd::cargo::cargo_bin_cmd;
    pub use assert_fs::prelude::*;
    pub use predicates::prelude::*;

    pub use super::TestFixture;
}

/// Configuration enabling all four providers below `{root}`.
pub const FULL_CONFIG: &str = r#"
backup:
  dir: {root}/backups
  keep: 2
providers:
  aws:
    path: {root}/aws/config
    tool: ~
    sso_session:
      name: corp
      start_url: https://corp.awsapps.com/start
      region: us-east-1
    accounts:
      - id: "111111111111"
        name: prod
        roles: [Admin, ReadOnly]
      - id: "222222222222"
        name: dev
        roles: [Admin]
  steampipe:
    path: {root}/steampipe/aws.spc
    tool: ~
    aws_config: {root}/aws/config
    preferred_roles: [ReadOnly]
    aggregator: aws_all
  ssh:
    path: {root}/ssh/config
    tool: ~
    global:
      ServerAliveInterval: "60"
    hosts:
      - pattern: bastion
        hostname: bastion.example.com
        user: ops
  kubeconfig:
    path: {root}/kube/config
    tool: ~
    clusters:
      - name: prod
        server: https://prod.eks.example.com
        region: us-east-1
        profile: prod/Admin
"#;

/// A temporary directory holding a configuration file and target files.
pub struct TestFixture {
    temp_dir: assert_fs::TempDir,
}

#[allow(dead_code)]
impl TestFixture {
    /// Create a fixture with an empty temporary directory.
    pub fn new() -> Self {
        Self {
            temp_dir: assert_fs::TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Write `config.yaml`, substituting `{root}` with the fixture path.
    pub fn with_config(self, template: &str) -> Self {
        let content = template.replace("{root}", &self.path().display().to_string());
        self.temp_dir
            .child("config.yaml")
            .write_str(&content)
            .expect("Failed to write config file");
        self
    }

    /// Write the configuration enabling every provider.
    pub fn with_full_config(self) -> Self {
        self.with_config(FULL_CONFIG)
    }

    /// Add a file below the fixture root.
    pub fn with_file(self, path: &str, content: &str) -> Self {
        self.temp_dir
            .child(path)
            .write_str(content)
            .expect("Failed to write file");
        self
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn config_path(&self) -> PathBuf {
        self.path().join("config.yaml")
    }

    pub fn child(&self, path: &str) -> assert_fs::fixture::ChildPath {
        self.temp_dir.child(path)
    }

    /// Read a file below the fixture root.
    pub fn read(&self, path: &str) -> String {
        std::fs::read_to_string(self.path().join(path))
            .unwrap_or_else(|e| panic!("Failed to read {}: {}", path, e))
    }

    /// Load the fixture configuration through the library.
    pub fn load(&self) -> cfgweave::config::Config {
        cfgweave::config::from_file(self.config_path()).expect("Failed to load config")
    }

    /// A CLI command pointed at the fixture configuration.
    pub fn command(&self) -> assert_cmd::Command {
        let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("cfgweave");
        cmd.current_dir(self.path())
            .env_remove("RUST_LOG")
            .arg("--config")
            .arg(self.config_path());
        cmd
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}
