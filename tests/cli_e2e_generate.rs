//! End-to-end tests for the `generate` command.
//!
//! These invoke the compiled binary against a temporary configuration.
//!
//! ```bash
//! cargo test --features integration-tests --test cli_e2e_generate
//! ```

mod common;

use common::prelude::*;

#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_generate_all_providers() {
    let fixture = TestFixture::new().with_full_config();

    fixture
        .command()
        .args(["--color", "never", "generate"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[OK] aws: wrote"))
        .stdout(predicate::str::contains("[OK] steampipe: wrote"));

    fixture
        .child("ssh/config")
        .assert(predicate::str::starts_with("Host bastion\n"));
    fixture
        .child("steampipe/aws.spc")
        .assert(predicate::str::contains("connection \"aws_all\""));
}

#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_generate_twice_reports_up_to_date() {
    let fixture = TestFixture::new().with_full_config();
    fixture.command().arg("generate").assert().success();

    fixture
        .command()
        .args(["--color", "never", "generate", "ssh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[SAME] ssh:"));
}

#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_generate_dry_run() {
    let fixture = TestFixture::new().with_full_config();

    fixture
        .command()
        .args(["--color", "never", "generate", "--dry-run", "ssh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("DRY RUN MODE"))
        .stdout(predicate::str::contains("[DRY] ssh: would write"));

    fixture.child("ssh/config").assert(predicate::path::missing());
}

#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_generate_json_report() {
    let fixture = TestFixture::new().with_full_config();

    let output = fixture
        .command()
        .args(["generate", "ssh", "--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report[0]["provider"], "ssh");
    assert_eq!(report[0]["metadata"]["host_count"], 1);
}

#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_generate_unknown_provider_fails() {
    let fixture = TestFixture::new().with_full_config();

    fixture
        .command()
        .args(["generate", "nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Provider 'nope' not found"));
}

#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_generate_missing_config_fails() {
    let fixture = TestFixture::new();

    fixture
        .command()
        .arg("generate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Configuration file not found"));
}

#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_validate_reports_failures() {
    let fixture = TestFixture::new().with_config(
        r#"
providers:
  aws:
    path: {root}/aws/config
    tool: ~
    sso_session:
      name: corp
      start_url: http://insecure.example.com
      region: us-east-1
"#,
    );

    fixture
        .command()
        .args(["--color", "never", "validate"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("[FAIL]"))
        .stderr(predicate::str::contains("1 of 1 providers failed validation"));
}

#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_clean_then_backups_list() {
    let fixture = TestFixture::new()
        .with_full_config()
        .with_file("ssh/config", "Host home\n    User me\n");
    fixture.command().args(["generate", "ssh"]).assert().success();

    fixture
        .command()
        .args(["--color", "never", "clean", "ssh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("removed 1 generated records"));
    fixture
        .child("ssh/config")
        .assert(predicate::str::contains("Host bastion").not());

    fixture
        .command()
        .args(["backups", "list", "ssh"])
        .assert()
        .success()
        .stdout(predicate::str::contains(".backup"));
}

#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_providers_listing() {
    let fixture = TestFixture::new().with_full_config();

    fixture
        .command()
        .args(["--color", "never", "providers"])
        .assert()
        .success()
        .stdout(predicate::str::contains("kubeconfig"))
        .stdout(predicate::str::contains("ready"));
}

#[test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
fn test_completions_bash() {
    cargo_bin_cmd!("cfgweave")
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("cfgweave"));
}
