//! Smoke tests for the prefapply CLI.
//!
//! These verify the argument surface and startup behavior. The
//! reconciliation paths are covered by `reconcile_test`, which drives the
//! library API against a temporary home so the tests run on any platform.

use assert_cmd::Command;
use predicates::prelude::*;

/// Get a Command for the prefapply binary.
fn prefapply() -> Command {
    Command::new(env!("CARGO_BIN_EXE_prefapply"))
}

#[test]
fn test_version_flag() {
    prefapply()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("prefapply"))
        .stdout(predicate::str::contains("0.1.0"));
}

#[test]
fn test_help_flag() {
    prefapply()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage:"))
        .stdout(predicate::str::contains("--dry-run"))
        .stdout(predicate::str::contains("--exit-code"));
}

#[test]
fn test_help_flag_short() {
    prefapply()
        .arg("-h")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage:"));
}

#[test]
fn test_invalid_flag() {
    prefapply().arg("--no-such-flag").assert().failure();
}

#[cfg(not(target_os = "macos"))]
#[test]
fn test_wrong_platform_is_fatal() {
    prefapply()
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("only works on macOS"));
}

#[cfg(target_os = "macos")]
#[test]
fn test_missing_path_is_fatal() {
    prefapply()
        .arg("/nonexistent/prefapply-test-path")
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("not found"));
}

#[cfg(target_os = "macos")]
#[test]
fn test_dry_run_on_empty_directory_succeeds() {
    let dir = tempfile::TempDir::new().unwrap();
    prefapply()
        .arg(dir.path())
        .arg("--dry-run")
        .assert()
        .success();
}
