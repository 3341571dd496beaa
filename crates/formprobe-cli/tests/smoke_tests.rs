//! Smoke tests for the formprobe CLI
//!
//! None of these launch a browser: they cover argument parsing, the
//! configuration layer and the exit codes of failures that happen first.

#![allow(deprecated)] // Allow deprecated Command::cargo_bin until assert_cmd is updated
#![allow(clippy::expect_used, clippy::unwrap_used)]

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;

/// Get a command for the formprobe binary
fn formprobe() -> Command {
    let mut cmd = Command::cargo_bin("formprobe").expect("formprobe binary should exist");
    cmd.env_remove("FORMPROBE_CONFIG").env_remove("RUST_LOG");
    cmd
}

// ============================================================================
// Basic CLI Tests
// ============================================================================

#[test]
fn test_version_flag() {
    formprobe()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("0.4.0"));
}

#[test]
fn test_help_flag() {
    formprobe()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("logic"))
        .stdout(predicate::str::contains("negative"))
        .stdout(predicate::str::contains("positive"));
}

#[test]
fn test_no_args_fails() {
    formprobe().assert().failure();
}

// ============================================================================
// Subcommand Help Tests
// ============================================================================

#[test]
fn test_logic_help() {
    formprobe()
        .args(["logic", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--page"))
        .stdout(predicate::str::contains("--json"));
}

#[test]
fn test_positive_help() {
    formprobe()
        .args(["positive", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--no-sandbox"));
}

// ============================================================================
// Configuration Tests
// ============================================================================

#[test]
fn test_config_shows_defaults() {
    formprobe()
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("page: index.html"))
        .stdout(predicate::str::contains("timeout_ms: 4000"))
        .stdout(predicate::str::contains("Hyderabad"));
}

#[test]
fn test_config_applies_flags_over_file() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("run.yaml");
    fs::write(&path, "timeout_ms: 9000\nprofile:\n  city: Warangal\n").unwrap();

    formprobe()
        .arg("config")
        .arg("--config")
        .arg(&path)
        .args(["--timeout-ms", "3000", "--headed"])
        .assert()
        .success()
        .stdout(predicate::str::contains("timeout_ms: 3000"))
        .stdout(predicate::str::contains("headless: false"))
        .stdout(predicate::str::contains("Warangal"));
}

#[test]
fn test_malformed_config_exits_2() {
    let tmp = TempDir::new().unwrap();
    let path = tmp.path().join("bad.yaml");
    fs::write(&path, "timeout_ms: [1, 2").unwrap();

    formprobe()
        .args(["logic", "--config"])
        .arg(&path)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Error"));
}

#[test]
fn test_invalid_values_exit_2() {
    formprobe()
        .args(["negative", "--timeout-ms", "10", "--poll-interval-ms", "500"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("timeout_ms"));
}

#[test]
fn test_missing_page_exits_2() {
    let tmp = TempDir::new().unwrap();
    let missing = tmp.path().join("nowhere.html");

    formprobe()
        .arg("positive")
        .arg("--page")
        .arg(&missing)
        .assert()
        .code(2)
        .stdout(predicate::str::is_empty());
}
