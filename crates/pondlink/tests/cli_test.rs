//! Integration tests for the `pond` CLI binary.
//!
//! These tests validate argument parsing, help output, shell completions,
//! and error handling — all without requiring a live appliance.
#![allow(clippy::unwrap_used)]

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `pond` binary with env isolation.
///
/// Clears all `POND_*` env vars and points config directories at a
/// nonexistent path so tests never touch the user's real configuration.
fn pond_cmd() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("pond");
    cmd.env("HOME", "/tmp/pond-cli-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/pond-cli-test-nonexistent")
        .env("XDG_DATA_HOME", "/tmp/pond-cli-test-nonexistent")
        .env_remove("POND_OWNER")
        .env_remove("POND_OUTPUT")
        .env_remove("POND_WIFI_PASSPHRASE")
        .env_remove("POND_REGISTRY_DIR")
        .env_remove("POND_MONITOR_INTERVAL_SECS");
    cmd
}

/// Concatenate stdout + stderr from a command output for flexible matching.
fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let output = pond_cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(
        text.contains("Usage"),
        "Expected 'Usage' in output:\n{text}"
    );
}

#[test]
fn test_help_flag() {
    pond_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("relay appliances")
            .and(predicate::str::contains("provision"))
            .and(predicate::str::contains("devices"))
            .and(predicate::str::contains("monitor")),
    );
}

#[test]
fn test_version_flag() {
    pond_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("pond"));
}

// ── Shell completions ───────────────────────────────────────────────

#[test]
fn test_completions_bash() {
    pond_cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

#[test]
fn test_completions_zsh() {
    pond_cmd()
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#compdef"));
}

#[test]
fn test_completions_fish() {
    pond_cmd()
        .args(["completions", "fish"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

// ── Error cases ─────────────────────────────────────────────────────

#[test]
fn test_invalid_subcommand() {
    let output = pond_cmd().arg("foobar").output().unwrap();
    assert!(
        !output.status.success(),
        "Expected failure for invalid subcommand"
    );
    let text = combined_output(&output);
    assert!(
        text.contains("invalid") || text.contains("unrecognized") || text.contains("foobar"),
        "Expected error mentioning invalid subcommand:\n{text}"
    );
}

#[test]
fn test_devices_list_no_owner() {
    // Without an owner from config, flag, or env the fleet cannot be
    // scoped, so the command must fail with actionable guidance.
    pond_cmd()
        .args(["devices", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("owner").or(predicate::str::contains("No owner")));
}

#[test]
fn test_config_show_no_config() {
    // `config show` uses load_config_or_default() so it succeeds even
    // when no config file exists — it just renders the default config.
    pond_cmd().args(["config", "show"]).assert().success();
}

#[test]
fn test_config_path_prints_something() {
    pond_cmd()
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));
}

#[test]
fn test_invalid_output_format() {
    let output = pond_cmd()
        .args(["--output", "invalid", "devices", "list"])
        .output()
        .unwrap();
    assert!(
        !output.status.success(),
        "Expected failure for invalid output format"
    );
    let text = combined_output(&output);
    assert!(
        text.contains("invalid")
            || text.contains("possible values")
            || text.contains("valid value"),
        "Expected error about valid output formats:\n{text}"
    );
}

#[test]
fn test_toggle_rejects_bad_state() {
    let output = pond_cmd()
        .args(["toggle", "some-id", "pump", "sideways"])
        .output()
        .unwrap();
    assert!(
        !output.status.success(),
        "Expected failure for bad relay state"
    );
    let text = combined_output(&output);
    assert!(
        text.contains("possible values") || text.contains("invalid"),
        "Expected clap to reject the state value:\n{text}"
    );
}

#[test]
fn test_provision_requires_site_and_ssid() {
    let output = pond_cmd().arg("provision").output().unwrap();
    assert!(
        !output.status.success(),
        "Expected failure for provision without required args"
    );
    let text = combined_output(&output);
    assert!(
        text.contains("--site") || text.contains("--ssid") || text.contains("required"),
        "Expected error about missing required args:\n{text}"
    );
}

// ── Subcommand help discovery ───────────────────────────────────────

#[test]
fn test_devices_subcommands_exist() {
    pond_cmd()
        .args(["devices", "--help"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("list")
                .and(predicate::str::contains("show"))
                .and(predicate::str::contains("remove")),
        );
}

#[test]
fn test_config_subcommands_exist() {
    pond_cmd()
        .args(["config", "--help"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("init")
                .and(predicate::str::contains("show"))
                .and(predicate::str::contains("path")),
        );
}

#[test]
fn test_provision_help_lists_wifi_flags() {
    pond_cmd()
        .args(["provision", "--help"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("--ssid")
                .and(predicate::str::contains("--passphrase"))
                .and(predicate::str::contains("--device-ap")),
        );
}
