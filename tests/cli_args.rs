//! Integration tests for CLI argument handling
//!
//! Runs the productwall binary for the subcommands that don't need a
//! terminal.

use std::process::Command;

use tempfile::TempDir;

/// Helper to run the CLI with given args and capture output
fn run_cli(args: &[&str]) -> std::process::Output {
    Command::new(env!("CARGO_BIN_EXE_productwall"))
        .args(args)
        .env_remove("SHOPIFY_STORE_URL")
        .env_remove("SHOPIFY_ACCESS_TOKEN")
        .env_remove("PRODUCTWALL_CONFIG")
        .output()
        .expect("Failed to execute productwall")
}

#[test]
fn test_help_flag_exits_successfully() {
    let output = run_cli(&["--help"]);
    assert!(
        output.status.success(),
        "Expected --help to exit successfully"
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("productwall"), "Help should mention productwall");
    assert!(stdout.contains("sync"), "Help should list the sync command");
    assert!(stdout.contains("bump-version"), "Help should list bump-version");
}

#[test]
fn test_sync_help_lists_credentials() {
    let output = run_cli(&["sync", "--help"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("--store-url"));
    assert!(stdout.contains("--access-token"));
}

#[test]
fn test_sync_without_credentials_fails() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let output_dir = temp_dir.path().join("data");
    let output = run_cli(&["sync", "--output-dir", output_dir.to_str().unwrap()]);

    assert!(!output.status.success(), "Expected sync without credentials to fail");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("SHOPIFY_STORE_URL"),
        "Should name the missing setting: {}",
        stderr
    );
    assert!(!output_dir.exists(), "Nothing should be written");
}

#[test]
fn test_bump_version_requires_config() {
    let output = run_cli(&["bump-version"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.to_lowercase().contains("config"),
        "Should ask for a config file: {}",
        stderr
    );
}

#[test]
fn test_bump_version_rewrites_config_file() {
    let temp_dir = TempDir::new().expect("Failed to create temp directory");
    let path = temp_dir.path().join("wall.json");
    std::fs::write(&path, r#"{"worker": {"version": "v7"}}"#).unwrap();

    let output = run_cli(&["bump-version", "--config", path.to_str().unwrap()]);

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("v7 -> v8"), "Unexpected output: {}", stdout);
    let written = std::fs::read_to_string(&path).unwrap();
    assert!(written.contains("\"v8\""));
}

#[test]
fn test_unknown_subcommand_fails() {
    let output = run_cli(&["frobnicate"]);
    assert!(!output.status.success());
}
