//! CLI integration tests for the runwarden command-line interface.
//!
//! These exercise argument parsing, the phase calculator and config
//! discovery. None of them start long-running controllers.

use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Get a command for the runwarden binary, isolated from the user's config.
fn runwarden(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("runwarden").unwrap();
    cmd.current_dir(dir.path())
        .env("RUNWARDEN_CONFIG_DIR", dir.path().join("user"))
        .env_remove("RUNWARDEN_CONFIG")
        .env_remove("RUST_LOG");
    cmd
}

fn write(dir: &TempDir, name: &str, contents: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, contents).unwrap();
    path
}

// ─────────────────────────────────────────────────────────────────────────────
// Help and Version Tests
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_help_lists_subcommands() {
    let dir = TempDir::new().unwrap();
    runwarden(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("workflow run controller"))
        .stdout(predicate::str::contains("start"))
        .stdout(predicate::str::contains("phase"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_version_displays() {
    let dir = TempDir::new().unwrap();
    runwarden(&dir)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("runwarden"));
}

#[test]
fn test_unknown_subcommand_rejected() {
    let dir = TempDir::new().unwrap();
    runwarden(&dir).arg("frobnicate").assert().failure();
}

// ─────────────────────────────────────────────────────────────────────────────
// Phase
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_phase_mixed_succeeded_pending_is_running() {
    let dir = TempDir::new().unwrap();
    let file = write(&dir, "stages.json", r#"{"build": "Succeeded", "test": "Pending"}"#);
    runwarden(&dir)
        .arg("phase")
        .arg(&file)
        .assert()
        .success()
        .stdout("Running\n");
}

#[test]
fn test_phase_running_dominates_failed() {
    let dir = TempDir::new().unwrap();
    let file = write(&dir, "stages.json", r#"{"a": "Failed", "b": "Running"}"#);
    runwarden(&dir)
        .arg("phase")
        .arg(&file)
        .assert()
        .success()
        .stdout("Running\n");
}

#[test]
fn test_phase_empty_is_pending() {
    let dir = TempDir::new().unwrap();
    let file = write(&dir, "stages.json", "{}");
    runwarden(&dir)
        .arg("phase")
        .arg(&file)
        .assert()
        .success()
        .stdout("Pending\n");
}

#[test]
fn test_phase_json_output() {
    let dir = TempDir::new().unwrap();
    let file = write(&dir, "stages.json", r#"{"a": "Succeeded", "b": "Failed"}"#);
    runwarden(&dir)
        .args(["--json", "phase"])
        .arg(&file)
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""phase": "Failed""#))
        .stdout(predicate::str::contains(r#""stages": 2"#));
}

#[test]
fn test_phase_rejects_unknown_phase() {
    let dir = TempDir::new().unwrap();
    let file = write(&dir, "stages.json", r#"{"a": "Exploded"}"#);
    runwarden(&dir)
        .arg("phase")
        .arg(&file)
        .assert()
        .failure()
        .stderr(predicate::str::contains("parsing stage phases"));
}

#[test]
fn test_phase_missing_file() {
    let dir = TempDir::new().unwrap();
    runwarden(&dir)
        .args(["phase", "nope.json"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("reading"));
}

// ─────────────────────────────────────────────────────────────────────────────
// Config
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_config_show_defaults() {
    let dir = TempDir::new().unwrap();
    runwarden(&dir)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No config files loaded"))
        .stdout(predicate::str::contains("max_queue_size = 5"))
        .stdout(predicate::str::contains("workers = 2"));
}

#[test]
fn test_config_show_project_overrides_user() {
    let dir = TempDir::new().unwrap();
    write(&dir, "user/config.toml", "[history]\nmax_queue_size = 7\n");
    write(&dir, "runwarden.toml", "[history]\nmax_queue_size = 9\n");
    runwarden(&dir)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("max_queue_size = 9"));
}

#[test]
fn test_config_show_json() {
    let dir = TempDir::new().unwrap();
    write(&dir, "runwarden.toml", "[controller]\nworkers = 4\n");
    runwarden(&dir)
        .args(["--json", "config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""workers": 4"#));
}

#[test]
fn test_config_path_reports_layers() {
    let dir = TempDir::new().unwrap();
    write(&dir, "runwarden.toml", "");
    runwarden(&dir)
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml (not found)"))
        .stdout(predicate::str::contains("runwarden.toml (loaded)"));
}

// ─────────────────────────────────────────────────────────────────────────────
// Start
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_start_rejects_zero_workers() {
    let dir = TempDir::new().unwrap();
    runwarden(&dir)
        .args(["start", "--workers", "0"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("controller.workers"));
}

#[test]
fn test_start_rejects_invalid_config_file() {
    let dir = TempDir::new().unwrap();
    let config = write(&dir, "bad.toml", "[history]\nmax_queue_size = 0\n");
    runwarden(&dir)
        .arg("start")
        .arg("--config")
        .arg(&config)
        .assert()
        .failure()
        .stderr(predicate::str::contains("history.max_queue_size"));
}

#[test]
fn test_start_missing_config_file() {
    let dir = TempDir::new().unwrap();
    runwarden(&dir)
        .args(["start", "--config", "missing.toml"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("loading config"));
}
