//! Command-line tests for the `hd` binary

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

fn hd(temp: &TempDir) -> Command {
    let config = temp.path().join("homedaemon.yml");
    std::fs::write(
        &config,
        format!("ipc:\n  socket-path: {}\n", temp.path().join("daemon.sock").display()),
    )
    .unwrap();

    let mut cmd = Command::cargo_bin("hd").unwrap();
    cmd.env("XDG_DATA_HOME", temp.path()).arg("--config").arg(config);
    cmd
}

#[test]
fn test_help_lists_commands() {
    let temp = TempDir::new().unwrap();
    hd(&temp)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("serve").and(predicate::str::contains("record")));
}

#[test]
fn test_ping_without_daemon() {
    let temp = TempDir::new().unwrap();
    hd(&temp)
        .arg("ping")
        .assert()
        .success()
        .stdout(predicate::str::contains("not running"));
}

#[test]
fn test_record_rejects_malformed_reading() {
    let temp = TempDir::new().unwrap();
    hd(&temp)
        .args(["record", "kitchen", "dev1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("DEVICE=VALUE"));
}

#[test]
fn test_client_command_fails_without_daemon() {
    let temp = TempDir::new().unwrap();
    hd(&temp).args(["homes"]).assert().failure();
}
