//! ABOUTME: End-to-end CLI tests exercising the built `aris` binary
//! ABOUTME: assert_cmd + tempdir pattern, one temp data dir per test

use assert_cmd::Command;
use predicates::prelude::*;
use serial_test::serial;
use tempfile::tempdir;

#[test]
fn test_cli_help() {
    let mut cmd = Command::cargo_bin("aris").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Autonomous multi-hop research"));
}

#[test]
fn test_cli_version() {
    let mut cmd = Command::cargo_bin("aris").unwrap();
    cmd.arg("--version").assert().success();
}

#[test]
fn test_research_command_help() {
    let mut cmd = Command::cargo_bin("aris").unwrap();
    cmd.arg("research")
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--depth"));
}

#[test]
fn test_invalid_depth_rejected() {
    let mut cmd = Command::cargo_bin("aris").unwrap();
    cmd.arg("research")
        .arg("what is rust")
        .arg("--depth")
        .arg("extreme")
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid value 'extreme'"));
}

#[test]
#[serial]
fn test_cost_estimate_runs_without_touching_stores() {
    let dir = tempdir().unwrap();
    let mut cmd = Command::cargo_bin("aris").unwrap();
    cmd.arg("--data-dir")
        .arg(dir.path())
        .arg("cost")
        .arg("estimate")
        .arg("what is semantic search?")
        .arg("--depth")
        .arg("standard")
        .assert()
        .success()
        .stdout(predicate::str::contains("estimated cost"));
}

#[test]
#[serial]
fn test_session_list_on_empty_store() {
    let dir = tempdir().unwrap();
    let mut cmd = Command::cargo_bin("aris").unwrap();
    cmd.arg("--data-dir")
        .arg(dir.path())
        .arg("session")
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("no sessions found"));
}

#[test]
#[serial]
fn test_session_show_unknown_id_is_user_error() {
    let dir = tempdir().unwrap();
    let mut cmd = Command::cargo_bin("aris").unwrap();
    cmd.arg("--data-dir")
        .arg(dir.path())
        .arg("session")
        .arg("show")
        .arg("not-a-valid-session-id")
        .assert()
        .code(1);
}

#[test]
#[serial]
fn test_research_then_session_show_round_trips() {
    let dir = tempdir().unwrap();

    let research = Command::cargo_bin("aris")
        .unwrap()
        .arg("--data-dir")
        .arg(dir.path())
        .arg("--output")
        .arg("json")
        .arg("research")
        .arg("what is semantic search?")
        .arg("--depth")
        .arg("quick")
        .arg("--max-cost")
        .arg("0.50")
        .output()
        .unwrap();
    assert!(research.status.success(), "research command failed: {research:?}");

    let stdout = String::from_utf8(research.stdout).unwrap();
    let outcome: serde_json::Value = serde_json::from_str(stdout.trim()).expect("research prints JSON outcome");
    let session_id = outcome["session_id"].as_str().unwrap();

    let mut show = Command::cargo_bin("aris").unwrap();
    show.arg("--data-dir")
        .arg(dir.path())
        .arg("session")
        .arg("show")
        .arg(session_id)
        .assert()
        .success()
        .stdout(predicate::str::contains("semantic search"));
}
