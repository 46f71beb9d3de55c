use std::fs;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

#[test]
fn unknown_config_key_is_rejected() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("policy.yaml");
    fs::write(&path, "kill_calls: [ptrace]\nallow_everything: true\n")?;

    Command::cargo_bin("syscage")?
        .arg("--config")
        .arg(&path)
        .args(["--", "true"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("syscage: failed to parse config file"));
    Ok(())
}

#[test]
fn missing_config_file_is_rejected() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    Command::cargo_bin("syscage")?
        .arg("--config")
        .arg(dir.path().join("absent.yaml"))
        .args(["--", "true"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("syscage: failed to read config file"));
    Ok(())
}

#[test]
fn config_file_and_flags_are_merged() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("policy.yaml");
    fs::write(
        &path,
        "default_act: allow\nerrno: EACCES\nerrno_calls: [socket]\ndump_pfc: true\n",
    )?;

    // The command does not exist, so nothing is loaded after the dump.
    Command::cargo_bin("syscage")?
        .arg("--config")
        .arg(&path)
        .args(["--kill-calls", "ptrace", "--", "no-such-program-for-syscage"])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("\"socket\""))
        .stdout(predicate::str::contains("action ERRNO(13);"))
        .stdout(predicate::str::contains("\"ptrace\""))
        .stdout(predicate::str::contains("  action ALLOW;"));
    Ok(())
}
