use std::os::unix::process::ExitStatusExt;
use std::time::Duration;

use assert_cmd::Command;
use predicates::prelude::*;
use pretty_assertions::assert_eq;

fn syscage() -> anyhow::Result<Command> {
    Ok(Command::cargo_bin("syscage")?)
}

/// Some CI sandboxes refuse nested seccomp filters; there is nothing to
/// observe in that case.
fn filter_refused(stderr: &[u8]) -> bool {
    String::from_utf8_lossy(stderr).contains("failed to load seccomp filter")
}

#[test]
fn missing_command_prints_usage() -> anyhow::Result<()> {
    syscage()?
        .args(["--kill-calls", "ptrace"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Usage:"));
    Ok(())
}

#[test]
fn conflicting_assignment_is_rejected() -> anyhow::Result<()> {
    syscage()?
        .args(["--allow-calls", "open", "--errno-calls", "open", "--", "true"])
        .assert()
        .code(1)
        .stdout(predicate::str::is_empty())
        .stderr(predicate::str::contains(
            "syscage: filter generation failed: multiple rules for open",
        ));
    Ok(())
}

#[test]
fn unknown_syscall_is_rejected() -> anyhow::Result<()> {
    syscage()?
        .args(["--kill-calls", "frobnicate", "--", "true"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("unknown system call frobnicate"));
    Ok(())
}

#[test]
fn unknown_errno_is_rejected() -> anyhow::Result<()> {
    syscage()?
        .args(["--errno", "EBOGUS", "--", "true"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("syscage: unknown errno value: EBOGUS"));
    Ok(())
}

#[test]
fn unknown_action_is_rejected() -> anyhow::Result<()> {
    syscage()?
        .args(["--default-act", "deny", "--", "true"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("syscage: unknown action: deny"));
    Ok(())
}

#[test]
fn dump_is_printed_before_the_executable_is_resolved() -> anyhow::Result<()> {
    syscage()?
        .args([
            "--kill-calls",
            "ptrace",
            "--dump-pfc",
            "--",
            "no-such-program-for-syscage",
        ])
        .assert()
        .code(1)
        .stdout(predicate::str::contains("# pseudo filter code start"))
        .stdout(predicate::str::contains("action KILL_PROCESS;"))
        .stderr(predicate::str::contains(
            "syscage: no-such-program-for-syscage: command not found",
        ));
    Ok(())
}

#[test]
fn runs_the_command_under_the_filter() -> anyhow::Result<()> {
    let output = syscage()?
        .args(["--default-act", "allow", "--kill-calls", "ptrace", "--", "echo", "hi"])
        .output()?;
    if filter_refused(&output.stderr) {
        return Ok(());
    }
    assert!(output.status.success(), "{output:?}");
    assert_eq!(String::from_utf8_lossy(&output.stdout), "hi\n");
    Ok(())
}

#[test]
fn killed_syscall_terminates_the_command() -> anyhow::Result<()> {
    let output = syscage()?
        .args(["--default-act", "allow", "--kill-calls", "uname", "--", "uname"])
        .output()?;
    if filter_refused(&output.stderr) {
        return Ok(());
    }
    assert_eq!(output.status.signal(), Some(libc::SIGSYS), "{output:?}");
    assert!(output.stdout.is_empty());
    Ok(())
}

#[test]
fn trapped_syscall_raises_sigsys() -> anyhow::Result<()> {
    let output = syscage()?
        .args(["--default-act", "allow", "--trap-calls", "uname", "--", "uname"])
        .output()?;
    if filter_refused(&output.stderr) {
        return Ok(());
    }
    assert_eq!(output.status.signal(), Some(libc::SIGSYS), "{output:?}");
    Ok(())
}

#[test]
fn errno_syscall_fails_with_the_configured_code() -> anyhow::Result<()> {
    let output = syscage()?
        .args([
            "--default-act",
            "allow",
            "--errno-calls",
            "uname",
            "--errno",
            "ENOTSUP",
            "--",
            "uname",
        ])
        .output()?;
    if filter_refused(&output.stderr) {
        return Ok(());
    }
    assert_eq!(output.status.code(), Some(1), "{output:?}");
    assert!(
        String::from_utf8_lossy(&output.stderr).contains("Operation not supported"),
        "{output:?}"
    );
    Ok(())
}

#[test]
fn logged_syscall_is_allowed() -> anyhow::Result<()> {
    let output = syscage()?
        .args(["--default-act", "allow", "--log-calls", "uname", "--", "uname"])
        .output()?;
    if filter_refused(&output.stderr) {
        return Ok(());
    }
    assert!(output.status.success(), "{output:?}");
    assert!(!output.stdout.is_empty());
    Ok(())
}

#[test]
fn unlisted_syscall_gets_the_default_errno() -> anyhow::Result<()> {
    // `execve` is not listed, so the exec itself fails with the default code.
    let output = syscage()?
        .args(["--errno", "EACCES", "--allow-calls", "write", "--", "true"])
        .timeout(Duration::from_secs(10))
        .output()?;
    if filter_refused(&output.stderr) {
        return Ok(());
    }
    assert_eq!(output.status.code(), Some(1), "{output:?}");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("syscage: failed to execute"), "{stderr}");
    assert!(stderr.contains("Permission denied"), "{stderr}");
    Ok(())
}

#[test]
fn refused_exec_still_exits() -> anyhow::Result<()> {
    // The default policy denies `execve` and `write`; the launcher must
    // still terminate with a failure status.
    let output = syscage()?
        .args(["--", "/bin/true"])
        .timeout(Duration::from_secs(10))
        .output()?;
    assert_eq!(output.status.code(), Some(1), "{output:?}");
    Ok(())
}
