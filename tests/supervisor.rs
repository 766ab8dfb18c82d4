// tests/supervisor.rs
mod common;
use crate::common::{init_tracing, TestResult};

use std::fs;
use std::os::unix::process::ExitStatusExt;
use std::time::Duration;

use nix::errno::Errno;
use nix::sys::signal::Signal;
use nix::sys::wait::{waitpid, WaitPidFlag};
use nix::unistd::getpgid;

use respawn::exec::SupervisedProcess;
use respawn::types::OutputTarget;
use respawn_test_utils::with_timeout;

fn sh(script: &str) -> Vec<String> {
    vec!["-c".to_string(), script.to_string()]
}

#[tokio::test]
async fn kill_then_start_leaves_no_zombie_and_changes_pid() -> TestResult {
    init_tracing();
    let mut process = SupervisedProcess::new("sleep", vec!["30".into()], Signal::SIGTERM)?;

    let first = process.start().await?.expect("sleep must start");
    assert!(process.is_running());
    assert_eq!(getpgid(Some(first))?, first, "child leads its own group");

    with_timeout(process.kill()).await?;
    assert!(!process.is_running());
    assert_eq!(process.pid(), None);
    // Already reaped: nothing left to wait for.
    assert_eq!(waitpid(first, Some(WaitPidFlag::WNOHANG)), Err(Errno::ECHILD));
    assert_eq!(
        process.last_status().and_then(|s| s.signal()),
        Some(Signal::SIGTERM as i32)
    );

    let second = process.start().await?.expect("sleep must start again");
    assert_ne!(first, second);

    with_timeout(process.kill()).await?;
    Ok(())
}

#[tokio::test]
async fn kill_without_child_is_a_noop() -> TestResult {
    init_tracing();
    let mut process = SupervisedProcess::new("true", Vec::new(), Signal::SIGTERM)?;

    process.kill().await?;
    assert_eq!(process.last_status(), None);
    assert_eq!(process.exit_code(), 0);

    Ok(())
}

#[tokio::test]
async fn natural_exit_is_recorded() -> TestResult {
    init_tracing();
    let mut process = SupervisedProcess::new("sh", sh("exit 3"), Signal::SIGTERM)?;

    process.start().await?;
    let status = with_timeout(process.wait_exit()).await.expect("status");

    assert_eq!(status.code(), Some(3));
    assert!(!process.is_running());
    assert_eq!(process.exit_code(), 3);

    // A kill after the child is gone does nothing.
    process.kill().await?;
    assert_eq!(process.exit_code(), 3);

    Ok(())
}

#[tokio::test]
async fn missing_program_reports_status_one() -> TestResult {
    init_tracing();
    let mut process =
        SupervisedProcess::new("/nonexistent/respawn-test-binary", Vec::new(), Signal::SIGTERM)?;

    let pid = process.start().await?;
    assert_eq!(pid, None);
    assert!(!process.is_running());
    assert_eq!(process.exit_code(), 1);

    Ok(())
}

#[tokio::test]
async fn custom_kill_signal_is_used() -> TestResult {
    init_tracing();
    let mut process = SupervisedProcess::new("sleep", vec!["30".into()], Signal::SIGINT)?;

    process.start().await?;
    with_timeout(process.kill()).await?;

    assert_eq!(
        process.last_status().and_then(|s| s.signal()),
        Some(Signal::SIGINT as i32)
    );
    // Killed by a signal: report success.
    assert_eq!(process.exit_code(), 0);

    Ok(())
}

#[tokio::test]
async fn stubborn_child_is_escalated_to_sigkill() -> TestResult {
    init_tracing();
    let mut process = SupervisedProcess::new("sh", sh("trap '' TERM; exec sleep 30"), Signal::SIGTERM)?
        .with_kill_timeout(Some(Duration::from_millis(200)));

    process.start().await?;
    // Give the shell time to install the trap.
    tokio::time::sleep(Duration::from_millis(200)).await;
    with_timeout(process.kill()).await?;

    assert_eq!(
        process.last_status().and_then(|s| s.signal()),
        Some(Signal::SIGKILL as i32)
    );

    Ok(())
}

#[tokio::test]
async fn output_is_redirected_to_file() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let out = dir.path().join("child.log");
    fs::write(&out, "stale content\n")?;

    let mut process = SupervisedProcess::new("sh", sh("echo out; echo err 1>&2"), Signal::SIGTERM)?
        .with_output(OutputTarget::File(out.clone()));

    process.start().await?;
    with_timeout(process.wait_exit()).await;

    let log = fs::read_to_string(&out)?;
    assert!(log.contains("out"));
    assert!(log.contains("err"));
    assert!(!log.contains("stale"), "file is truncated on start");

    Ok(())
}

#[tokio::test]
async fn forwarded_input_reaches_the_child() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let out = dir.path().join("line.txt");
    let script = format!("read line; echo \"$line\" > '{}'", out.display());

    let mut process = SupervisedProcess::new("sh", sh(&script), Signal::SIGTERM)?;
    process.start().await?;
    process.forward_input(b"hello child\n");

    let status = with_timeout(process.wait_exit()).await.expect("status");
    assert!(status.success());
    assert_eq!(fs::read_to_string(&out)?.trim(), "hello child");

    Ok(())
}
