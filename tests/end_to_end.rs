// tests/end_to_end.rs
//
// Full runtime: real watcher, real child processes, real timers.
mod common;
use crate::common::{init_tracing, SettingsBuilder, TestResult};

use std::fs;
use std::path::Path;
use std::time::Instant;

use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::time::{sleep, Duration};

use respawn::config::{ServerSettings, Settings};
use respawn::engine::{LoopEvent, RestartCore, RestartTimings, Runtime};
use respawn::exec::{spawn_input_reader, SignalRelay, SupervisedProcess};
use respawn::remote::RemoteTrigger;
use respawn::types::EngineKind;
use respawn::watch::{PatternSet, WatchEngine};
use respawn_test_utils::scripts::{count_lines, sh_command, wait_for_count, write_counter_script};

/// Build the runtime the same way `respawn::run` does, minus signal
/// handling and stdin.
fn build_runtime(settings: &Settings) -> TestResultOf<(Runtime, mpsc::Sender<LoopEvent>)> {
    let patterns = PatternSet::compile(&settings.include, &settings.exclude);
    let engine = WatchEngine::with_roots(
        settings.engine,
        settings.watch,
        patterns,
        &settings.watch_paths,
    );
    let process = SupervisedProcess::new(
        settings.program(),
        settings.args().to_vec(),
        settings.kill_signal,
    )?;
    let timings = RestartTimings::from_settings(settings, engine.is_polling());
    let core = RestartCore::new(timings, Instant::now());

    let (tx, rx) = mpsc::channel(4);
    let runtime = Runtime::new(core, engine, process, SignalRelay::default(), rx);
    Ok((runtime, tx))
}

type TestResultOf<T> = Result<T, Box<dyn std::error::Error>>;

struct Fixture {
    _watched: tempfile::TempDir,
    _scratch: tempfile::TempDir,
    watched: std::path::PathBuf,
    counter: std::path::PathBuf,
    command: Vec<String>,
}

/// A watched directory plus a separate scratch directory holding the
/// counter script and its output, so the child never touches the tree.
fn fixture() -> TestResultOf<Fixture> {
    let watched_dir = tempfile::tempdir()?;
    let scratch = tempfile::tempdir()?;
    let counter = scratch.path().join("starts.log");
    let script = write_counter_script(scratch.path(), &counter)?;

    Ok(Fixture {
        watched: watched_dir.path().canonicalize()?,
        _watched: watched_dir,
        _scratch: scratch,
        counter,
        command: sh_command(&script),
    })
}

fn command_refs(command: &[String]) -> Vec<&str> {
    command.iter().map(String::as_str).collect()
}

fn touch(dir: &Path, name: &str) -> std::io::Result<()> {
    fs::write(dir.join(name), name)
}

#[tokio::test]
async fn change_restarts_child_exactly_once() -> TestResult {
    init_tracing();
    let fx = fixture()?;

    let settings = SettingsBuilder::new(&command_refs(&fx.command))
        .engine(EngineKind::Notify)
        .watch_path(&fx.watched)
        .kill_latency(0.2)
        .poll_interval(0.1)
        .build();
    let (runtime, tx) = build_runtime(&settings)?;

    let driver = async {
        let first = wait_for_count(&fx.counter, 1, Duration::from_secs(3)).await;

        touch(&fx.watched, "file.txt")?;
        let second = wait_for_count(&fx.counter, 2, Duration::from_secs(3)).await;

        // The several events of one write collapse into one restart.
        sleep(Duration::from_millis(600)).await;
        let settled = count_lines(&fx.counter);

        tx.send(LoopEvent::ShutdownRequested).await?;
        TestResultOf::Ok((first, second, settled))
    };

    let (code, counts) = tokio::join!(runtime.run(), driver);
    let (first, second, settled) = counts?;

    assert_eq!(first, 1, "child starts once at startup");
    assert_eq!(second, 2, "one change restarts once");
    assert_eq!(settled, 2);
    assert_eq!(code?, 0, "child killed by signal reports success");

    Ok(())
}

#[tokio::test]
async fn excluded_file_does_not_restart() -> TestResult {
    init_tracing();
    let fx = fixture()?;

    let settings = SettingsBuilder::new(&command_refs(&fx.command))
        .engine(EngineKind::Notify)
        .watch_path(&fx.watched)
        .exclude(r"^temp\.txt$")
        .files_only(true)
        .kill_latency(0.2)
        .poll_interval(0.1)
        .build();
    let (runtime, tx) = build_runtime(&settings)?;

    let driver = async {
        let first = wait_for_count(&fx.counter, 1, Duration::from_secs(3)).await;

        touch(&fx.watched, "temp.txt")?;
        sleep(Duration::from_secs(1)).await;
        let after_excluded = count_lines(&fx.counter);

        touch(&fx.watched, "other.txt")?;
        let after_included = wait_for_count(&fx.counter, 2, Duration::from_secs(3)).await;

        tx.send(LoopEvent::ShutdownRequested).await?;
        TestResultOf::Ok((first, after_excluded, after_included))
    };

    let (code, counts) = tokio::join!(runtime.run(), driver);
    let (first, after_excluded, after_included) = counts?;

    assert_eq!(first, 1);
    assert_eq!(after_excluded, 1, "excluded name must not restart");
    assert_eq!(after_included, 2, "watcher is still live");
    code?;

    Ok(())
}

#[tokio::test]
async fn poll_engine_ignores_excluded_file() -> TestResult {
    init_tracing();
    let fx = fixture()?;

    let settings = SettingsBuilder::new(&command_refs(&fx.command))
        .engine(EngineKind::Poll)
        .watch_path(&fx.watched)
        .exclude(r"^temp\.txt$")
        .kill_latency(0.1)
        .poll_interval(0.1)
        .build();
    let (runtime, tx) = build_runtime(&settings)?;

    let driver = async {
        let first = wait_for_count(&fx.counter, 1, Duration::from_secs(3)).await;

        touch(&fx.watched, "temp.txt")?;
        sleep(Duration::from_millis(800)).await;
        let after_excluded = count_lines(&fx.counter);

        touch(&fx.watched, "other.txt")?;
        let after_included = wait_for_count(&fx.counter, 2, Duration::from_secs(3)).await;

        tx.send(LoopEvent::ShutdownRequested).await?;
        TestResultOf::Ok((first, after_excluded, after_included))
    };

    let (code, counts) = tokio::join!(runtime.run(), driver);
    assert_eq!(counts?, (1, 1, 2));
    code?;

    Ok(())
}

#[tokio::test]
async fn poll_engine_restarts_on_change() -> TestResult {
    init_tracing();
    let fx = fixture()?;
    fs::write(fx.watched.join("main.c"), "int main;")?;

    let settings = SettingsBuilder::new(&command_refs(&fx.command))
        .engine(EngineKind::Poll)
        .watch_path(&fx.watched)
        .kill_latency(0.1)
        .poll_interval(0.1)
        .build();
    let (runtime, tx) = build_runtime(&settings)?;

    let driver = async {
        let first = wait_for_count(&fx.counter, 1, Duration::from_secs(3)).await;

        let file = fs::OpenOptions::new().write(true).open(fx.watched.join("main.c"))?;
        file.set_modified(std::time::SystemTime::now() + Duration::from_secs(60))?;
        let second = wait_for_count(&fx.counter, 2, Duration::from_secs(3)).await;

        tx.send(LoopEvent::ShutdownRequested).await?;
        TestResultOf::Ok((first, second))
    };

    let (code, counts) = tokio::join!(runtime.run(), driver);
    assert_eq!(counts?, (1, 2));
    code?;

    Ok(())
}

#[tokio::test]
async fn remote_datagram_restarts_child() -> TestResult {
    init_tracing();
    let fx = fixture()?;

    let settings = SettingsBuilder::new(&command_refs(&fx.command))
        .engine(EngineKind::Poll)
        .watch_path(&fx.watched)
        .kill_latency(0.1)
        .build();
    let (runtime, tx) = build_runtime(&settings)?;

    let remote = RemoteTrigger::bind(&ServerSettings {
        interface: "127.0.0.1".to_string(),
        port: 0,
    })
    .await?
    .expect("loopback always resolves");
    let target = remote.local_addr();
    let runtime = runtime.with_remote(Some(remote));

    let driver = async {
        let first = wait_for_count(&fx.counter, 1, Duration::from_secs(3)).await;

        let sender = UdpSocket::bind("127.0.0.1:0").await?;
        sender.send_to(b"restart", target).await?;
        let second = wait_for_count(&fx.counter, 2, Duration::from_secs(3)).await;

        tx.send(LoopEvent::ShutdownRequested).await?;
        TestResultOf::Ok((first, second))
    };

    let (code, counts) = tokio::join!(runtime.run(), driver);
    assert_eq!(counts?, (1, 2));
    code?;

    Ok(())
}

#[tokio::test]
async fn closed_input_keeps_the_loop_running() -> TestResult {
    init_tracing();
    let watched_dir = tempfile::tempdir()?;
    let scratch = tempfile::tempdir()?;
    let counter = scratch.path().join("starts.log");
    let received = scratch.path().join("received.log");
    let script = scratch.path().join("echo-input.sh");
    fs::write(
        &script,
        format!(
            "#!/bin/sh\necho started >> '{}'\nexec cat >> '{}'\n",
            counter.display(),
            received.display()
        ),
    )?;

    let settings = SettingsBuilder::new(&command_refs(&sh_command(&script)))
        .engine(EngineKind::Poll)
        .watch_path(watched_dir.path())
        .files_only(true)
        .kill_latency(0.1)
        .poll_interval(0.1)
        .build();
    let (runtime, tx) = build_runtime(&settings)?;
    // Yields one chunk, then EOF closes the channel.
    let runtime = runtime.with_input(Some(spawn_input_reader(&b"hello\n"[..])));

    let driver = async {
        let first = wait_for_count(&counter, 1, Duration::from_secs(3)).await;
        let forwarded = wait_for_count(&received, 1, Duration::from_secs(3)).await;

        touch(watched_dir.path(), "changed.txt")?;
        let second = wait_for_count(&counter, 2, Duration::from_secs(3)).await;

        tx.send(LoopEvent::ShutdownRequested).await?;
        TestResultOf::Ok((first, forwarded, second))
    };

    let (code, counts) = tokio::join!(runtime.run(), driver);
    assert_eq!(counts?, (1, 1, 2), "input forwarded, then restarts continue after EOF");
    assert_eq!(fs::read_to_string(&received)?, "hello\n");
    code?;

    Ok(())
}

#[tokio::test]
async fn exit_code_of_finished_child_is_reported() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;

    let settings = SettingsBuilder::new(&["sh", "-c", "exit 7"])
        .engine(EngineKind::Poll)
        .watch_path(dir.path())
        .build();
    let (runtime, tx) = build_runtime(&settings)?;

    let driver = async {
        sleep(Duration::from_millis(300)).await;
        tx.send(LoopEvent::ShutdownRequested).await
    };

    let (code, sent) = tokio::join!(runtime.run(), driver);
    sent?;
    assert_eq!(code?, 7);

    Ok(())
}
