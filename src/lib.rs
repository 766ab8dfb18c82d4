// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod logging;
pub mod remote;
pub mod types;
pub mod watch;

use std::time::Instant;

use anyhow::{Context, Result};
use nix::sys::signal::Signal;
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::cli::CliArgs;
use crate::config::{load_layers, Settings};
use crate::engine::{LoopEvent, RestartCore, RestartTimings, Runtime};
use crate::exec::{spawn_stdin_reader, SignalRelay, SupervisedProcess};
use crate::remote::RemoteTrigger;
use crate::watch::{PatternSet, WatchEngine};

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading and layering
/// - the watch engine
/// - the process supervisor and signal relay
/// - stdin forwarding and the optional remote trigger
/// - SIGINT / SIGTERM handling (unless relayed)
///
/// Returns the exit code the supervisor should terminate with.
pub async fn run(args: CliArgs) -> Result<i32> {
    let settings = resolve_settings(&args).context("resolving configuration")?;

    if args.dry_run {
        print_dry_run(&settings);
        return Ok(0);
    }

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
    )
    .context("setting up the child's stdin pipe")?
    .with_kill_timeout(settings.kill_timeout)
    .with_output(settings.redirect_output.clone());

    let relay = SignalRelay::install(&settings.redirect_signals);

    // Runtime event channel.
    let (rt_tx, rt_rx) = mpsc::channel::<LoopEvent>(16);
    let listened = spawn_shutdown_listener(&relay, rt_tx)?;
    debug!(signals = ?listened, "shutdown signals");

    let input = settings.redirect_input.then(spawn_stdin_reader);

    let remote = match &settings.server {
        Some(server) => RemoteTrigger::bind(server).await.with_context(|| {
            format!(
                "binding remote trigger on {}:{}",
                server.interface, server.port
            )
        })?,
        None => None,
    };

    let timings = RestartTimings::from_settings(&settings, engine.is_polling());
    let core = RestartCore::new(timings, Instant::now());

    info!(command = ?settings.command, "supervising");

    let runtime = Runtime::new(core, engine, process, relay, rt_rx)
        .with_input(input)
        .with_remote(remote);
    Ok(runtime.run().await?)
}

/// Merge defaults, config file layers and the command line into validated
/// settings.
pub fn resolve_settings(args: &CliArgs) -> Result<Settings> {
    let file_layers = load_layers(args.config.as_deref(), args.program())?;
    Ok(Settings::resolve(
        &file_layers,
        &args.to_layer(),
        args.command.clone(),
    )?)
}

/// Signals that request a graceful shutdown: SIGINT and SIGTERM, minus
/// whichever of them the relay forwards to the child.
pub fn shutdown_signals(relay: &SignalRelay) -> Vec<Signal> {
    [Signal::SIGINT, Signal::SIGTERM]
        .into_iter()
        .filter(|&sig| {
            let relayed = relay.relays(sig);
            if relayed {
                debug!(signal = %sig, "signal is relayed; not used for shutdown");
            }
            !relayed
        })
        .collect()
}

/// Listen for the [`shutdown_signals`] and turn each delivery into
/// [`LoopEvent::ShutdownRequested`]. Returns the signals listened for.
pub fn spawn_shutdown_listener(
    relay: &SignalRelay,
    tx: mpsc::Sender<LoopEvent>,
) -> Result<Vec<Signal>> {
    let signals = shutdown_signals(relay);

    for &sig in &signals {
        let mut stream = signal(SignalKind::from_raw(sig as i32))
            .with_context(|| format!("listening for {sig}"))?;
        let tx = tx.clone();
        tokio::spawn(async move {
            while stream.recv().await.is_some() {
                info!(signal = %sig, "received shutdown signal");
                if tx.send(LoopEvent::ShutdownRequested).await.is_err() {
                    warn!("runtime already gone; shutdown request dropped");
                    break;
                }
            }
        });
    }

    Ok(signals)
}

/// Dry-run output: the resolved configuration.
fn print_dry_run(settings: &Settings) {
    eprintln!("respawn dry-run");
    eprintln!("  command = {:?}", settings.command);
    eprintln!("  watch-engine = {:?}", settings.engine);
    eprintln!("  watch-path = {:?}", settings.watch_paths);
    eprintln!("  watch-recursive = {}", settings.watch.recursive);
    eprintln!("  watch-update-nodes = {}", settings.watch.update_nodes);
    eprintln!("  watch-dirs-only = {}", settings.watch.dirs_only);
    eprintln!("  watch-files-only = {}", settings.watch.files_only);
    if !settings.include.is_empty() {
        eprintln!("  watch-include = {:?}", settings.include);
    }
    if !settings.exclude.is_empty() {
        eprintln!("  watch-exclude = {:?}", settings.exclude);
    }
    eprintln!("  poll-interval = {:?}", settings.poll_interval);
    eprintln!("  kill-signal = {}", settings.kill_signal);
    eprintln!("  kill-latency = {:?}", settings.kill_latency);
    if let Some(timeout) = settings.kill_timeout {
        eprintln!("  kill-timeout = {timeout:?}");
    }
    eprintln!("  start-latency = {:?}", settings.start_latency);
    eprintln!("  redirect-input = {}", settings.redirect_input);
    eprintln!("  redirect-output = {:?}", settings.redirect_output);
    if !settings.redirect_signals.is_empty() {
        let names: Vec<&str> = settings.redirect_signals.iter().map(|s| s.as_str()).collect();
        eprintln!("  redirect-signal = {names:?}");
    }
    match &settings.server {
        Some(server) => eprintln!("  server = {}:{}", server.interface, server.port),
        None => eprintln!("  server = none"),
    }

    debug!("dry-run complete (no execution)");
}
