// src/engine/runtime.rs

use std::fmt;
use std::process::ExitStatus;
use std::time::Instant;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::errors::Result;
use crate::exec::{SignalRelay, SupervisedProcess};
use crate::remote::RemoteTrigger;
use crate::watch::{Dispatch, RawEvent, WatchEngine};

use super::core::RestartCore;
use super::{CoreCommand, LoopEvent, TriggerSource};

/// What woke the loop up. Produced inside `select!`, handled after it so
/// that handlers get `&mut self`.
#[derive(Debug)]
enum Wake {
    Timer,
    Watch(RawEvent),
    Input(Option<Vec<u8>>),
    Remote(bool),
    ChildExited(Option<ExitStatus>),
    External(Option<LoopEvent>),
}

/// Single-threaded IO shell around [`RestartCore`].
///
/// One `select!` multiplexes every input source; nothing here runs
/// concurrently with the loop body.
pub struct Runtime {
    core: RestartCore,
    engine: WatchEngine,
    process: SupervisedProcess,
    relay: SignalRelay,
    event_rx: Option<mpsc::Receiver<LoopEvent>>,
    input: Option<mpsc::Receiver<Vec<u8>>>,
    remote: Option<RemoteTrigger>,
}

impl fmt::Debug for Runtime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Runtime")
            .field("core", &self.core)
            .field("engine", &self.engine.kind())
            .field("pid", &self.process.pid())
            .finish_non_exhaustive()
    }
}

impl Runtime {
    pub fn new(
        core: RestartCore,
        engine: WatchEngine,
        process: SupervisedProcess,
        relay: SignalRelay,
        event_rx: mpsc::Receiver<LoopEvent>,
    ) -> Self {
        Self {
            core,
            engine,
            process,
            relay,
            event_rx: Some(event_rx),
            input: None,
            remote: None,
        }
    }

    /// Forward chunks from this receiver to the child's stdin.
    pub fn with_input(mut self, input: Option<mpsc::Receiver<Vec<u8>>>) -> Self {
        self.input = input;
        self
    }

    pub fn with_remote(mut self, remote: Option<RemoteTrigger>) -> Self {
        self.remote = remote;
        self
    }

    /// Run until shutdown is requested, then tear down.
    ///
    /// The shutdown sequence runs even when the loop fails. Returns the exit
    /// code the supervisor should report.
    pub async fn run(mut self) -> Result<i32> {
        info!("respawn runtime started");

        let outcome = self.event_loop().await;
        let code = self.shutdown().await;

        outcome.map(|()| code)
    }

    async fn event_loop(&mut self) -> Result<()> {
        loop {
            let wakeup = self.core.next_wakeup();

            let wake = tokio::select! {
                _ = sleep_until(wakeup) => Wake::Timer,
                raw = self.engine.next_event() => Wake::Watch(raw),
                data = recv_or_pending(&mut self.input) => Wake::Input(data),
                hit = recv_remote(self.remote.as_ref()) => Wake::Remote(hit),
                status = self.process.wait_exit() => Wake::ChildExited(status),
                event = recv_or_pending(&mut self.event_rx) => Wake::External(event),
            };

            let event = match wake {
                Wake::Timer => Some(LoopEvent::TimerElapsed),
                Wake::Watch(raw) => match self.engine.dispatch_event(raw) {
                    Dispatch::Changed => Some(LoopEvent::Triggered {
                        source: TriggerSource::FileWatch,
                    }),
                    Dispatch::Unchanged | Dispatch::Error => None,
                },
                Wake::Input(Some(data)) => {
                    self.process.forward_input(&data);
                    None
                }
                Wake::Input(None) => {
                    debug!("input forwarding disabled");
                    self.input = None;
                    None
                }
                Wake::Remote(true) => Some(LoopEvent::Triggered {
                    source: TriggerSource::Remote,
                }),
                Wake::Remote(false) => None,
                Wake::ChildExited(_) => {
                    self.relay.disarm();
                    None
                }
                Wake::External(Some(event)) => Some(event),
                Wake::External(None) => {
                    debug!("runtime event channel closed");
                    self.event_rx = None;
                    None
                }
            };

            let Some(event) = event else {
                continue;
            };

            debug!(?event, "runtime received event");
            let step = self.core.step(event, Instant::now());

            for command in step.commands {
                self.execute_command(command).await?;
            }

            if !step.keep_running {
                info!("shutdown requested; stopping runtime");
                return Ok(());
            }
        }
    }

    /// Execute a single command from the core.
    async fn execute_command(&mut self, command: CoreCommand) -> Result<()> {
        match command {
            CoreCommand::PollWatches => {
                if self.engine.poll() == Dispatch::Changed {
                    // A trigger never yields commands of its own.
                    self.core.step(
                        LoopEvent::Triggered {
                            source: TriggerSource::FileWatch,
                        },
                        Instant::now(),
                    );
                }
            }
            CoreCommand::KillChild => {
                self.relay.disarm();
                if let Err(e) = self.process.kill().await {
                    warn!(error = %e, "killing child failed");
                }
            }
            CoreCommand::StartChild => {
                if let Some(pid) = self.process.start().await? {
                    self.relay.arm(pid);
                }
            }
        }
        Ok(())
    }

    async fn shutdown(self) -> i32 {
        info!("shutting down");

        let Runtime {
            engine,
            mut process,
            relay,
            ..
        } = self;

        relay.disarm();
        if let Err(e) = process.kill().await {
            warn!(error = %e, "killing child during shutdown failed");
        }
        engine.close();

        let code = process.exit_code();
        info!(exit_code = code, "runtime exiting");
        code
    }
}

async fn sleep_until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline.into()).await,
        None => std::future::pending().await,
    }
}

async fn recv_or_pending<T>(rx: &mut Option<mpsc::Receiver<T>>) -> Option<T> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn recv_remote(remote: Option<&RemoteTrigger>) -> bool {
    match remote {
        Some(remote) => remote.recv().await,
        None => std::future::pending().await,
    }
}
