// src/exec/process.rs

//! The supervised child process.

use std::fs::OpenOptions;
use std::io;
use std::os::unix::process::ExitStatusExt;
use std::process::{ExitStatus, Stdio};
use std::time::Duration;

use nix::errno::Errno;
use nix::libc;
use nix::sys::signal::{kill, killpg, Signal};
use nix::unistd::{getpgid, getpgrp, Pid};
use tokio::process::{Child, Command};
use tracing::{debug, error, info, warn};

use crate::errors::{RespawnError, Result};
use crate::exec::input::InputPipe;
use crate::types::OutputTarget;

/// Owns at most one running child at a time.
///
/// Each child is started as the leader of its own process group so that
/// termination reaches everything it forked. Its stdin is always the read
/// end of the supervisor's [`InputPipe`].
#[derive(Debug)]
pub struct SupervisedProcess {
    program: String,
    args: Vec<String>,
    kill_signal: Signal,
    kill_timeout: Option<Duration>,
    output: OutputTarget,
    input: InputPipe,
    child: Option<Child>,
    pid: Option<Pid>,
    last_status: Option<ExitStatus>,
}

impl SupervisedProcess {
    pub fn new(program: impl Into<String>, args: Vec<String>, kill_signal: Signal) -> Result<Self> {
        Ok(Self {
            program: program.into(),
            args,
            kill_signal,
            kill_timeout: None,
            output: OutputTarget::Inherit,
            input: InputPipe::new()?,
            child: None,
            pid: None,
            last_status: None,
        })
    }

    /// Escalate to SIGKILL when the child outlives `timeout` after the kill
    /// signal.
    pub fn with_kill_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.kill_timeout = timeout;
        self
    }

    pub fn with_output(mut self, output: OutputTarget) -> Self {
        self.output = output;
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    pub fn pid(&self) -> Option<Pid> {
        self.pid
    }

    pub fn is_running(&self) -> bool {
        self.child.is_some()
    }

    pub fn last_status(&self) -> Option<ExitStatus> {
        self.last_status
    }

    /// Start a new child. A child that is still running is killed first.
    ///
    /// Returns `Ok(None)` when the program could not be executed (missing,
    /// not executable, bad format); this is reported like a child that
    /// exited with status 1 so that the next trigger simply tries again.
    /// Any other failure to create the process is fatal.
    pub async fn start(&mut self) -> Result<Option<Pid>> {
        if self.child.is_some() {
            warn!(pid = ?self.pid, "start requested while a child is running; killing it first");
            self.kill().await?;
        }

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).process_group(0).stdin(self.input.child_stdin()?);
        self.apply_output(&mut cmd);

        let child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) if is_exec_failure(&e) => {
                error!(program = %self.program, error = %e, "unable to execute program");
                self.last_status = Some(ExitStatus::from_raw(1 << 8));
                return Ok(None);
            }
            Err(source) => {
                return Err(RespawnError::SpawnError {
                    program: self.program.clone(),
                    source,
                });
            }
        };

        let pid = child.id().map(|id| Pid::from_raw(id as i32));
        info!(program = %self.program, pid = ?pid, "child started");

        self.child = Some(child);
        self.pid = pid;
        Ok(pid)
    }

    /// Terminate the current child's process group and reap the child.
    ///
    /// A no-op when there is no child. A child that already exited is only
    /// reaped.
    pub async fn kill(&mut self) -> Result<()> {
        let Some(mut child) = self.child.take() else {
            return Ok(());
        };
        let pid = self.pid.take();

        if let Some(status) = child.try_wait()? {
            self.record(pid, status);
            return Ok(());
        }

        if let Some(pid) = pid {
            debug!(pid = %pid, signal = %self.kill_signal, "terminating child");
            signal_group(pid, self.kill_signal);
        }

        let status = match self.kill_timeout {
            Some(grace) => match tokio::time::timeout(grace, child.wait()).await {
                Ok(status) => status?,
                Err(_) => {
                    warn!(pid = ?pid, grace = ?grace, "child ignored kill signal; sending SIGKILL");
                    if let Some(pid) = pid {
                        signal_group(pid, Signal::SIGKILL);
                    }
                    child.wait().await?
                }
            },
            None => child.wait().await?,
        };

        self.record(pid, status);
        Ok(())
    }

    /// Wait for the current child to exit on its own.
    ///
    /// Never resolves while there is no child. Cancel safe: state is only
    /// touched once the child has been reaped.
    pub async fn wait_exit(&mut self) -> Option<ExitStatus> {
        let Some(child) = self.child.as_mut() else {
            return std::future::pending().await;
        };
        let res = child.wait().await;

        self.child = None;
        let pid = self.pid.take();
        match res {
            Ok(status) => {
                self.record(pid, status);
                Some(status)
            }
            Err(e) => {
                warn!(pid = ?pid, error = %e, "waiting for child failed");
                None
            }
        }
    }

    /// Forward bytes read from the supervisor's stdin to the child.
    pub fn forward_input(&mut self, data: &[u8]) {
        self.input.forward(data);
    }

    /// Exit code the supervisor should report: the last child's own exit
    /// code if it exited normally, success otherwise.
    pub fn exit_code(&self) -> i32 {
        self.last_status.and_then(|s| s.code()).unwrap_or(0)
    }

    fn record(&mut self, pid: Option<Pid>, status: ExitStatus) {
        match (status.code(), status.signal()) {
            (Some(code), _) => info!(pid = ?pid, exit_code = code, "child exited"),
            (None, Some(sig)) => info!(pid = ?pid, signal = sig, "child terminated by signal"),
            _ => info!(pid = ?pid, ?status, "child exited"),
        }
        self.last_status = Some(status);
    }

    fn apply_output(&self, cmd: &mut Command) {
        let OutputTarget::File(path) = &self.output else {
            return;
        };

        let opened = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)
            .and_then(|file| Ok((file.try_clone()?, file)));

        match opened {
            Ok((out, err)) => {
                cmd.stdout(Stdio::from(out)).stderr(Stdio::from(err));
            }
            Err(e) => warn!(
                path = ?path,
                error = %e,
                "unable to open output file; child output goes to the terminal"
            ),
        }
    }
}

/// Spawn errors that mean "this program cannot be run" rather than "the
/// system cannot create processes".
fn is_exec_failure(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied
    ) || e.raw_os_error() == Some(libc::ENOEXEC)
}

/// Deliver `signal` to the group led by `pid`.
///
/// If the child somehow shares our own group, only the child is signalled.
fn signal_group(pid: Pid, signal: Signal) {
    let res = match getpgid(Some(pid)) {
        Ok(pgid) if pgid != getpgrp() => killpg(pgid, signal),
        _ => kill(pid, signal),
    };
    match res {
        Ok(()) => {}
        Err(Errno::ESRCH) => debug!(pid = %pid, "child already gone"),
        Err(e) => warn!(pid = %pid, %signal, error = %e, "unable to signal child"),
    }
}
