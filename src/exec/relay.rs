// src/exec/relay.rs

//! Forwarding of selected signals to the supervised process group.
//!
//! The handler runs in async-signal context: it only loads an atomic and
//! issues `killpg`. No allocation, no locks, no logging.

use std::sync::atomic::{AtomicI32, Ordering};

use nix::libc;
use nix::sys::signal::{killpg, sigaction, SaFlags, SigAction, SigHandler, SigSet, Signal};
use nix::unistd::Pid;
use tracing::{debug, warn};

/// Process group that relayed signals go to; `0` means "nobody".
///
/// Written only by the orchestrator loop, read by the signal handler.
static RELAY_TARGET: AtomicI32 = AtomicI32::new(0);

extern "C" fn relay_handler(sig: libc::c_int) {
    let pgid = RELAY_TARGET.load(Ordering::Acquire);
    if pgid <= 0 {
        return;
    }
    if let Ok(signal) = Signal::try_from(sig) {
        let _ = killpg(Pid::from_raw(pgid), signal);
    }
}

/// Handle to the process-wide relay table.
///
/// [`install`](SignalRelay::install) registers the handler once per signal;
/// [`arm`](SignalRelay::arm) / [`disarm`](SignalRelay::disarm) switch the
/// current target.
#[derive(Debug, Default)]
pub struct SignalRelay {
    installed: Vec<Signal>,
}

impl SignalRelay {
    /// Install the relay handler for each of `signals`.
    ///
    /// Signals that cannot be caught (SIGKILL, SIGSTOP) or whose handler
    /// cannot be installed are skipped with a warning.
    pub fn install(signals: &[Signal]) -> Self {
        let action = SigAction::new(
            SigHandler::Handler(relay_handler),
            SaFlags::SA_RESTART,
            SigSet::empty(),
        );

        let mut installed = Vec::with_capacity(signals.len());
        for &signal in signals {
            if installed.contains(&signal) {
                continue;
            }
            // SAFETY: the handler only performs an atomic load and killpg,
            // both async-signal-safe.
            match unsafe { sigaction(signal, &action) } {
                Ok(_) => {
                    debug!(%signal, "signal relay installed");
                    installed.push(signal);
                }
                Err(e) => warn!(%signal, error = %e, "unable to install signal handler"),
            }
        }

        Self { installed }
    }

    /// Signals that are actually relayed.
    pub fn signals(&self) -> &[Signal] {
        &self.installed
    }

    /// Whether `signal` is relayed to the child.
    pub fn relays(&self, signal: Signal) -> bool {
        self.installed.contains(&signal)
    }

    /// Point the relay at the process group led by `pid`.
    pub fn arm(&self, pid: Pid) {
        RELAY_TARGET.store(pid.as_raw(), Ordering::Release);
    }

    /// Stop relaying until the next [`arm`](Self::arm).
    pub fn disarm(&self) {
        RELAY_TARGET.store(0, Ordering::Release);
    }

    /// Current relay target.
    pub fn target(&self) -> Option<Pid> {
        match RELAY_TARGET.load(Ordering::Acquire) {
            pid if pid > 0 => Some(Pid::from_raw(pid)),
            _ => None,
        }
    }
}
