// src/engine/mod.rs

//! Orchestration engine for respawn.
//!
//! This module ties together:
//! - the restart state machine (debounced kill, then delayed start)
//! - the main runtime event loop that reacts to:
//!   - file-watch notifications and poll ticks
//!   - remote triggers
//!   - child exits
//!   - stdin data to forward
//!   - shutdown signals
//!
//! The pure core state machine lives in [`core`]; the async/IO shell is
//! implemented in [`runtime`].

use std::time::Duration;

use crate::config::Settings;

/// Where a restart request came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerSource {
    /// A watched node changed.
    FileWatch,
    /// A datagram arrived on the remote trigger socket.
    Remote,
}

/// Restart phase of the supervised child.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestartState {
    /// Child running (or exited on its own); nothing scheduled.
    Idle,
    /// A trigger arrived; the child is killed when the deadline passes.
    PendingKill,
    /// The child is gone; a new one starts when the deadline passes.
    PendingStart,
}

/// Events fed into the core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoopEvent {
    /// Something asked for a restart.
    Triggered { source: TriggerSource },
    /// The wake-up returned by `next_wakeup` has been reached.
    TimerElapsed,
    /// Graceful shutdown requested (SIGINT / SIGTERM).
    ShutdownRequested,
}

/// Delays that drive the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartTimings {
    /// Quiet period after the last trigger before the child is killed.
    pub kill_latency: Duration,
    /// Pause between kill and start.
    pub start_latency: Duration,
    /// Poll engine tick; `None` for notification-driven engines.
    pub poll_interval: Option<Duration>,
}

impl RestartTimings {
    /// Timings from resolved settings; `polling` says whether the active
    /// watch engine needs a tick.
    pub fn from_settings(settings: &Settings, polling: bool) -> Self {
        Self {
            kill_latency: settings.kill_latency,
            start_latency: settings.start_latency,
            poll_interval: polling.then_some(settings.poll_interval),
        }
    }
}

pub mod core;
pub mod event_handlers;
pub mod runtime;

pub use self::core::RestartCore;
pub use event_handlers::{CoreCommand, CoreStep};
pub use runtime::Runtime;
