// src/engine/core.rs

//! Pure core runtime state machine.
//!
//! This module contains a synchronous, deterministic "core runtime" that
//! consumes [`LoopEvent`]s and produces:
//! - an updated restart phase and deadline
//! - a list of "commands" describing what the IO shell should do next
//!
//! The async/IO-heavy shell (`engine::runtime::Runtime`) is responsible for:
//! - waiting on watch events, timers, sockets, stdin and the child
//! - actually killing and starting processes
//! - handling Ctrl+C / shutdown
//!
//! Time is passed in explicitly, so the core is unit tested without Tokio,
//! processes, or real sleeps.

use std::time::Instant;

use crate::engine::event_handlers::{handle_timer, handle_trigger, CoreStep};
use crate::engine::{LoopEvent, RestartState, RestartTimings};

/// State shared with the event handlers.
#[derive(Debug, Clone)]
pub struct CoreState {
    pub(crate) timings: RestartTimings,
    pub(crate) phase: RestartState,
    /// When the pending kill or start is due.
    pub(crate) deadline: Option<Instant>,
    /// When the next poll pass is due (poll engine only).
    pub(crate) next_poll: Option<Instant>,
}

impl CoreState {
    /// Polling is suspended while a start is pending.
    pub(crate) fn polls_active(&self) -> bool {
        self.phase != RestartState::PendingStart
    }
}

/// Pure restart state machine.
///
/// It has **no** channels, no Tokio types, and does not perform any IO.
#[derive(Debug, Clone)]
pub struct RestartCore {
    state: CoreState,
}

impl RestartCore {
    /// A fresh core starts in `PendingStart` with an immediate deadline, so
    /// the first timer wake-up starts the child.
    pub fn new(timings: RestartTimings, now: Instant) -> Self {
        Self {
            state: CoreState {
                timings,
                phase: RestartState::PendingStart,
                deadline: Some(now),
                next_poll: timings.poll_interval.map(|interval| now + interval),
            },
        }
    }

    pub fn phase(&self) -> RestartState {
        self.state.phase
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.state.deadline
    }

    pub fn timings(&self) -> RestartTimings {
        self.state.timings
    }

    /// Earliest instant at which the shell must deliver
    /// [`LoopEvent::TimerElapsed`]; `None` means "only wake on I/O".
    pub fn next_wakeup(&self) -> Option<Instant> {
        let poll = self
            .state
            .next_poll
            .filter(|_| self.state.polls_active());

        match (self.state.deadline, poll) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Handle a single loop event, updating core state and returning the
    /// resulting commands for the IO shell.
    pub fn step(&mut self, event: LoopEvent, now: Instant) -> CoreStep {
        match event {
            LoopEvent::Triggered { source } => handle_trigger(&mut self.state, source, now),
            LoopEvent::TimerElapsed => handle_timer(&mut self.state, now),
            LoopEvent::ShutdownRequested => CoreStep::stop(),
        }
    }
}
