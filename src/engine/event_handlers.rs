// src/engine/event_handlers.rs

//! Event handling logic for the core runtime.

use std::time::Instant;

use tracing::debug;

use crate::engine::core::CoreState;
use crate::engine::{RestartState, TriggerSource};

/// Command produced by the pure core, to be executed by the outer IO shell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreCommand {
    /// Run one poll pass over the watched tree.
    PollWatches,
    /// Terminate the current child.
    KillChild,
    /// Start a new child.
    StartChild,
}

/// Decision returned by the core after handling a single `LoopEvent`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CoreStep {
    /// Commands the IO shell should execute, in order.
    pub commands: Vec<CoreCommand>,
    /// Whether the outer runtime loop should keep running.
    pub keep_running: bool,
}

impl CoreStep {
    pub(crate) fn continue_with(commands: Vec<CoreCommand>) -> Self {
        Self {
            commands,
            keep_running: true,
        }
    }

    pub(crate) fn stop() -> Self {
        Self {
            commands: Vec::new(),
            keep_running: false,
        }
    }
}

/// Handle a restart trigger.
///
/// Every trigger (re)arms the kill deadline, whatever the current phase:
/// a burst of triggers collapses into one restart that happens
/// `kill_latency` after the last of them. A trigger while a start is
/// pending moves the machine back to `PendingKill`; killing a non-existent
/// child is a no-op.
pub fn handle_trigger(state: &mut CoreState, source: TriggerSource, now: Instant) -> CoreStep {
    debug!(?source, previous = ?state.phase, "restart triggered");
    state.phase = RestartState::PendingKill;
    state.deadline = Some(now + state.timings.kill_latency);
    CoreStep::continue_with(Vec::new())
}

/// Handle a timer wake-up.
///
/// Emits every command whose time has come, in order. With a zero start
/// latency a single wake-up yields both `KillChild` and `StartChild`.
pub fn handle_timer(state: &mut CoreState, now: Instant) -> CoreStep {
    let mut commands = Vec::new();

    while let Some(deadline) = state.deadline {
        if now < deadline {
            break;
        }
        match state.phase {
            RestartState::PendingKill => {
                commands.push(CoreCommand::KillChild);
                state.phase = RestartState::PendingStart;
                state.deadline = Some(now + state.timings.start_latency);
            }
            RestartState::PendingStart => {
                commands.push(CoreCommand::StartChild);
                state.phase = RestartState::Idle;
                state.deadline = None;
            }
            RestartState::Idle => state.deadline = None,
        }
    }

    if let Some(next_poll) = state.next_poll {
        if now >= next_poll && state.polls_active() {
            commands.push(CoreCommand::PollWatches);
            if let Some(interval) = state.timings.poll_interval {
                state.next_poll = Some(now + interval);
            }
        }
    }

    CoreStep::continue_with(commands)
}
