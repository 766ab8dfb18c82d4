// src/exec/mod.rs

//! Process supervision layer.
//!
//! - [`process`] owns the single supervised child: start, group kill, reap.
//! - [`input`] is the stdin pipe handed to every child plus the task that
//!   reads the supervisor's own stdin.
//! - [`relay`] forwards selected signals to the child's process group.

pub mod input;
pub mod process;
pub mod relay;

pub use input::{spawn_input_reader, spawn_stdin_reader, InputPipe};
pub use process::SupervisedProcess;
pub use relay::SignalRelay;
