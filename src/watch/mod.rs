// src/watch/mod.rs

//! File watching and change detection.
//!
//! This module is responsible for:
//! - Compiling include / exclude regex patterns (`patterns`).
//! - Discovering the watched tree (`walk`).
//! - Two interchangeable engines behind one contract:
//!   - [`PollEngine`]: periodic re-stat of the tree, driven by the caller's
//!     timer.
//!   - [`NotifyEngine`]: kernel notification through `notify`, with its own
//!     pollable event receiver.
//!
//! It does **not** know about processes or debouncing; it only answers
//! "did something relevant change?" once per dispatch.

pub mod patterns;
pub mod poll;
pub mod walk;
pub mod watcher;

use std::path::PathBuf;

use tracing::{info, warn};

use crate::types::EngineKind;

pub use patterns::PatternSet;
pub use poll::PollEngine;
pub use watcher::{NotifyEngine, RawEvent, WatchHandle};

/// Discovery flags shared by both engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WatchOptions {
    /// Descend into subdirectories of the roots.
    pub recursive: bool,
    /// Pick up nodes created after start-up.
    pub update_nodes: bool,
    /// Poll engine: track directories (and the roots) only.
    pub dirs_only: bool,
    /// Ignore directories themselves; only files count.
    pub files_only: bool,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            recursive: true,
            update_nodes: true,
            dirs_only: false,
            files_only: false,
        }
    }
}

/// Result of one dispatch call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    Unchanged,
    Changed,
    /// The raw event could not be read; already logged.
    Error,
}

/// The engine selected at start-up.
#[derive(Debug)]
pub enum WatchEngine {
    Poll(PollEngine),
    Notify(NotifyEngine),
}

impl WatchEngine {
    /// Build an engine of the requested kind.
    ///
    /// If the notification backend cannot be initialised, fall back to
    /// polling, which always works.
    pub fn new(kind: EngineKind, options: WatchOptions, patterns: PatternSet) -> Self {
        match kind {
            EngineKind::Poll => WatchEngine::Poll(PollEngine::new(options, patterns)),
            EngineKind::Notify => match NotifyEngine::new(options, patterns.clone()) {
                Ok(engine) => WatchEngine::Notify(engine),
                Err(e) => {
                    warn!(error = %e, "unable to initialise notify backend; falling back to polling");
                    WatchEngine::Poll(PollEngine::new(options, patterns))
                }
            },
        }
    }

    /// Build an engine and register `roots` in one go.
    pub fn with_roots(
        kind: EngineKind,
        options: WatchOptions,
        patterns: PatternSet,
        roots: &[PathBuf],
    ) -> Self {
        let mut engine = Self::new(kind, options, patterns);
        engine.add_roots(roots);
        engine
    }

    pub fn kind(&self) -> EngineKind {
        match self {
            WatchEngine::Poll(_) => EngineKind::Poll,
            WatchEngine::Notify(_) => EngineKind::Notify,
        }
    }

    /// True when the caller must drive [`poll`](Self::poll) from a timer.
    pub fn is_polling(&self) -> bool {
        matches!(self, WatchEngine::Poll(_))
    }

    /// Register watch roots. Roots are canonicalized when possible so that
    /// paths reported by the backend line up with the registered ones.
    pub fn add_roots(&mut self, roots: &[PathBuf]) {
        let roots: Vec<PathBuf> = roots
            .iter()
            .map(|r| r.canonicalize().unwrap_or_else(|_| r.clone()))
            .collect();

        info!(engine = ?self.kind(), roots = ?roots, "watching");

        match self {
            WatchEngine::Poll(engine) => engine.add_roots(&roots),
            WatchEngine::Notify(engine) => engine.add_roots(&roots),
        }
    }

    /// Wait for the next raw notification. Never resolves for the poll
    /// engine, which has nothing to wait on.
    pub async fn next_event(&mut self) -> RawEvent {
        match self {
            WatchEngine::Notify(engine) => engine.recv().await,
            WatchEngine::Poll(_) => std::future::pending().await,
        }
    }

    /// Dispatch one raw notification (notify engine only).
    pub fn dispatch_event(&mut self, raw: RawEvent) -> Dispatch {
        match self {
            WatchEngine::Notify(engine) => engine.dispatch(raw),
            WatchEngine::Poll(_) => Dispatch::Unchanged,
        }
    }

    /// Run one poll pass (poll engine only).
    pub fn poll(&mut self) -> Dispatch {
        match self {
            WatchEngine::Poll(engine) => engine.dispatch(),
            WatchEngine::Notify(_) => Dispatch::Unchanged,
        }
    }

    /// Release backend resources.
    pub fn close(self) {
        match self {
            WatchEngine::Poll(engine) => info!(nodes = engine.len(), "poll engine closed"),
            WatchEngine::Notify(engine) => {
                info!(watched = engine.watched_paths().count(), "notify engine closed");
                drop(engine);
            }
        }
    }
}
