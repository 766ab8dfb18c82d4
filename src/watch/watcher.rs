// src/watch/watcher.rs

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use notify::event::{AccessKind, AccessMode, CreateKind, ModifyKind, RemoveKind, RenameMode};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use crate::errors::Result;
use crate::watch::patterns::PatternSet;
use crate::watch::walk::{entry_name, walk};
use crate::watch::{Dispatch, WatchOptions};

/// One raw record from the notification channel.
pub type RawEvent = notify::Result<Event>;

/// Opaque identifier of one OS-level watch registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WatchHandle(u64);

/// Bidirectional handle <-> path table.
///
/// Each live handle maps to exactly one path and vice versa.
#[derive(Debug, Default)]
struct WatchTable {
    by_handle: BTreeMap<WatchHandle, PathBuf>,
    by_path: HashMap<PathBuf, WatchHandle>,
    next: u64,
}

impl WatchTable {
    fn insert(&mut self, path: &Path) -> WatchHandle {
        if let Some(handle) = self.by_path.get(path) {
            return *handle;
        }
        let handle = WatchHandle(self.next);
        self.next += 1;
        self.by_handle.insert(handle, path.to_path_buf());
        self.by_path.insert(path.to_path_buf(), handle);
        handle
    }

    fn contains(&self, path: &Path) -> bool {
        self.by_path.contains_key(path)
    }

    /// Remove `path` and everything registered below it.
    fn remove_tree(&mut self, path: &Path) -> Vec<(WatchHandle, PathBuf)> {
        let doomed: Vec<WatchHandle> = self
            .by_path
            .iter()
            .filter(|(p, _)| p.starts_with(path))
            .map(|(_, h)| *h)
            .collect();

        doomed
            .into_iter()
            .filter_map(|handle| {
                let path = self.by_handle.remove(&handle)?;
                self.by_path.remove(&path);
                Some((handle, path))
            })
            .collect()
    }

    fn len(&self) -> usize {
        self.by_handle.len()
    }
}

/// Notification-driven change detection on top of `notify`.
///
/// Every directory under the roots gets its own non-recursive registration,
/// so new subdirectories are picked up by this engine (when `update_nodes`
/// is set) rather than by the backend, and removed ones are purged from the
/// handle table as soon as the event for them is dispatched.
pub struct NotifyEngine {
    options: WatchOptions,
    patterns: PatternSet,
    watcher: RecommendedWatcher,
    events: mpsc::UnboundedReceiver<RawEvent>,
    table: WatchTable,
    closed: bool,
}

impl std::fmt::Debug for NotifyEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotifyEngine")
            .field("options", &self.options)
            .field("patterns", &self.patterns)
            .field("watched", &self.table.len())
            .finish_non_exhaustive()
    }
}

impl NotifyEngine {
    /// Create the backend watcher. Nothing is watched until
    /// [`add_roots`](Self::add_roots) is called.
    pub fn new(options: WatchOptions, patterns: PatternSet) -> Result<Self> {
        // Channel from the blocking notify callback into the async world.
        let (event_tx, events) = mpsc::unbounded_channel::<RawEvent>();

        let watcher = RecommendedWatcher::new(
            move |res: RawEvent| {
                // The receiver only goes away when the engine is closed.
                let _ = event_tx.send(res);
            },
            Config::default(),
        )?;

        Ok(Self {
            options,
            patterns,
            watcher,
            events,
            table: WatchTable::default(),
            closed: false,
        })
    }

    /// Register every root (and, in recursive mode, every directory below
    /// it). Failures on individual paths are warnings.
    pub fn add_roots(&mut self, roots: &[PathBuf]) {
        for root in roots {
            self.register_tree(root);
        }
        info!(watched = self.table.len(), "notify watches registered");
    }

    /// Wait for the next raw event.
    ///
    /// Cancel safe. If the backend goes away this never resolves again.
    pub async fn recv(&mut self) -> RawEvent {
        if !self.closed {
            match self.events.recv().await {
                Some(raw) => return raw,
                None => {
                    warn!("notify event channel closed; no further change events");
                    self.closed = true;
                }
            }
        }
        std::future::pending().await
    }

    /// Interpret exactly one raw event.
    ///
    /// - A new directory (created, moved in, or made accessible) is
    ///   registered recursively when `update_nodes` is set.
    /// - A removed or moved-away path is purged from the handle table.
    /// - The result is `Changed` iff one of the event's entry names passes
    ///   the pattern filter.
    pub fn dispatch(&mut self, raw: RawEvent) -> Dispatch {
        let event = match raw {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, "dispatching notify event failed");
                return Dispatch::Error;
            }
        };

        trace!(?event, "notify event");

        if !is_relevant(&event.kind) {
            return Dispatch::Unchanged;
        }

        match event.kind {
            EventKind::Create(_)
            | EventKind::Modify(ModifyKind::Metadata(_))
            | EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
                for path in &event.paths {
                    self.maybe_register(path);
                }
            }
            EventKind::Remove(_) | EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
                for path in &event.paths {
                    self.purge(path);
                }
            }
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
                if let [from, to] = event.paths.as_slice() {
                    self.purge(from);
                    self.maybe_register(to);
                }
            }
            _ => {}
        }

        let matched = event.paths.iter().any(|path| {
            if self.options.files_only && subject_is_dir(&event.kind, path) {
                return false;
            }
            self.patterns.matches(&entry_name(path))
        });

        if matched {
            debug!(paths = ?event.paths, kind = ?event.kind, "relevant change");
            Dispatch::Changed
        } else {
            Dispatch::Unchanged
        }
    }

    /// Paths that currently have a live registration.
    pub fn watched_paths(&self) -> impl Iterator<Item = &Path> {
        self.table.by_handle.values().map(PathBuf::as_path)
    }

    /// Handle registered for `path`, if any.
    pub fn handle_of(&self, path: &Path) -> Option<WatchHandle> {
        self.table.by_path.get(path).copied()
    }

    fn maybe_register(&mut self, path: &Path) {
        if self.options.update_nodes && path.is_dir() && !self.table.contains(path) {
            debug!(path = ?path, "new directory; extending watch");
            self.register_tree(path);
        }
    }

    fn register_tree(&mut self, root: &Path) {
        for entry in walk(root, self.options.recursive) {
            // Directories carry the events for their children; a root
            // that is a plain file is watched on its own.
            if entry.is_dir || entry.depth == 0 {
                self.register(&entry.path);
            }
        }
    }

    fn register(&mut self, path: &Path) {
        if self.table.contains(path) {
            return;
        }
        match self.watcher.watch(path, RecursiveMode::NonRecursive) {
            Ok(()) => {
                let handle = self.table.insert(path);
                trace!(path = ?path, ?handle, "watch added");
            }
            Err(e) => warn!(path = ?path, error = %e, "unable to add watch"),
        }
    }

    fn purge(&mut self, path: &Path) {
        for (handle, stale) in self.table.remove_tree(path) {
            debug!(path = ?stale, ?handle, "watch invalidated; purging");
            // The backend usually dropped the watch already.
            if let Err(e) = self.watcher.unwatch(&stale) {
                trace!(path = ?stale, error = %e, "unwatch after invalidation");
            }
        }
    }
}

/// Reads and opens do not change anything; everything else might.
fn is_relevant(kind: &EventKind) -> bool {
    match kind {
        EventKind::Access(AccessKind::Close(AccessMode::Write)) => true,
        EventKind::Access(_) => false,
        _ => true,
    }
}

fn subject_is_dir(kind: &EventKind, path: &Path) -> bool {
    match kind {
        EventKind::Create(CreateKind::Folder) | EventKind::Remove(RemoveKind::Folder) => true,
        _ => path.is_dir(),
    }
}
