// src/watch/poll.rs

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::{debug, trace};

use crate::watch::patterns::PatternSet;
use crate::watch::walk::{entry_name, walk, WalkEntry};
use crate::watch::{Dispatch, WatchOptions};

/// Poll-based change detection.
///
/// Tracks the last-modified time of every node that passes the kind and
/// pattern filters. Nodes are keyed by path, so a rescan is compared by
/// lookup rather than by position and does not depend on directory
/// enumeration order.
///
/// A directory's own timestamp moves whenever any entry inside it is
/// created or removed, filtered or not. Outside dirs-only mode directories
/// are therefore compared by presence only; membership changes that matter
/// show up as tracked nodes appearing or disappearing.
#[derive(Debug)]
pub struct PollEngine {
    options: WatchOptions,
    patterns: PatternSet,
    roots: Vec<PathBuf>,
    nodes: BTreeMap<PathBuf, Node>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Node {
    modified: SystemTime,
    is_dir: bool,
}

impl PollEngine {
    pub fn new(options: WatchOptions, patterns: PatternSet) -> Self {
        Self {
            options,
            patterns,
            roots: Vec::new(),
            nodes: BTreeMap::new(),
        }
    }

    /// Register watch roots and take a fresh snapshot of every node under
    /// all roots.
    pub fn add_roots(&mut self, roots: &[PathBuf]) {
        for root in roots {
            debug!(path = ?root, "adding poll root");
            self.roots.push(root.clone());
        }
        self.nodes = self.scan();
        debug!(nodes = self.nodes.len(), "poll snapshot taken");
    }

    /// Check for changes since the previous call.
    ///
    /// - With `update_nodes`: rediscover the whole tree. A different node
    ///   count, a node that is new, or a tracked timestamp that differs
    ///   means `Changed`. The new snapshot replaces the old one.
    /// - Without: re-stat the known nodes only. Timestamps are updated in
    ///   place; a node that cannot be stat'ed (most likely removed) is not a
    ///   change.
    pub fn dispatch(&mut self) -> Dispatch {
        let changed = if self.options.update_nodes {
            let fresh = self.scan();
            let changed = fresh.len() != self.nodes.len()
                || fresh.iter().any(|(path, node)| match self.nodes.get(path) {
                    Some(old) => self.stamp_differs(old, node.modified),
                    None => true,
                });
            self.nodes = fresh;
            changed
        } else {
            let mut changed = false;
            let dirs_only = self.options.dirs_only;
            for (path, node) in self.nodes.iter_mut() {
                let modified = match std::fs::metadata(path).and_then(|m| m.modified()) {
                    Ok(m) => m,
                    Err(e) => {
                        trace!(path = ?path, error = %e, "node not accessible; ignoring");
                        continue;
                    }
                };
                if node.modified != modified {
                    let counts = !node.is_dir || dirs_only;
                    node.modified = modified;
                    if counts {
                        debug!(path = ?path, "node timestamp changed");
                        changed = true;
                    }
                }
            }
            changed
        };

        if changed {
            Dispatch::Changed
        } else {
            Dispatch::Unchanged
        }
    }

    /// Tracked nodes with their last seen modification time, in path order.
    pub fn nodes(&self) -> impl Iterator<Item = (&Path, SystemTime)> {
        self.nodes.iter().map(|(p, n)| (p.as_path(), n.modified))
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    fn scan(&self) -> BTreeMap<PathBuf, Node> {
        let mut nodes = BTreeMap::new();
        for root in &self.roots {
            for entry in walk(root, self.options.recursive) {
                if self.keeps(&entry) {
                    let node = Node {
                        modified: entry.modified.unwrap_or(SystemTime::UNIX_EPOCH),
                        is_dir: entry.is_dir,
                    };
                    nodes.insert(entry.path, node);
                }
            }
        }
        nodes
    }

    /// Directory timestamps only count in dirs-only mode.
    fn stamp_differs(&self, old: &Node, modified: SystemTime) -> bool {
        old.modified != modified && (!old.is_dir || self.options.dirs_only)
    }

    /// Kind filter first, then the pattern filter on the entry name.
    fn keeps(&self, entry: &WalkEntry) -> bool {
        let kind_ok = if entry.is_dir {
            !self.options.files_only
        } else {
            // The root itself is tracked even in dirs-only mode.
            entry.depth == 0 || !self.options.dirs_only
        };
        kind_ok && self.patterns.matches(&entry_name(&entry.path))
    }
}
