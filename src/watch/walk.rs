// src/watch/walk.rs

//! Directory discovery shared by both engines.
//!
//! The walk is synchronous and not interruptible; watched trees are expected
//! to be development-scale.

use std::borrow::Cow;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use tracing::{debug, warn};
use walkdir::WalkDir;

/// One entry seen while walking a watch root.
#[derive(Debug, Clone)]
pub struct WalkEntry {
    pub path: PathBuf,
    /// 0 for the root itself.
    pub depth: usize,
    pub is_dir: bool,
    pub modified: Option<SystemTime>,
}

/// Walk `root`, following symlinks, in file-name order.
///
/// - `recursive = true`: every descendant.
/// - `recursive = false`: the root and its immediate children; child
///   directories are not reported.
///
/// An inaccessible root logs a warning and yields nothing. Entries that
/// vanish or cannot be stat'ed mid-walk are skipped.
pub fn walk(root: &Path, recursive: bool) -> Vec<WalkEntry> {
    if let Err(e) = std::fs::metadata(root) {
        warn!(path = ?root, error = %e, "unable to stat watch path");
        return Vec::new();
    }

    let max_depth = if recursive { usize::MAX } else { 1 };
    let walker = WalkDir::new(root)
        .follow_links(true)
        .max_depth(max_depth)
        .sort_by_file_name();

    let mut entries = Vec::new();
    for item in walker {
        let entry = match item {
            Ok(entry) => entry,
            Err(e) => {
                debug!(error = %e, "skipping entry during walk");
                continue;
            }
        };

        let is_dir = entry.file_type().is_dir();
        if !recursive && is_dir && entry.depth() > 0 {
            continue;
        }

        let modified = match entry.metadata() {
            Ok(meta) => meta.modified().ok(),
            Err(e) => {
                debug!(path = ?entry.path(), error = %e, "unable to stat entry; skipping");
                continue;
            }
        };

        entries.push(WalkEntry {
            depth: entry.depth(),
            is_dir,
            modified,
            path: entry.into_path(),
        });
    }

    entries
}

/// Name used for pattern matching: the last path component, or the whole
/// path when there is none (e.g. `/`).
pub fn entry_name(path: &Path) -> Cow<'_, str> {
    match path.file_name() {
        Some(name) => name.to_string_lossy(),
        None => path.to_string_lossy(),
    }
}
