// tests/poll_engine.rs
mod common;
use crate::common::{init_tracing, TestResult};

use std::fs;
use std::path::Path;
use std::time::{Duration, SystemTime};

use respawn::watch::{Dispatch, PatternSet, PollEngine, WatchOptions};

/// Move a file's mtime well away from its current value so the change is
/// visible regardless of filesystem timestamp granularity.
fn bump_mtime(path: &Path) -> std::io::Result<()> {
    let file = fs::OpenOptions::new().write(true).open(path)?;
    file.set_modified(SystemTime::now() + Duration::from_secs(60))
}

fn engine_on(root: &Path, options: WatchOptions, patterns: PatternSet) -> PollEngine {
    let mut engine = PollEngine::new(options, patterns);
    engine.add_roots(&[root.to_path_buf()]);
    engine
}

#[test]
fn unchanged_tree_reports_nothing() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    fs::write(dir.path().join("a.txt"), "a")?;
    fs::create_dir(dir.path().join("sub"))?;
    fs::write(dir.path().join("sub/b.txt"), "b")?;

    let mut engine = engine_on(dir.path(), WatchOptions::default(), PatternSet::default());

    // root, a.txt, sub, sub/b.txt
    assert_eq!(engine.len(), 4);
    assert_eq!(engine.dispatch(), Dispatch::Unchanged);
    assert_eq!(engine.dispatch(), Dispatch::Unchanged);

    Ok(())
}

#[test]
fn touched_file_reports_exactly_one_change() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let file = dir.path().join("main.rs");
    fs::write(&file, "fn main() {}")?;

    let mut engine = engine_on(dir.path(), WatchOptions::default(), PatternSet::default());

    bump_mtime(&file)?;
    assert_eq!(engine.dispatch(), Dispatch::Changed);
    assert_eq!(engine.dispatch(), Dispatch::Unchanged);

    Ok(())
}

#[test]
fn touched_file_without_node_updates_is_still_seen() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let file = dir.path().join("main.rs");
    fs::write(&file, "fn main() {}")?;

    let options = WatchOptions {
        update_nodes: false,
        ..WatchOptions::default()
    };
    let mut engine = engine_on(dir.path(), options, PatternSet::default());

    bump_mtime(&file)?;
    assert_eq!(engine.dispatch(), Dispatch::Changed);
    assert_eq!(engine.dispatch(), Dispatch::Unchanged);

    Ok(())
}

#[test]
fn new_file_is_a_change_with_node_updates() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    fs::write(dir.path().join("a.txt"), "a")?;

    let options = WatchOptions {
        files_only: true,
        ..WatchOptions::default()
    };
    let mut engine = engine_on(dir.path(), options, PatternSet::default());
    assert_eq!(engine.len(), 1);

    fs::write(dir.path().join("b.txt"), "b")?;
    assert_eq!(engine.dispatch(), Dispatch::Changed);
    assert_eq!(engine.len(), 2);
    assert_eq!(engine.dispatch(), Dispatch::Unchanged);

    Ok(())
}

#[test]
fn new_file_is_ignored_without_node_updates() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    fs::write(dir.path().join("a.txt"), "a")?;

    let options = WatchOptions {
        update_nodes: false,
        files_only: true,
        ..WatchOptions::default()
    };
    let mut engine = engine_on(dir.path(), options, PatternSet::default());

    fs::write(dir.path().join("b.txt"), "b")?;
    assert_eq!(engine.dispatch(), Dispatch::Unchanged);
    assert_eq!(engine.len(), 1);

    Ok(())
}

#[test]
fn removed_file_is_a_change_with_node_updates() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    fs::write(dir.path().join("a.txt"), "a")?;
    fs::write(dir.path().join("b.txt"), "b")?;

    let options = WatchOptions {
        files_only: true,
        ..WatchOptions::default()
    };
    let mut engine = engine_on(dir.path(), options, PatternSet::default());

    fs::remove_file(dir.path().join("b.txt"))?;
    assert_eq!(engine.dispatch(), Dispatch::Changed);
    assert_eq!(engine.len(), 1);

    Ok(())
}

#[test]
fn excluded_names_are_not_tracked() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let temp = dir.path().join("temp.txt");
    fs::write(&temp, "t")?;
    fs::write(dir.path().join("keep.txt"), "k")?;

    let patterns = PatternSet::compile(&[r"\.txt$"], &[r"^temp\.txt$"]);
    let mut engine = engine_on(dir.path(), WatchOptions::default(), patterns);

    let tracked: Vec<_> = engine.nodes().map(|(p, _)| p.to_path_buf()).collect();
    assert_eq!(tracked, vec![dir.path().join("keep.txt")]);

    bump_mtime(&temp)?;
    assert_eq!(engine.dispatch(), Dispatch::Unchanged);

    Ok(())
}

#[test]
fn creating_an_excluded_file_is_not_a_change() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    fs::write(dir.path().join("keep.txt"), "k")?;

    let patterns = PatternSet::compile::<&str>(&[], &[r"^temp\.txt$"]);
    let mut engine = engine_on(dir.path(), WatchOptions::default(), patterns);
    // root and keep.txt
    assert_eq!(engine.len(), 2);

    fs::write(dir.path().join("temp.txt"), "t")?;
    assert_eq!(engine.dispatch(), Dispatch::Unchanged);

    fs::write(dir.path().join("other.txt"), "o")?;
    assert_eq!(engine.dispatch(), Dispatch::Changed);
    assert_eq!(engine.len(), 3);

    Ok(())
}

#[test]
fn dirs_only_sees_entries_created_inside_a_directory() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let sub = dir.path().join("sub");
    fs::create_dir(&sub)?;
    fs::File::open(&sub)?.set_modified(SystemTime::UNIX_EPOCH + Duration::from_secs(1_000))?;

    let options = WatchOptions {
        dirs_only: true,
        ..WatchOptions::default()
    };
    let mut engine = engine_on(dir.path(), options, PatternSet::default());

    fs::write(sub.join("new.txt"), "n")?;
    assert_eq!(engine.dispatch(), Dispatch::Changed);
    assert_eq!(engine.dispatch(), Dispatch::Unchanged);

    Ok(())
}

#[test]
fn non_recursive_walk_skips_subdirectories() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    fs::write(dir.path().join("top.txt"), "t")?;
    fs::create_dir(dir.path().join("sub"))?;
    let nested = dir.path().join("sub/nested.txt");
    fs::write(&nested, "n")?;

    let options = WatchOptions {
        recursive: false,
        update_nodes: false,
        ..WatchOptions::default()
    };
    let mut engine = engine_on(dir.path(), options, PatternSet::default());

    // root and top.txt only
    assert_eq!(engine.len(), 2);
    bump_mtime(&nested)?;
    assert_eq!(engine.dispatch(), Dispatch::Unchanged);

    Ok(())
}

#[test]
fn dirs_only_tracks_directories_and_root() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    fs::write(dir.path().join("a.txt"), "a")?;
    fs::create_dir(dir.path().join("sub"))?;

    let options = WatchOptions {
        dirs_only: true,
        ..WatchOptions::default()
    };
    let engine = engine_on(dir.path(), options, PatternSet::default());

    let tracked: Vec<_> = engine.nodes().map(|(p, _)| p.to_path_buf()).collect();
    assert_eq!(tracked, vec![dir.path().to_path_buf(), dir.path().join("sub")]);

    Ok(())
}

#[test]
fn missing_root_is_not_fatal() -> TestResult {
    init_tracing();
    let dir = tempfile::tempdir()?;
    let missing = dir.path().join("does-not-exist");

    let mut engine = engine_on(&missing, WatchOptions::default(), PatternSet::default());
    assert!(engine.is_empty());
    assert_eq!(engine.dispatch(), Dispatch::Unchanged);

    Ok(())
}
