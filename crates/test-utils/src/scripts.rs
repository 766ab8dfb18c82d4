//! Child programs for process-level tests.
//!
//! Scripts are run as `sh <script>`; the script file itself is never
//! exec'ed.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Write a script that appends one line to `counter` every time it starts,
/// then stays alive until killed.
pub fn write_counter_script(dir: &Path, counter: &Path) -> io::Result<PathBuf> {
    let script = dir.join("counter.sh");
    let body = format!(
        "#!/bin/sh\necho started >> '{}'\nexec sleep 30\n",
        counter.display()
    );
    fs::write(&script, body)?;
    Ok(script)
}

/// Command line that runs `script` with the system shell.
pub fn sh_command(script: &Path) -> Vec<String> {
    vec!["sh".to_string(), script.to_string_lossy().into_owned()]
}

/// Number of lines in `path`; 0 when it does not exist yet.
pub fn count_lines(path: &Path) -> usize {
    fs::read_to_string(path)
        .map(|s| s.lines().count())
        .unwrap_or(0)
}

/// Poll `path` until it holds at least `expected` lines or `limit` passes.
/// Returns the last count seen.
pub async fn wait_for_count(path: &Path, expected: usize, limit: Duration) -> usize {
    let deadline = tokio::time::Instant::now() + limit;
    loop {
        let count = count_lines(path);
        if count >= expected || tokio::time::Instant::now() >= deadline {
            return count;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
}
