use std::path::PathBuf;
use std::str::FromStr;

use nix::sys::signal::Signal;
use serde::Deserialize;

/// Which change-detection engine backs the watcher.
///
/// - `Poll`: periodically re-stat the watched tree. Always available.
/// - `Notify`: kernel-level change notification through the `notify` crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    Poll,
    #[default]
    #[serde(alias = "inotify")]
    Notify,
}

impl FromStr for EngineKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "poll" => Ok(EngineKind::Poll),
            "notify" | "inotify" => Ok(EngineKind::Notify),
            other => Err(format!(
                "invalid watch engine: {other} (expected \"poll\" or \"notify\")"
            )),
        }
    }
}

/// Where the supervised child's stdout/stderr go.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum OutputTarget {
    /// Child inherits the supervisor's stdout/stderr.
    #[default]
    Inherit,
    /// Both streams are truncated into this file on every start.
    File(PathBuf),
}

impl OutputTarget {
    /// Empty strings mean pass-through, anything else is a file path.
    pub fn from_path_str(s: &str) -> Self {
        if s.is_empty() {
            OutputTarget::Inherit
        } else {
            OutputTarget::File(PathBuf::from(s))
        }
    }
}

/// Parse a signal given by name (`SIGTERM`, `term`, `Hup`) or by number
/// (`15`, `0xf`).
///
/// Returns `None` if the value does not name a signal on this platform.
pub fn parse_signal(s: &str) -> Option<Signal> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }

    if let Some(num) = parse_int(s) {
        return Signal::try_from(num).ok();
    }

    let upper = s.to_ascii_uppercase();
    let name = if upper.starts_with("SIG") {
        upper
    } else {
        format!("SIG{upper}")
    };
    Signal::from_str(&name).ok()
}

/// Parse a boolean the permissive way users type them on a command line.
pub fn parse_bool(s: &str) -> Result<bool, String> {
    let s = s.trim();
    if let Some(num) = parse_int(s) {
        return Ok(num != 0);
    }
    match s.to_lowercase().as_str() {
        "true" | "yes" | "on" => Ok(true),
        "false" | "no" | "off" => Ok(false),
        other => Err(format!("invalid boolean: {other}")),
    }
}

fn parse_int(s: &str) -> Option<i32> {
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        return i32::from_str_radix(hex, 16).ok();
    }
    s.parse().ok()
}
