#![allow(dead_code)]

use std::path::Path;

use respawn::config::{RawSettings, Settings};
use respawn::types::EngineKind;

/// Builder for `Settings` to simplify test setup.
///
/// Starts from the built-in defaults with the given command; every setter
/// mirrors one config key.
pub struct SettingsBuilder {
    raw: RawSettings,
}

impl SettingsBuilder {
    pub fn new(command: &[&str]) -> Self {
        Self {
            raw: RawSettings {
                command: command.iter().map(|s| s.to_string()).collect(),
                ..RawSettings::default()
            },
        }
    }

    pub fn engine(mut self, engine: EngineKind) -> Self {
        self.raw.engine = engine;
        self
    }

    pub fn watch_path(mut self, path: impl AsRef<Path>) -> Self {
        self.raw
            .watch_paths
            .push(path.as_ref().to_string_lossy().into_owned());
        self
    }

    pub fn include(mut self, pattern: &str) -> Self {
        self.raw.include.push(pattern.to_string());
        self
    }

    pub fn exclude(mut self, pattern: &str) -> Self {
        self.raw.exclude.push(pattern.to_string());
        self
    }

    pub fn recursive(mut self, val: bool) -> Self {
        self.raw.recursive = val;
        self
    }

    pub fn update_nodes(mut self, val: bool) -> Self {
        self.raw.update_nodes = val;
        self
    }

    pub fn files_only(mut self, val: bool) -> Self {
        self.raw.files_only = val;
        self
    }

    pub fn dirs_only(mut self, val: bool) -> Self {
        self.raw.dirs_only = val;
        self
    }

    pub fn poll_interval(mut self, secs: f64) -> Self {
        self.raw.poll_interval = secs;
        self
    }

    pub fn kill_signal(mut self, signal: &str) -> Self {
        self.raw.kill_signal = signal.to_string();
        self
    }

    pub fn kill_latency(mut self, secs: f64) -> Self {
        self.raw.kill_latency = secs;
        self
    }

    pub fn kill_timeout(mut self, secs: f64) -> Self {
        self.raw.kill_timeout = secs;
        self
    }

    pub fn start_latency(mut self, secs: f64) -> Self {
        self.raw.start_latency = secs;
        self
    }

    pub fn redirect_signal(mut self, signal: &str) -> Self {
        self.raw.redirect_signals.push(signal.to_string());
        self
    }

    /// The accumulated, unvalidated settings.
    pub fn raw(self) -> RawSettings {
        self.raw
    }

    pub fn build(self) -> Settings {
        Settings::try_from(self.raw).expect("Failed to build valid settings from builder")
    }
}
