// src/config/validate.rs

use std::path::PathBuf;
use std::time::Duration;

use nix::sys::signal::Signal;
use tracing::warn;

use crate::config::model::{FileSettings, ListMerge, RawSettings, ServerSettings, Settings};
use crate::errors::{RespawnError, Result};
use crate::types::parse_signal;
use crate::watch::WatchOptions;

impl Settings {
    /// Defaults, then each file layer (lists replace), then the command
    /// line (lists extend), then validation.
    pub fn resolve(
        file_layers: &[FileSettings],
        cli_layer: &FileSettings,
        command: Vec<String>,
    ) -> Result<Self> {
        let mut raw = RawSettings::default();
        for layer in file_layers {
            raw.apply(layer, ListMerge::Replace);
        }
        raw.apply(cli_layer, ListMerge::Append);
        raw.command = command;

        Self::try_from(raw)
    }
}

impl TryFrom<RawSettings> for Settings {
    type Error = RespawnError;

    fn try_from(raw: RawSettings) -> std::result::Result<Self, Self::Error> {
        validate_raw_settings(&raw)?;

        let kill_signal = match parse_signal(&raw.kill_signal) {
            Some(sig) => sig,
            None => {
                warn!(signal = %raw.kill_signal, "unrecognized kill signal; using SIGTERM");
                Signal::SIGTERM
            }
        };

        let redirect_signals = raw
            .redirect_signals
            .iter()
            .filter_map(|name| {
                let sig = parse_signal(name);
                if sig.is_none() {
                    warn!(signal = %name, "unrecognized signal for redirection; ignoring");
                }
                sig
            })
            .collect();

        let watch_paths = if raw.watch_paths.is_empty() {
            vec![std::env::current_dir()?]
        } else {
            raw.watch_paths.iter().map(PathBuf::from).collect()
        };

        // Non-recursive mode implicitly excludes node updates.
        let watch = WatchOptions {
            recursive: raw.recursive,
            update_nodes: raw.recursive && raw.update_nodes,
            dirs_only: raw.dirs_only,
            files_only: raw.files_only,
        };

        let kill_timeout = if raw.kill_timeout > 0.0 {
            Some(Duration::from_secs_f64(raw.kill_timeout))
        } else {
            None
        };

        let server = raw.server_interface.map(|interface| ServerSettings {
            interface,
            port: raw.server_port,
        });

        Ok(Settings {
            engine: raw.engine,
            watch_paths,
            watch,
            include: raw.include,
            exclude: raw.exclude,
            poll_interval: Duration::from_secs_f64(raw.poll_interval),
            kill_signal,
            kill_latency: Duration::from_secs_f64(raw.kill_latency),
            kill_timeout,
            start_latency: Duration::from_secs_f64(raw.start_latency),
            redirect_input: raw.redirect_input,
            redirect_output: raw.redirect_output,
            redirect_signals,
            server,
            command: raw.command,
        })
    }
}

/// Run semantic validation against accumulated settings.
///
/// This checks:
/// - a command to supervise was given
/// - all latencies / timeouts are finite and non-negative
/// - the poll interval is strictly positive
/// - `watch-dirs-only` and `watch-files-only` are not both set
///
/// Regex patterns are *not* validated here: an invalid pattern is dropped
/// with a warning when the pattern set is compiled.
pub fn validate_raw_settings(raw: &RawSettings) -> Result<()> {
    ensure_has_command(raw)?;
    validate_seconds("kill-latency", raw.kill_latency)?;
    validate_seconds("kill-timeout", raw.kill_timeout)?;
    validate_seconds("start-latency", raw.start_latency)?;
    validate_seconds("poll-interval", raw.poll_interval)?;
    if raw.poll_interval == 0.0 {
        return Err(RespawnError::ConfigError(
            "poll-interval must be > 0 (got 0)".to_string(),
        ));
    }
    if raw.dirs_only && raw.files_only {
        return Err(RespawnError::ConfigError(
            "watch-dirs-only and watch-files-only are mutually exclusive".to_string(),
        ));
    }
    Ok(())
}

fn ensure_has_command(raw: &RawSettings) -> Result<()> {
    match raw.command.first() {
        Some(program) if !program.is_empty() => Ok(()),
        _ => Err(RespawnError::ConfigError(
            "no command to supervise was given".to_string(),
        )),
    }
}

fn validate_seconds(key: &str, value: f64) -> Result<()> {
    if !value.is_finite() || value < 0.0 {
        return Err(RespawnError::ConfigError(format!(
            "{key} must be a non-negative number of seconds (got {value})"
        )));
    }
    // Duration::from_secs_f64 panics past u64::MAX seconds.
    if value > u32::MAX as f64 {
        return Err(RespawnError::ConfigError(format!(
            "{key} is out of range (got {value})"
        )));
    }
    Ok(())
}
