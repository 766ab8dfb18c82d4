// src/cli.rs

//! CLI argument parsing using `clap`.
//!
//! Every config-file key has a matching long flag. Values given here form
//! the highest-priority layer; list flags add to the lists from the files.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

use crate::config::{FileSettings, OutputSetting};
use crate::types::{parse_bool, EngineKind};

/// Command-line arguments for `respawn`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "respawn",
    version,
    about = "Restart a command whenever the files it depends on change.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML).
    ///
    /// Default: `respawn/respawn.toml` in the user config directory, if it
    /// exists.
    #[arg(short = 'c', long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Change detection engine: `notify` or `poll`.
    #[arg(long, value_name = "ENGINE")]
    pub watch_engine: Option<EngineKind>,

    /// Watch this file or directory (repeatable). Default: current directory.
    #[arg(short = 'p', long = "watch-path", value_name = "PATH")]
    pub watch_path: Vec<String>,

    /// Descend into subdirectories.
    #[arg(short = 'r', long, value_name = "BOOL", value_parser = parse_bool)]
    pub watch_recursive: Option<bool>,

    /// Pick up files and directories created after start-up.
    #[arg(short = 'u', long, value_name = "BOOL", value_parser = parse_bool)]
    pub watch_update_nodes: Option<bool>,

    /// Only names matching one of these regexes count (repeatable).
    #[arg(short = 'i', long = "watch-include", value_name = "REGEX")]
    pub watch_include: Vec<String>,

    /// Names matching one of these regexes never count (repeatable).
    #[arg(short = 'e', long = "watch-exclude", value_name = "REGEX")]
    pub watch_exclude: Vec<String>,

    /// Only track directories (poll engine).
    #[arg(long, value_name = "BOOL", value_parser = parse_bool)]
    pub watch_dirs_only: Option<bool>,

    /// Ignore changes to directories themselves.
    #[arg(long, value_name = "BOOL", value_parser = parse_bool)]
    pub watch_files_only: Option<bool>,

    /// Seconds between two poll passes.
    #[arg(long, value_name = "SECONDS")]
    pub poll_interval: Option<f64>,

    /// Signal used to stop the child, by name or number.
    #[arg(short = 'k', long, value_name = "SIGNAL")]
    pub kill_signal: Option<String>,

    /// Seconds of quiet after the last change before the child is killed.
    #[arg(short = 'l', long, value_name = "SECONDS")]
    pub kill_latency: Option<f64>,

    /// Seconds to wait for the child to die before sending SIGKILL; 0
    /// waits forever.
    #[arg(long, value_name = "SECONDS")]
    pub kill_timeout: Option<f64>,

    /// Seconds between killing the child and starting the next one.
    #[arg(long, value_name = "SECONDS")]
    pub start_latency: Option<f64>,

    /// Forward our stdin to the child.
    #[arg(short = 't', long, value_name = "BOOL", value_parser = parse_bool)]
    pub redirect_input: Option<bool>,

    /// Write the child's stdout and stderr to this file (truncated on each
    /// start).
    #[arg(short = 'o', long, value_name = "PATH")]
    pub redirect_output: Option<String>,

    /// Relay this signal to the child (repeatable).
    #[arg(short = 's', long = "redirect-signal", value_name = "SIGNAL")]
    pub redirect_signal: Vec<String>,

    /// Listen for remote triggers on `any`, an address, or an interface
    /// name; `none` disables.
    #[arg(long, value_name = "IFACE")]
    pub server_interface: Option<String>,

    /// UDP port of the remote trigger listener.
    #[arg(long, value_name = "PORT")]
    pub server_port: Option<u16>,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `RESPAWN_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Resolve and print the configuration, but don't run anything.
    #[arg(long)]
    pub dry_run: bool,

    /// Program to supervise, followed by its arguments.
    #[arg(
        value_name = "COMMAND",
        required = true,
        num_args = 1..,
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    pub command: Vec<String>,
}

impl CliArgs {
    /// The program part of the command.
    pub fn program(&self) -> &str {
        self.command.first().map(String::as_str).unwrap_or_default()
    }

    /// The command line as a settings layer.
    pub fn to_layer(&self) -> FileSettings {
        fn list(values: &[String]) -> Option<Vec<String>> {
            (!values.is_empty()).then(|| values.to_vec())
        }

        FileSettings {
            watch_engine: self.watch_engine,
            watch_path: list(&self.watch_path),
            watch_recursive: self.watch_recursive,
            watch_update_nodes: self.watch_update_nodes,
            watch_include: list(&self.watch_include),
            watch_exclude: list(&self.watch_exclude),
            watch_dirs_only: self.watch_dirs_only,
            watch_files_only: self.watch_files_only,
            poll_interval: self.poll_interval,
            kill_signal: self.kill_signal.clone(),
            kill_latency: self.kill_latency,
            kill_timeout: self.kill_timeout,
            start_latency: self.start_latency,
            redirect_input: self.redirect_input,
            redirect_output: self.redirect_output.clone().map(OutputSetting::Path),
            redirect_signal: list(&self.redirect_signal),
            server_interface: self.server_interface.clone(),
            server_port: self.server_port,
        }
    }
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
