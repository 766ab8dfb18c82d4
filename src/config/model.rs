// src/config/model.rs

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use nix::sys::signal::Signal;
use serde::Deserialize;

use crate::types::{EngineKind, OutputTarget};
use crate::watch::WatchOptions;

/// Top-level configuration as read from a TOML file.
///
/// ```toml
/// watch-engine = "notify"
/// watch-path = ["src", "templates"]
/// watch-include = ['\.rs$', '\.html$']
/// watch-exclude = ['^temp\.txt$']
/// kill-latency = 0.5
/// redirect-signal = ["SIGUSR1"]
///
/// [app.server]
/// filename = "./target/debug/server"
/// watch-files-only = true
/// ```
///
/// The top-level keys apply to every supervised command. An `[app.<name>]`
/// section is layered on top when its `filename` names the supervised
/// program.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    #[serde(flatten)]
    pub global: FileSettings,

    /// Per-program overrides from `[app.<name>]`. Keys are free-form labels.
    #[serde(default)]
    pub app: BTreeMap<String, AppSection>,
}

impl ConfigFile {
    /// Layers that apply to `program`, lowest priority first.
    pub fn layers_for(&self, program: &str) -> Vec<FileSettings> {
        let mut layers = vec![self.global.clone()];
        for section in self.app.values() {
            if section.applies_to(program) {
                layers.push(section.settings.clone());
            }
        }
        layers
    }
}

/// `[app.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct AppSection {
    /// Program this section applies to, either exactly as given on the
    /// command line or by file name.
    pub filename: String,

    #[serde(flatten)]
    pub settings: FileSettings,
}

impl AppSection {
    fn applies_to(&self, program: &str) -> bool {
        if self.filename == program {
            return true;
        }
        Path::new(program)
            .file_name()
            .is_some_and(|name| name == self.filename.as_str())
    }
}

/// `redirect-output` accepts either a boolean or a path.
///
/// `false`, `true` and `""` all mean "pass through"; only a non-empty path
/// redirects.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum OutputSetting {
    Flag(bool),
    Path(String),
}

impl From<&OutputSetting> for OutputTarget {
    fn from(setting: &OutputSetting) -> Self {
        match setting {
            OutputSetting::Flag(_) => OutputTarget::Inherit,
            OutputSetting::Path(p) => OutputTarget::from_path_str(p),
        }
    }
}

/// One layer of settings: the global part of the file, an app section, or
/// the command line. Every field is optional; unset fields leave the layer
/// below untouched.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct FileSettings {
    pub watch_engine: Option<EngineKind>,
    pub watch_path: Option<Vec<String>>,
    pub watch_recursive: Option<bool>,
    pub watch_update_nodes: Option<bool>,
    pub watch_include: Option<Vec<String>>,
    pub watch_exclude: Option<Vec<String>>,
    pub watch_dirs_only: Option<bool>,
    pub watch_files_only: Option<bool>,

    /// Seconds between two scans of the poll engine.
    pub poll_interval: Option<f64>,

    pub kill_signal: Option<String>,
    /// Seconds.
    pub kill_latency: Option<f64>,
    /// Seconds before a graceful kill is escalated to SIGKILL. `0` disables.
    pub kill_timeout: Option<f64>,
    /// Seconds.
    pub start_latency: Option<f64>,

    pub redirect_input: Option<bool>,
    pub redirect_output: Option<OutputSetting>,
    pub redirect_signal: Option<Vec<String>>,

    /// Interface name, IP address, `any`, or `none` to disable.
    pub server_interface: Option<String>,
    pub server_port: Option<u16>,
}

/// Whether list-valued settings from a layer replace or extend the lists
/// accumulated so far.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListMerge {
    /// Config-file layers: a list given in a layer replaces the previous one.
    Replace,
    /// Command line: each `-p`/`-i`/`-e`/`-s` adds to what the files set.
    Append,
}

/// Accumulated, not yet validated settings.
///
/// Start from [`RawSettings::default`], [`apply`](RawSettings::apply) each
/// layer in priority order, then convert into [`Settings`] with
/// `Settings::try_from`, which validates.
#[derive(Debug, Clone)]
pub struct RawSettings {
    pub engine: EngineKind,
    pub watch_paths: Vec<String>,
    pub recursive: bool,
    pub update_nodes: bool,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub dirs_only: bool,
    pub files_only: bool,
    pub poll_interval: f64,
    pub kill_signal: String,
    pub kill_latency: f64,
    pub kill_timeout: f64,
    pub start_latency: f64,
    pub redirect_input: bool,
    pub redirect_output: OutputTarget,
    pub redirect_signals: Vec<String>,
    pub server_interface: Option<String>,
    pub server_port: u16,
    pub command: Vec<String>,
}

/// Default UDP port of the remote trigger listener.
pub const DEFAULT_SERVER_PORT: u16 = 3945;

impl Default for RawSettings {
    fn default() -> Self {
        Self {
            engine: EngineKind::default(),
            watch_paths: Vec::new(),
            recursive: true,
            update_nodes: true,
            include: Vec::new(),
            exclude: Vec::new(),
            dirs_only: false,
            files_only: false,
            poll_interval: 1.0,
            kill_signal: "SIGTERM".to_string(),
            kill_latency: 1.0,
            kill_timeout: 0.0,
            start_latency: 0.0,
            redirect_input: false,
            redirect_output: OutputTarget::Inherit,
            redirect_signals: Vec::new(),
            server_interface: None,
            server_port: DEFAULT_SERVER_PORT,
            command: Vec::new(),
        }
    }
}

impl RawSettings {
    /// Layer `layer` on top of the current values.
    pub fn apply(&mut self, layer: &FileSettings, lists: ListMerge) {
        fn merge_list(dst: &mut Vec<String>, src: &Option<Vec<String>>, lists: ListMerge) {
            if let Some(values) = src {
                if lists == ListMerge::Replace {
                    dst.clear();
                }
                dst.extend(values.iter().cloned());
            }
        }

        if let Some(engine) = layer.watch_engine {
            self.engine = engine;
        }
        merge_list(&mut self.watch_paths, &layer.watch_path, lists);
        if let Some(v) = layer.watch_recursive {
            self.recursive = v;
        }
        if let Some(v) = layer.watch_update_nodes {
            self.update_nodes = v;
        }
        merge_list(&mut self.include, &layer.watch_include, lists);
        merge_list(&mut self.exclude, &layer.watch_exclude, lists);
        if let Some(v) = layer.watch_dirs_only {
            self.dirs_only = v;
        }
        if let Some(v) = layer.watch_files_only {
            self.files_only = v;
        }
        if let Some(v) = layer.poll_interval {
            self.poll_interval = v;
        }
        if let Some(ref v) = layer.kill_signal {
            self.kill_signal = v.clone();
        }
        if let Some(v) = layer.kill_latency {
            self.kill_latency = v;
        }
        if let Some(v) = layer.kill_timeout {
            self.kill_timeout = v;
        }
        if let Some(v) = layer.start_latency {
            self.start_latency = v;
        }
        if let Some(v) = layer.redirect_input {
            self.redirect_input = v;
        }
        if let Some(ref v) = layer.redirect_output {
            self.redirect_output = OutputTarget::from(v);
        }
        merge_list(&mut self.redirect_signals, &layer.redirect_signal, lists);
        if let Some(ref iface) = layer.server_interface {
            self.server_interface = if iface.eq_ignore_ascii_case("none") {
                None
            } else {
                Some(iface.clone())
            };
        }
        if let Some(port) = layer.server_port {
            self.server_port = port;
        }
    }
}

/// Remote trigger listener settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerSettings {
    /// `any`, an IP literal, or a network interface name.
    pub interface: String,
    pub port: u16,
}

/// Fully resolved and validated run configuration.
///
/// Build it through `Settings::try_from(RawSettings)`.
#[derive(Debug, Clone)]
pub struct Settings {
    pub engine: EngineKind,
    /// Watch roots; the current working directory when the user gave none.
    pub watch_paths: Vec<PathBuf>,
    pub watch: WatchOptions,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
    pub poll_interval: Duration,

    pub kill_signal: Signal,
    pub kill_latency: Duration,
    pub kill_timeout: Option<Duration>,
    pub start_latency: Duration,

    pub redirect_input: bool,
    pub redirect_output: OutputTarget,
    pub redirect_signals: Vec<Signal>,

    pub server: Option<ServerSettings>,

    /// Program followed by its arguments.
    pub command: Vec<String>,
}

impl Settings {
    /// The program to execute (first element of the command).
    pub fn program(&self) -> &str {
        self.command.first().map(String::as_str).unwrap_or_default()
    }

    /// Arguments passed to the program.
    pub fn args(&self) -> &[String] {
        self.command.get(1..).unwrap_or_default()
    }
}
