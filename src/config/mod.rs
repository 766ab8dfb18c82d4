// src/config/mod.rs

//! Configuration loading and validation for respawn.
//!
//! Responsibilities:
//! - Define the TOML-backed layers and the resolved `Settings` (`model.rs`).
//! - Find and load a config file from disk (`loader.rs`).
//! - Validate merged values and build `Settings` (`validate.rs`).
//!
//! Resolution order, lowest priority first: built-in defaults, the global
//! part of the config file, matching `[app.<name>]` sections, command line.

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{default_config_path, load_from_path, load_layers};
pub use model::{
    AppSection, ConfigFile, FileSettings, ListMerge, OutputSetting, RawSettings, ServerSettings,
    Settings, DEFAULT_SERVER_PORT,
};
pub use validate::validate_raw_settings;
