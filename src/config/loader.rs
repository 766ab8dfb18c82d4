// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::{ConfigFile, FileSettings};
use crate::errors::{RespawnError, Result};

/// Location of the configuration file inside the user's config directory.
const CONFIG_SUBPATH: &str = "respawn/respawn.toml";

/// Load a configuration file from a given path and return the raw
/// `ConfigFile`.
///
/// This only performs TOML deserialization; value checks happen once all
/// layers are merged (see `Settings::try_from`).
pub fn load_from_path(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|e| {
        RespawnError::ConfigError(format!("reading config file at {:?}: {}", path, e))
    })?;

    let config: ConfigFile = toml::from_str(&contents)?;
    debug!(path = ?path, apps = config.app.len(), "loaded config file");
    Ok(config)
}

/// Default config path: `respawn/respawn.toml` under the platform config
/// directory (`$XDG_CONFIG_HOME` or `~/.config` on Linux).
///
/// Returns `None` when there is no config directory or the file does not
/// exist; a missing default file is not an error.
pub fn default_config_path() -> Option<PathBuf> {
    let path = dirs::config_dir()?.join(CONFIG_SUBPATH);
    path.is_file().then_some(path)
}

/// Collect the file layers for `program`, lowest priority first.
///
/// - An explicit `--config` path must load.
/// - Otherwise the default file is used if present.
/// - With neither, there are no file layers.
pub fn load_layers(explicit: Option<&Path>, program: &str) -> Result<Vec<FileSettings>> {
    let path = match explicit {
        Some(p) => Some(p.to_path_buf()),
        None => default_config_path(),
    };

    match path {
        Some(path) => Ok(load_from_path(&path)?.layers_for(program)),
        None => {
            debug!("no config file found; using built-in defaults");
            Ok(Vec::new())
        }
    }
}
