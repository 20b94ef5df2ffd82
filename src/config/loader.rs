// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::Result;

/// Load a configuration file from a given path and return the raw `RawConfigFile`.
///
/// This only performs TOML deserialization; it does **not** check value
/// ranges. Use [`load_and_validate`] for that.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    let config: RawConfigFile = toml::from_str(&contents)?;

    Ok(config)
}

/// Load a configuration file from path and validate it.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let raw_config = load_from_path(&path)?;
    let config = ConfigFile::try_from(raw_config)?;
    Ok(config)
}

/// Load `path` if given; otherwise the default path if it exists; otherwise
/// built-in defaults. An explicitly given path must exist.
pub fn load_or_default(path: Option<&Path>) -> Result<ConfigFile> {
    match path {
        Some(path) => load_and_validate(path),
        None => {
            let default = default_config_path();
            if default.exists() {
                debug!(path = %default.display(), "loading default config file");
                load_and_validate(default)
            } else {
                debug!("no config file; using built-in defaults");
                Ok(ConfigFile::default())
            }
        }
    }
}

/// `Solvedag.toml` in the current working directory.
pub fn default_config_path() -> PathBuf {
    PathBuf::from("Solvedag.toml")
}
