// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::config::model::{ConfigFile, RawConfigFile, WatchItem};
use crate::errors::Result;

/// JSON configs may be the bare legacy array of `{file, command}` records or
/// the same object shape as the TOML format.
#[derive(Deserialize)]
#[serde(untagged)]
enum JsonConfig {
    Items(Vec<WatchItem>),
    Full(RawConfigFile),
}

/// Load a configuration file from a given path and return the raw `RawConfigFile`.
///
/// This only performs deserialization; use [`load_and_validate`] for the
/// checked form.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<RawConfigFile> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path)?;

    if is_json(path) {
        let config = match serde_json::from_str::<JsonConfig>(&contents)? {
            JsonConfig::Items(watch) => RawConfigFile {
                watch,
                ..Default::default()
            },
            JsonConfig::Full(raw) => raw,
        };
        return Ok(config);
    }

    let config: RawConfigFile = toml::from_str(&contents)?;
    Ok(config)
}

/// Load a configuration file from path and run validation.
///
/// Relative `file` entries are resolved against the directory holding the
/// configuration file.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let path = path.as_ref();
    let raw_config = load_from_path(path)?;
    let config = ConfigFile::try_from(raw_config)?;
    Ok(config.resolve_relative_to(&config_root_dir(path)))
}

/// Directory that relative entries are resolved against.
///
/// - If the config path has a non-empty parent (e.g. "conf/settlewatch.toml"),
///   we use that directory.
/// - If it's just a bare filename, we fall back to the current working
///   directory.
pub fn config_root_dir(config_path: &Path) -> PathBuf {
    match config_path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
    }
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"))
}
