// src/config/mod.rs

//! Configuration loading and validation for settlewatch.
//!
//! Responsibilities:
//! - Define the TOML/JSON-backed data model (`model.rs`).
//! - Load a config file from disk (`loader.rs`).
//! - Validate entries and settings (`validate.rs`).

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{config_root_dir, load_and_validate, load_from_path};
pub use model::{
    ConfigFile, RawConfigFile, Settings, SettingsSection, StabilityPolicy, WatchEntry, WatchItem,
};
pub use validate::parse_duration;
