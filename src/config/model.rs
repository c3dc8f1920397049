// src/config/model.rs

use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// Top-level configuration as read from a TOML (or JSON) file.
///
/// ```toml
/// [settings]
/// debounce = "3s"
/// initial_samples = 10
///
/// [[watch]]
/// file = "exports/a.csv"
/// command = "echo A"
/// ```
///
/// `[settings]` is optional; every field has a default.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawConfigFile {
    /// Timing knobs from `[settings]`.
    #[serde(default)]
    pub settings: SettingsSection,

    /// All `[[watch]]` entries.
    #[serde(default)]
    pub watch: Vec<WatchItem>,
}

/// One `{ file, command }` record as written by the operator.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct WatchItem {
    pub file: String,
    pub command: String,
}

/// `[settings]` section. Durations use the `<n>ms|s|m|h` syntax.
#[derive(Debug, Clone, Deserialize)]
pub struct SettingsSection {
    /// Minimum spacing between two accepted events for the same file.
    #[serde(default = "default_debounce")]
    pub debounce: String,

    /// Sleep between two stability samples.
    #[serde(default = "default_probe_interval")]
    pub probe_interval: String,

    /// Number of agreeing samples required by the first probe phase.
    #[serde(default = "default_initial_samples")]
    pub initial_samples: u32,

    /// Number of agreeing samples required by the confirmation phase.
    #[serde(default = "default_retry_samples")]
    pub retry_samples: u32,

    /// Pause between a failed first phase and the confirmation phase.
    #[serde(default = "default_retry_cooldown")]
    pub retry_cooldown: String,

    /// Cooldown applied to changes of the configuration file itself.
    #[serde(default = "default_reload_debounce")]
    pub reload_debounce: String,
}

fn default_debounce() -> String {
    "3s".to_string()
}

fn default_probe_interval() -> String {
    "1s".to_string()
}

fn default_initial_samples() -> u32 {
    10
}

fn default_retry_samples() -> u32 {
    3
}

fn default_retry_cooldown() -> String {
    "1s".to_string()
}

fn default_reload_debounce() -> String {
    "2s".to_string()
}

impl Default for SettingsSection {
    fn default() -> Self {
        Self {
            debounce: default_debounce(),
            probe_interval: default_probe_interval(),
            initial_samples: default_initial_samples(),
            retry_samples: default_retry_samples(),
            retry_cooldown: default_retry_cooldown(),
            reload_debounce: default_reload_debounce(),
        }
    }
}

/// Two-phase stability policy applied to every detected change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StabilityPolicy {
    pub interval: Duration,
    pub initial_samples: u32,
    pub retry_samples: u32,
    pub retry_cooldown: Duration,
}

impl Default for StabilityPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            initial_samples: 10,
            retry_samples: 3,
            retry_cooldown: Duration::from_secs(1),
        }
    }
}

/// Validated, typed settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Settings {
    pub debounce: Duration,
    pub stability: StabilityPolicy,
    pub reload_debounce: Duration,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            debounce: Duration::from_secs(3),
            stability: StabilityPolicy::default(),
            reload_debounce: Duration::from_secs(2),
        }
    }
}

/// A file to watch and the command to run once it settles.
///
/// `path` is absolute (relative entries are resolved against the config
/// file's directory) but not yet canonicalized; that happens when a
/// session builds its command map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEntry {
    pub path: PathBuf,
    pub command: String,
}

/// Validated configuration. Only constructible through
/// `TryFrom<RawConfigFile>` or the loader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigFile {
    pub settings: Settings,
    pub entries: Vec<WatchEntry>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(settings: Settings, entries: Vec<WatchEntry>) -> Self {
        Self { settings, entries }
    }

    /// Resolve relative entry paths against `base`.
    pub fn resolve_relative_to(mut self, base: &std::path::Path) -> Self {
        for entry in &mut self.entries {
            if entry.path.is_relative() {
                entry.path = base.join(&entry.path);
            }
        }
        self
    }
}
