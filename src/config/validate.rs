// src/config/validate.rs

use std::path::PathBuf;
use std::time::Duration;

use crate::config::model::{
    ConfigFile, RawConfigFile, Settings, SettingsSection, StabilityPolicy, WatchEntry,
};
use crate::errors::{Result, SettleError};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = SettleError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        ensure_has_entries(&raw)?;
        let settings = validate_settings(&raw.settings)?;
        let entries = validate_entries(&raw)?;
        Ok(ConfigFile::new_unchecked(settings, entries))
    }
}

fn ensure_has_entries(cfg: &RawConfigFile) -> Result<()> {
    if cfg.watch.is_empty() {
        return Err(SettleError::ConfigError(
            "config must contain at least one watch entry".to_string(),
        ));
    }
    Ok(())
}

fn validate_settings(section: &SettingsSection) -> Result<Settings> {
    let debounce = duration_field("debounce", &section.debounce)?;
    let interval = duration_field("probe_interval", &section.probe_interval)?;
    let retry_cooldown = duration_field("retry_cooldown", &section.retry_cooldown)?;
    let reload_debounce = duration_field("reload_debounce", &section.reload_debounce)?;

    if section.initial_samples == 0 {
        return Err(SettleError::ConfigError(
            "[settings].initial_samples must be >= 1 (got 0)".to_string(),
        ));
    }
    if section.retry_samples == 0 {
        return Err(SettleError::ConfigError(
            "[settings].retry_samples must be >= 1 (got 0)".to_string(),
        ));
    }

    Ok(Settings {
        debounce,
        stability: StabilityPolicy {
            interval,
            initial_samples: section.initial_samples,
            retry_samples: section.retry_samples,
            retry_cooldown,
        },
        reload_debounce,
    })
}

fn validate_entries(cfg: &RawConfigFile) -> Result<Vec<WatchEntry>> {
    cfg.watch
        .iter()
        .enumerate()
        .map(|(idx, item)| {
            if item.file.trim().is_empty() {
                return Err(SettleError::ConfigError(format!(
                    "watch entry #{} has an empty `file`",
                    idx + 1
                )));
            }
            if item.command.trim().is_empty() {
                return Err(SettleError::ConfigError(format!(
                    "watch entry for '{}' has an empty `command`",
                    item.file
                )));
            }
            Ok(WatchEntry {
                path: PathBuf::from(item.file.trim()),
                command: item.command.clone(),
            })
        })
        .collect()
}

fn duration_field(name: &str, value: &str) -> Result<Duration> {
    parse_duration(value)
        .map_err(|e| SettleError::ConfigError(format!("[settings].{name}: {e}")))
}

/// Parse strings like `"500ms"`, `"3s"`, `"2m"` or `"1h"`.
pub fn parse_duration(s: &str) -> std::result::Result<Duration, String> {
    let s = s.trim();
    if s.is_empty() {
        return Err("empty duration string".to_string());
    }

    let idx = s
        .chars()
        .position(|c| !c.is_ascii_digit())
        .ok_or_else(|| "duration missing unit suffix".to_string())?;

    let (num_part, unit_part) = s.split_at(idx);
    let value: u64 = num_part
        .parse()
        .map_err(|e| format!("invalid duration number '{}': {}", num_part, e))?;
    let unit = unit_part.trim().to_lowercase();

    let secs_per_unit = match unit.as_str() {
        "ms" => return Ok(Duration::from_millis(value)),
        "s" => 1,
        "m" => 60,
        "h" => 60 * 60,
        _ => {
            return Err(format!(
                "unsupported duration unit '{}'; expected ms, s, m, or h",
                unit
            ));
        }
    };

    value
        .checked_mul(secs_per_unit)
        .map(Duration::from_secs)
        .ok_or_else(|| format!("duration '{}' is too large", s))
}
