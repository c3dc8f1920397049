#![allow(dead_code)]

use settlewatch::config::{ConfigFile, RawConfigFile, SettingsSection, WatchItem};

/// Builder for `ConfigFile` to simplify test setup.
///
/// Settings start from the production defaults; tests usually shrink the
/// windows so scenarios finish in a few virtual seconds.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                settings: SettingsSection::default(),
                watch: Vec::new(),
            },
        }
    }

    pub fn watch(mut self, file: &str, command: &str) -> Self {
        self.config.watch.push(WatchItem {
            file: file.to_string(),
            command: command.to_string(),
        });
        self
    }

    pub fn debounce(mut self, duration: &str) -> Self {
        self.config.settings.debounce = duration.to_string();
        self
    }

    pub fn probe(mut self, interval: &str, initial_samples: u32, retry_samples: u32) -> Self {
        self.config.settings.probe_interval = interval.to_string();
        self.config.settings.initial_samples = initial_samples;
        self.config.settings.retry_samples = retry_samples;
        self
    }

    pub fn retry_cooldown(mut self, duration: &str) -> Self {
        self.config.settings.retry_cooldown = duration.to_string();
        self
    }

    pub fn reload_debounce(mut self, duration: &str) -> Self {
        self.config.settings.reload_debounce = duration.to_string();
        self
    }

    /// Render as a TOML document, for tests that go through the loader.
    pub fn to_toml(&self) -> String {
        let s = &self.config.settings;
        let mut out = format!(
            "[settings]\ndebounce = \"{}\"\nprobe_interval = \"{}\"\ninitial_samples = {}\nretry_samples = {}\nretry_cooldown = \"{}\"\nreload_debounce = \"{}\"\n",
            s.debounce,
            s.probe_interval,
            s.initial_samples,
            s.retry_samples,
            s.retry_cooldown,
            s.reload_debounce
        );
        for item in &self.config.watch {
            out.push_str(&format!(
                "\n[[watch]]\nfile = {:?}\ncommand = {:?}\n",
                item.file, item.command
            ));
        }
        out
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}
