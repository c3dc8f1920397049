// src/watch/command_map.rs

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::warn;

use crate::config::WatchEntry;
use crate::fs::FileSystem;
use crate::watch::path_utils::{canonical_path, watch_dir_of};

/// Canonical path → command, built once per session and read-only after.
#[derive(Debug, Clone, Default)]
pub struct CommandMap {
    commands: HashMap<PathBuf, Arc<str>>,
}

impl CommandMap {
    /// Canonicalize every entry. If two entries resolve to the same file the
    /// later one wins.
    pub fn build(fs: &dyn FileSystem, entries: &[WatchEntry]) -> Self {
        let mut commands = HashMap::with_capacity(entries.len());
        for entry in entries {
            let key = canonical_path(fs, &entry.path);
            if let Some(previous) = commands.insert(key.clone(), Arc::from(entry.command.as_str())) {
                warn!(
                    path = %key.display(),
                    replaced = %previous,
                    command = %entry.command,
                    "file listed more than once; using the last command"
                );
            }
        }
        Self { commands }
    }

    pub fn get(&self, path: &Path) -> Option<&Arc<str>> {
        self.commands.get(path)
    }

    /// Distinct parent directories, in a stable order.
    pub fn watch_dirs(&self) -> BTreeSet<PathBuf> {
        self.commands.keys().map(|p| watch_dir_of(p)).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Path, &str)> {
        self.commands.iter().map(|(p, c)| (p.as_path(), c.as_ref()))
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}
