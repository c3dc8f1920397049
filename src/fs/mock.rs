// src/fs/mock.rs

use super::{FileStamp, FileSystem};
use anyhow::{anyhow, Result};
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::{Duration, UNIX_EPOCH};

/// Scripted stamps for one path.
///
/// Each `stamp()` call pops the front of `pending`; once it runs dry the
/// last popped stamp is repeated forever. `None` in the script simulates a
/// failed stat (file missing).
#[derive(Debug, Clone, Default)]
struct MockEntry {
    pending: VecDeque<Option<FileStamp>>,
    current: Option<FileStamp>,
    reads: usize,
}

/// In-memory filesystem for probe and router tests.
///
/// Paths are canonical as given; `canonicalize` only succeeds for paths
/// that have been added.
#[derive(Debug, Clone, Default)]
pub struct MockFileSystem {
    files: Arc<Mutex<HashMap<PathBuf, MockEntry>>>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stamp helper: `len` bytes, modified `secs` after the epoch.
    pub fn stamp_of(len: u64, secs: u64) -> FileStamp {
        FileStamp {
            len,
            modified: UNIX_EPOCH + Duration::from_secs(secs),
        }
    }

    /// Add a file whose stamp never changes.
    pub fn add_file(&self, path: impl AsRef<Path>, len: u64) {
        self.set_stamp(path, Self::stamp_of(len, 1));
    }

    /// Replace the current stamp and discard any script.
    pub fn set_stamp(&self, path: impl AsRef<Path>, stamp: FileStamp) {
        let mut files = self.files.lock().unwrap();
        let entry = files.entry(path.as_ref().to_path_buf()).or_default();
        entry.pending.clear();
        entry.current = Some(stamp);
    }

    /// Queue stamps returned by successive `stamp()` calls.
    pub fn script(&self, path: impl AsRef<Path>, stamps: Vec<Option<FileStamp>>) {
        let mut files = self.files.lock().unwrap();
        let entry = files.entry(path.as_ref().to_path_buf()).or_default();
        entry.pending.extend(stamps);
    }

    /// Make subsequent stats fail.
    pub fn remove_file(&self, path: impl AsRef<Path>) {
        let mut files = self.files.lock().unwrap();
        if let Some(entry) = files.get_mut(path.as_ref()) {
            entry.pending.clear();
            entry.current = None;
        }
    }

    /// How many times `stamp()` was called for `path`.
    pub fn reads(&self, path: impl AsRef<Path>) -> usize {
        let files = self.files.lock().unwrap();
        files.get(path.as_ref()).map(|e| e.reads).unwrap_or(0)
    }
}

impl FileSystem for MockFileSystem {
    fn stamp(&self, path: &Path) -> Result<FileStamp> {
        let mut files = self.files.lock().unwrap();
        let entry = files
            .get_mut(path)
            .ok_or_else(|| anyhow!("File not found: {:?}", path))?;
        entry.reads += 1;
        if let Some(next) = entry.pending.pop_front() {
            entry.current = next;
        }
        entry
            .current
            .ok_or_else(|| anyhow!("File not found: {:?}", path))
    }

    fn canonicalize(&self, path: &Path) -> Result<PathBuf> {
        let files = self.files.lock().unwrap();
        if files.contains_key(path) {
            Ok(path.to_path_buf())
        } else {
            Err(anyhow!("File not found: {:?}", path))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_is_consumed_then_last_stamp_repeats() {
        let fs = MockFileSystem::new();
        let a = MockFileSystem::stamp_of(1, 1);
        let b = MockFileSystem::stamp_of(2, 2);
        fs.script("/w/a.csv", vec![Some(a), Some(b)]);

        assert_eq!(fs.stamp(Path::new("/w/a.csv")).unwrap(), a);
        assert_eq!(fs.stamp(Path::new("/w/a.csv")).unwrap(), b);
        assert_eq!(fs.stamp(Path::new("/w/a.csv")).unwrap(), b);
        assert_eq!(fs.reads("/w/a.csv"), 3);
    }

    #[test]
    fn removed_file_fails_to_stat() {
        let fs = MockFileSystem::new();
        fs.add_file("/w/a.csv", 10);
        fs.remove_file("/w/a.csv");
        assert!(fs.stamp(Path::new("/w/a.csv")).is_err());
        assert!(fs.stamp(Path::new("/w/other.csv")).is_err());
    }
}
