// src/watch/debounce.rs

//! Per-path cooldown window.
//!
//! Editors and copy tools emit several notifications for one save. The
//! first accepted event for a path opens a window; events inside it are
//! dropped, not queued.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

/// Last-accepted timestamps, one per path, behind a single lock.
///
/// Entries are never evicted while the owning session lives; the key space
/// is bounded by the configured files.
#[derive(Debug)]
pub struct DebounceFilter {
    window: Duration,
    last_accepted: Mutex<HashMap<PathBuf, Instant>>,
}

impl DebounceFilter {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            last_accepted: Mutex::new(HashMap::new()),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Accept the event if no event for `path` was accepted within the
    /// window before `now`. Only accepted events move the timestamp.
    pub fn should_handle(&self, path: &Path, now: Instant) -> bool {
        let mut last_accepted = self.last_accepted.lock();
        match last_accepted.get(path) {
            Some(&last) if now.saturating_duration_since(last) <= self.window => false,
            _ => {
                last_accepted.insert(path.to_path_buf(), now);
                true
            }
        }
    }

    pub fn len(&self) -> usize {
        self.last_accepted.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_accepted.lock().is_empty()
    }

    pub fn clear(&self) {
        self.last_accepted.lock().clear();
    }
}
