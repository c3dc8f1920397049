// src/watch/dedup.rs

//! Per-path in-flight marker.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::trace;

/// Paths that currently have a settle-and-run handler in flight.
///
/// `try_reserve` is an atomic test-and-set; between a successful reserve and
/// the matching release no other reserve for the same path succeeds. Each
/// claim carries a token, so a guard only ever removes its own claim.
#[derive(Debug, Clone, Default)]
pub struct DedupGate {
    processing: Arc<DashMap<PathBuf, u64>>,
    next_token: Arc<AtomicU64>,
}

impl DedupGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claim `path`. Returns `None` if a handler already holds it.
    ///
    /// The claim is released when the returned guard is dropped, so every
    /// exit path of the handler gives it back.
    pub fn try_reserve(&self, path: &Path) -> Option<Reservation> {
        match self.processing.entry(path.to_path_buf()) {
            Entry::Occupied(_) => None,
            Entry::Vacant(slot) => {
                let token = self.next_token.fetch_add(1, Ordering::Relaxed);
                slot.insert(token);
                trace!(path = %path.display(), token, "dedup reservation taken");
                Some(Reservation {
                    processing: Arc::clone(&self.processing),
                    path: path.to_path_buf(),
                    token,
                })
            }
        }
    }

    /// Drop whatever claim is held on `path`.
    ///
    /// The guard of a claim removed this way becomes inert; dropping it
    /// later leaves any newer claim on the same path in place.
    pub fn release(&self, path: &Path) {
        if self.processing.remove(path).is_some() {
            trace!(path = %path.display(), "dedup reservation released");
        }
    }

    pub fn is_reserved(&self, path: &Path) -> bool {
        self.processing.contains_key(path)
    }

    pub fn len(&self) -> usize {
        self.processing.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processing.is_empty()
    }
}

/// Scoped claim on one path; releases on drop.
#[derive(Debug)]
pub struct Reservation {
    processing: Arc<DashMap<PathBuf, u64>>,
    path: PathBuf,
    token: u64,
}

impl Reservation {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for Reservation {
    fn drop(&mut self) {
        let token = self.token;
        if self
            .processing
            .remove_if(&self.path, |_, held| *held == token)
            .is_some()
        {
            trace!(path = %self.path.display(), token, "dedup reservation released");
        }
    }
}
