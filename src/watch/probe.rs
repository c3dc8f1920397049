// src/watch/probe.rs

//! Stability probing: has a file stopped changing?
//!
//! A file is considered settled when its size and modification time agree
//! across a fixed number of samples taken `interval` apart. Sampling the
//! stamp instead of hashing content keeps each check to a single `stat`.

use std::path::Path;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::StabilityPolicy;
use crate::fs::FileSystem;

/// Result of running the two-phase policy against one change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settlement {
    /// The first, long probe saw no change.
    Stable,
    /// The first probe failed but the confirmation probe passed.
    StableAfterRetry,
    /// Both probes saw the file change (or vanish).
    NeverSettled,
    /// The owning session was cancelled while probing.
    Cancelled,
}

impl Settlement {
    pub fn is_stable(self) -> bool {
        matches!(self, Settlement::Stable | Settlement::StableAfterRetry)
    }
}

/// Sample `path` `attempts` times, sleeping `interval` between samples.
///
/// Returns `false` as soon as a sample fails or differs from the previous
/// one; a missing or unreadable file is never stable.
pub async fn is_stable(
    fs: &dyn FileSystem,
    path: &Path,
    interval: Duration,
    attempts: u32,
) -> bool {
    let mut previous = None;

    for i in 0..attempts {
        let stamp = match fs.stamp(path) {
            Ok(stamp) => stamp,
            Err(err) => {
                debug!(path = %path.display(), error = %err, "stability sample failed");
                return false;
            }
        };

        if previous.is_some_and(|prev| prev != stamp) {
            debug!(path = %path.display(), sample = i, "file still changing");
            return false;
        }
        previous = Some(stamp);

        if i + 1 < attempts {
            tokio::time::sleep(interval).await;
        }
    }

    true
}

/// Apply the two-phase policy: a long probe, then (after a cooldown) a short
/// confirmation probe. Cancellation interrupts any sleep.
pub async fn await_settled(
    fs: &dyn FileSystem,
    path: &Path,
    policy: &StabilityPolicy,
    cancel: &CancellationToken,
) -> Settlement {
    let first = tokio::select! {
        _ = cancel.cancelled() => return Settlement::Cancelled,
        stable = is_stable(fs, path, policy.interval, policy.initial_samples) => stable,
    };
    if first {
        return Settlement::Stable;
    }

    warn!(
        path = %path.display(),
        retry_in = ?policy.retry_cooldown,
        "file not stable yet; retrying after cooldown"
    );

    let second = tokio::select! {
        _ = cancel.cancelled() => return Settlement::Cancelled,
        stable = async {
            tokio::time::sleep(policy.retry_cooldown).await;
            is_stable(fs, path, policy.interval, policy.retry_samples).await
        } => stable,
    };

    if second {
        Settlement::StableAfterRetry
    } else {
        info!(path = %path.display(), "file never settled; skipping this change");
        Settlement::NeverSettled
    }
}
