// src/supervisor.rs

//! Hot reload of the watch configuration.
//!
//! The supervisor owns the single active [`WatchSession`] and watches the
//! configuration file itself. An accepted change (debounced, then confirmed
//! stable) is applied as:
//!
//! 1. load + validate the new file; on failure keep the current session,
//! 2. cancel the current session and join all of its tasks,
//! 3. start a session for the new watch set; if that fails, restart the
//!    previous watch set, and only if that fails too give up with an error.
//!
//! Notifications that arrive while a reload is running are folded into it
//! unless the file changed after it was read. Shutdown is honoured during a
//! reload once the old session has been joined.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{load_and_validate, ConfigFile};
use crate::errors::Result;
use crate::fs::FileStamp;
use crate::session::{SessionDeps, WatchSession};
use crate::watch::path_utils::{canonical_path, watch_dir_of};
use crate::watch::{is_stable, DebounceFilter, RawEvent};

/// Sampling used to confirm the config file is no longer being written.
const CONFIG_SETTLE_INTERVAL: Duration = Duration::from_millis(200);
const CONFIG_SETTLE_SAMPLES: u32 = 3;

/// Lifecycle notifications, mainly for tests and embedding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SupervisorEvent {
    SessionStarted { generation: u64, files: usize },
    SessionStopped { generation: u64, dispatched: u64, leaked_reservations: usize },
    ReloadRejected { reason: String },
    PreviousRestored { generation: u64 },
}

#[derive(Debug)]
pub struct ConfigSupervisor {
    config_path: PathBuf,
    deps: SessionDeps,
    status: Option<mpsc::UnboundedSender<SupervisorEvent>>,
}

/// Outcome of one reload attempt. `Stopped` and `Fatal` leave no session
/// behind.
enum Reloaded {
    Active {
        session: WatchSession,
        config: ConfigFile,
        /// Stamp of the configuration file as it was read.
        stamp: Option<FileStamp>,
    },
    Stopped,
    Fatal(crate::errors::SettleError),
}

impl ConfigSupervisor {
    pub fn new(config_path: impl Into<PathBuf>, deps: SessionDeps) -> Self {
        Self {
            config_path: config_path.into(),
            deps,
            status: None,
        }
    }

    /// Report lifecycle events on `tx`.
    pub fn with_status(mut self, tx: mpsc::UnboundedSender<SupervisorEvent>) -> Self {
        self.status = Some(tx);
        self
    }

    /// Load the configuration, start the first session and keep it current
    /// until `shutdown` resolves.
    ///
    /// Errors before the first session is running are returned as-is (the
    /// binary exits with them). Reload errors are logged and do not stop
    /// the supervisor.
    pub async fn run<F>(self, shutdown: F) -> Result<()>
    where
        F: Future<Output = ()>,
    {
        let mut current = load_and_validate(&self.config_path)?;

        let config_key = canonical_path(self.deps.fs.as_ref(), &self.config_path);
        let mut notifier = self.deps.backend.open()?;
        notifier.add_watch(&watch_dir_of(&config_key))?;
        let (_registrar, mut events, mut errors) = notifier.into_parts();
        info!(config = %config_key.display(), "watching configuration for changes");

        let mut session = self.start_session(1, &current)?;

        let mut reload_filter = DebounceFilter::new(current.settings.reload_debounce);
        let mut events_open = true;
        let mut errors_open = true;
        // Set when the file changed again while a reload was in progress.
        let mut pending = false;

        tokio::pin!(shutdown);

        loop {
            if !pending {
                tokio::select! {
                    _ = &mut shutdown => {
                        info!("shutdown requested");
                        break;
                    }

                    event = events.recv(), if events_open => {
                        let Some(event) = event else {
                            warn!("configuration notification stream closed; hot reload disabled");
                            events_open = false;
                            continue;
                        };
                        if !self.is_config_change(&event, &config_key) {
                            continue;
                        }
                        if !reload_filter.should_handle(&config_key, Instant::now()) {
                            debug!("configuration change within reload window; ignoring");
                            continue;
                        }
                    }

                    err = errors.recv(), if errors_open => {
                        match err {
                            Some(err) => warn!(
                                error = %format!("{err:#}"),
                                "configuration watch error; continuing"
                            ),
                            None => errors_open = false,
                        }
                        continue;
                    }
                }
            }
            pending = false;
            let accepted_at = Instant::now();

            // Keep watching for shutdown while the old session is joined; the
            // reload stops at its next safe point instead of being dropped.
            let abort = CancellationToken::new();
            let outcome = {
                let reload = self.reload(session, current, &config_key, &abort);
                tokio::pin!(reload);
                loop {
                    tokio::select! {
                        biased;
                        outcome = &mut reload => break outcome,
                        _ = &mut shutdown, if !abort.is_cancelled() => {
                            info!("shutdown requested during reload");
                            abort.cancel();
                        }
                    }
                }
            };

            let loaded_stamp = match outcome {
                Reloaded::Active {
                    session: next_session,
                    config: next_config,
                    stamp,
                } => {
                    if next_config.settings.reload_debounce != reload_filter.window() {
                        reload_filter = DebounceFilter::new(next_config.settings.reload_debounce);
                        reload_filter.should_handle(&config_key, accepted_at);
                    }
                    session = next_session;
                    current = next_config;
                    stamp
                }
                Reloaded::Stopped => return Ok(()),
                Reloaded::Fatal(err) => return Err(err),
            };

            if abort.is_cancelled() {
                break;
            }

            // Notifications that queued up during the reload describe the
            // file that was just read, unless it has changed since.
            let mut queued = 0usize;
            while let Ok(event) = events.try_recv() {
                if self.is_config_change(&event, &config_key) {
                    queued += 1;
                }
            }
            if queued > 0 {
                if self.deps.fs.stamp(&config_key).ok() != loaded_stamp {
                    info!(queued, "configuration changed again during reload");
                    reload_filter.should_handle(&config_key, Instant::now());
                    pending = true;
                } else {
                    debug!(queued, "dropping notifications queued during reload");
                }
            }
        }

        self.stop_session(session).await;
        Ok(())
    }

    fn is_config_change(&self, event: &RawEvent, config_key: &Path) -> bool {
        if !event.kind.is_content_change() {
            return false;
        }
        event.path == config_key || canonical_path(self.deps.fs.as_ref(), &event.path) == config_key
    }

    /// One reload attempt. `abort` is checked before the current session is
    /// touched and again after it has been joined.
    async fn reload(
        &self,
        session: WatchSession,
        current: ConfigFile,
        config_key: &Path,
        abort: &CancellationToken,
    ) -> Reloaded {
        info!(config = %config_key.display(), "configuration changed; reloading");

        let settled = tokio::select! {
            _ = abort.cancelled() => None,
            stable = is_stable(
                self.deps.fs.as_ref(),
                config_key,
                CONFIG_SETTLE_INTERVAL,
                CONFIG_SETTLE_SAMPLES,
            ) => Some(stable),
        };
        match settled {
            None => {
                return Reloaded::Active {
                    session,
                    config: current,
                    stamp: None,
                };
            }
            Some(false) => warn!("configuration file still changing; loading it anyway"),
            Some(true) => {}
        }

        let stamp = self.deps.fs.stamp(config_key).ok();
        let next = match load_and_validate(&self.config_path) {
            Ok(next) => next,
            Err(err) => {
                error!(
                    error = %err,
                    generation = session.generation(),
                    "configuration reload failed; keeping current watch set"
                );
                self.emit(SupervisorEvent::ReloadRejected {
                    reason: err.to_string(),
                });
                return Reloaded::Active {
                    session,
                    config: current,
                    stamp,
                };
            }
        };
        if abort.is_cancelled() {
            return Reloaded::Active {
                session,
                config: current,
                stamp,
            };
        }

        let generation = session.generation() + 1;
        self.stop_session(session).await;
        if abort.is_cancelled() {
            info!("not starting a new watch set; shutting down");
            return Reloaded::Stopped;
        }

        match self.start_session(generation, &next) {
            Ok(session) => Reloaded::Active {
                session,
                config: next,
                stamp,
            },
            Err(err) => {
                error!(error = %err, "new watch set could not be started; restoring previous one");
                self.emit(SupervisorEvent::ReloadRejected {
                    reason: err.to_string(),
                });
                match self.start_session(generation + 1, &current) {
                    Ok(session) => {
                        self.emit(SupervisorEvent::PreviousRestored {
                            generation: session.generation(),
                        });
                        Reloaded::Active {
                            session,
                            config: current,
                            stamp,
                        }
                    }
                    Err(restore_err) => {
                        error!(error = %restore_err, "previous watch set could not be restored");
                        Reloaded::Fatal(err)
                    }
                }
            }
        }
    }

    fn start_session(&self, generation: u64, config: &ConfigFile) -> Result<WatchSession> {
        let session = WatchSession::start(generation, config, &self.deps)?;
        info!(
            generation,
            files = session.router().commands().len(),
            "watch session active"
        );
        self.emit(SupervisorEvent::SessionStarted {
            generation,
            files: session.router().commands().len(),
        });
        Ok(session)
    }

    async fn stop_session(&self, session: WatchSession) {
        let report = session.shutdown().await;
        info!(
            generation = report.generation,
            dispatched = report.dispatched,
            "watch session stopped"
        );
        self.emit(SupervisorEvent::SessionStopped {
            generation: report.generation,
            dispatched: report.dispatched,
            leaked_reservations: report.leaked_reservations,
        });
    }

    fn emit(&self, event: SupervisorEvent) {
        if let Some(tx) = &self.status {
            let _ = tx.send(event);
        }
    }
}
