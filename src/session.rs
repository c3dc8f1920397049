// src/session.rs

//! One generation of the event-routing machinery.
//!
//! A [`WatchSession`] owns the command map, the debounce and dedup state,
//! the notifier, the event-loop task and every handler task it spawned.
//! [`WatchSession::shutdown`] cancels and joins all of it, so two sessions
//! never overlap.

use std::fmt;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, warn};

use crate::config::ConfigFile;
use crate::errors::Result;
use crate::exec::{CommandExecutor, ShellExecutor};
use crate::fs::{FileSystem, RealFileSystem};
use crate::watch::{
    run_event_loop, CommandMap, DebounceFilter, DirectoryWatch, EventRouter, HandlerContext,
    NotificationBackend, NotifyBackend,
};

/// External capabilities shared by every session.
#[derive(Clone)]
pub struct SessionDeps {
    pub fs: Arc<dyn FileSystem>,
    pub backend: Arc<dyn NotificationBackend>,
    pub executor: Arc<dyn CommandExecutor>,
}

impl SessionDeps {
    /// Real filesystem, `notify` and `sh -c`.
    pub fn production() -> Self {
        Self {
            fs: Arc::new(RealFileSystem),
            backend: Arc::new(NotifyBackend),
            executor: Arc::new(ShellExecutor),
        }
    }
}

impl fmt::Debug for SessionDeps {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionDeps")
            .field("fs", &self.fs)
            .field("backend", &self.backend)
            .finish_non_exhaustive()
    }
}

/// Summary returned once a session has been fully joined.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionReport {
    pub generation: u64,
    /// Handlers spawned over the session's lifetime.
    pub dispatched: u64,
    /// Reservations still held after the join; expected to be zero.
    pub leaked_reservations: usize,
}

pub struct WatchSession {
    generation: u64,
    router: Arc<EventRouter>,
    cancel: CancellationToken,
    tracker: TaskTracker,
    event_loop: JoinHandle<()>,
    registrar: Box<dyn DirectoryWatch>,
}

impl fmt::Debug for WatchSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchSession")
            .field("generation", &self.generation)
            .field("router", &self.router)
            .finish_non_exhaustive()
    }
}

impl WatchSession {
    /// Build the command map, register every parent directory and start the
    /// event loop.
    ///
    /// A directory that cannot be watched aborts the whole session with
    /// [`crate::errors::SettleError::WatchRegistration`].
    pub fn start(generation: u64, config: &ConfigFile, deps: &SessionDeps) -> Result<Self> {
        let commands = Arc::new(CommandMap::build(deps.fs.as_ref(), &config.entries));

        let mut notifier = deps.backend.open()?;
        for dir in commands.watch_dirs() {
            notifier.add_watch(&dir)?;
            info!(generation, dir = %dir.display(), "watching directory");
        }
        let (registrar, events, errors) = notifier.into_parts();

        let cancel = CancellationToken::new();
        let tracker = TaskTracker::new();
        let ctx = Arc::new(HandlerContext {
            fs: Arc::clone(&deps.fs),
            executor: Arc::clone(&deps.executor),
            policy: config.settings.stability,
            cancel: cancel.clone(),
        });
        let router = Arc::new(EventRouter::new(
            commands,
            DebounceFilter::new(config.settings.debounce),
            ctx,
            tracker.clone(),
        ));

        let event_loop = tokio::spawn(run_event_loop(
            Arc::clone(&router),
            events,
            errors,
            cancel.clone(),
        ));

        debug!(generation, files = router.commands().len(), "watch session started");

        Ok(Self {
            generation,
            router,
            cancel,
            tracker,
            event_loop,
            registrar,
        })
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn router(&self) -> &EventRouter {
        &self.router
    }

    /// Handlers currently holding a dedup reservation.
    pub fn in_flight(&self) -> usize {
        self.router.gate().len()
    }

    /// Cancel the session and wait for the event loop and every handler to
    /// exit.
    ///
    /// Handlers still probing give up; handlers already running their
    /// command let it finish.
    pub async fn shutdown(self) -> SessionReport {
        let Self {
            generation,
            router,
            cancel,
            tracker,
            event_loop,
            registrar,
        } = self;

        cancel.cancel();
        if let Err(err) = event_loop.await {
            warn!(generation, error = %err, "event loop task ended abnormally");
        }
        // Stop notifications before waiting on handlers.
        drop(registrar);

        tracker.close();
        tracker.wait().await;

        let leaked_reservations = router.gate().len();
        if leaked_reservations > 0 {
            warn!(generation, leaked_reservations, "reservations left after join");
        }
        router.debounce().clear();

        let report = SessionReport {
            generation,
            dispatched: router.dispatched(),
            leaked_reservations,
        };
        debug!(?report, "watch session stopped");
        report
    }
}
