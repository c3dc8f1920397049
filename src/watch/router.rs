// src/watch/router.rs

//! Turns raw notifications into at most one in-flight handler per file.
//!
//! Per event: lookup → kind filter → dedup reservation → debounce →
//! spawn [`settle_and_run`]. The reservation is a guard, so an event
//! rejected by the debounce step gives its claim back simply by dropping it.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, info, trace, warn};

use crate::types::OperationKind;
use crate::watch::command_map::CommandMap;
use crate::watch::debounce::DebounceFilter;
use crate::watch::dedup::DedupGate;
use crate::watch::handler::{settle_and_run, HandlerContext};
use crate::watch::path_utils::canonical_path;
use crate::watch::source::RawEvent;

/// What the router decided for one event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Path is not in the command map.
    Unwatched,
    /// Operation kind cannot carry new content (e.g. chmod).
    IgnoredKind(OperationKind),
    /// A handler for this path is already running.
    InFlight,
    /// Inside the debounce window of a previously accepted event.
    Debounced,
    /// A settle-and-run handler was spawned.
    Dispatched,
}

/// Router state for one watch session.
#[derive(Debug)]
pub struct EventRouter {
    commands: Arc<CommandMap>,
    debounce: DebounceFilter,
    gate: DedupGate,
    ctx: Arc<HandlerContext>,
    tracker: TaskTracker,
    dispatched: AtomicU64,
}

impl EventRouter {
    pub fn new(
        commands: Arc<CommandMap>,
        debounce: DebounceFilter,
        ctx: Arc<HandlerContext>,
        tracker: TaskTracker,
    ) -> Self {
        Self {
            commands,
            debounce,
            gate: DedupGate::new(),
            ctx,
            tracker,
            dispatched: AtomicU64::new(0),
        }
    }

    /// Handle one raw notification.
    pub fn route(&self, event: RawEvent) -> RouteOutcome {
        let Some((path, command)) = self.lookup(&event) else {
            trace!(path = %event.path.display(), "event for unwatched path");
            return RouteOutcome::Unwatched;
        };

        if !event.kind.is_content_change() {
            debug!(path = %path.display(), kind = %event.kind, "ignoring non-content event");
            return RouteOutcome::IgnoredKind(event.kind);
        }

        let Some(reservation) = self.gate.try_reserve(&path) else {
            debug!(path = %path.display(), "handler already in flight; dropping event");
            return RouteOutcome::InFlight;
        };

        if !self.debounce.should_handle(&path, Instant::now()) {
            debug!(path = %path.display(), "within debounce window; dropping event");
            // Dropping the guard releases the reservation.
            drop(reservation);
            return RouteOutcome::Debounced;
        }

        self.dispatched.fetch_add(1, Ordering::Relaxed);
        self.tracker
            .spawn(settle_and_run(Arc::clone(&self.ctx), reservation, command));
        RouteOutcome::Dispatched
    }

    fn lookup(&self, event: &RawEvent) -> Option<(PathBuf, Arc<str>)> {
        if let Some(command) = self.commands.get(&event.path) {
            return Some((event.path.clone(), Arc::clone(command)));
        }
        let canon = canonical_path(self.ctx.fs.as_ref(), &event.path);
        let command = self.commands.get(&canon)?;
        Some((canon, Arc::clone(command)))
    }

    pub fn commands(&self) -> &CommandMap {
        &self.commands
    }

    pub fn gate(&self) -> &DedupGate {
        &self.gate
    }

    pub fn debounce(&self) -> &DebounceFilter {
        &self.debounce
    }

    /// Number of handlers spawned so far.
    pub fn dispatched(&self) -> u64 {
        self.dispatched.load(Ordering::Relaxed)
    }
}

/// Drain the notifier until cancelled or until both streams close.
///
/// Stream errors are logged and otherwise ignored; losing an event is
/// better than stopping.
pub async fn run_event_loop(
    router: Arc<EventRouter>,
    mut events: mpsc::UnboundedReceiver<RawEvent>,
    mut errors: mpsc::UnboundedReceiver<anyhow::Error>,
    cancel: CancellationToken,
) {
    let mut events_open = true;
    let mut errors_open = true;

    while events_open || errors_open {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                debug!("event loop cancelled");
                break;
            }

            event = events.recv(), if events_open => match event {
                Some(event) => {
                    let outcome = router.route(event);
                    trace!(?outcome, "routed event");
                }
                None => {
                    info!("notification event stream closed");
                    events_open = false;
                }
            },

            err = errors.recv(), if errors_open => match err {
                Some(err) => warn!(error = %format!("{err:#}"), "notification error; continuing"),
                None => errors_open = false,
            },
        }
    }

    debug!("event loop finished");
}
