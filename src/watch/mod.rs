// src/watch/mod.rs

//! File watching and change detection.
//!
//! This module is responsible for:
//! - Wiring up a filesystem notification source (`notify`).
//! - Mapping notification paths to configured commands.
//! - Collapsing bursts of events (debounce) and overlapping handlers
//!   (dedup) for the same file.
//! - Probing a changed file until it stops changing, then running its
//!   command.
//!
//! It does **not** know about configuration reloads; a
//! [`crate::session::WatchSession`] owns one generation of this machinery.

pub mod command_map;
pub mod debounce;
pub mod dedup;
pub mod handler;
pub mod path_utils;
pub mod probe;
pub mod router;
pub mod source;

pub use command_map::CommandMap;
pub use debounce::DebounceFilter;
pub use dedup::{DedupGate, Reservation};
pub use handler::{settle_and_run, HandleOutcome, HandlerContext};
pub use probe::{await_settled, is_stable, Settlement};
pub use router::{run_event_loop, EventRouter, RouteOutcome};
pub use source::{DirectoryWatch, NotificationBackend, Notifier, NotifyBackend, RawEvent};
