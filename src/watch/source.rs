// src/watch/source.rs

//! Raw filesystem notification source.
//!
//! A [`NotificationBackend`] opens a [`Notifier`]: a handle that can register
//! directories plus two receivers, one for events and one for errors. Both
//! receivers close when the notifier's underlying watcher goes away.
//!
//! Production code uses [`NotifyBackend`]; tests plug in a scripted backend.

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::Context;
use notify::{Config, Event, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;

use crate::errors::{Result, SettleError};
use crate::types::OperationKind;

/// One path touched by one notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawEvent {
    pub path: PathBuf,
    pub kind: OperationKind,
}

impl RawEvent {
    pub fn new(path: impl Into<PathBuf>, kind: OperationKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

/// Registration half of a notifier. Dropping it stops event delivery.
pub trait DirectoryWatch: Send {
    fn add_watch(&mut self, dir: &Path) -> anyhow::Result<()>;
}

/// Factory for notifiers; one notifier is opened per watch session and one
/// for the configuration file.
pub trait NotificationBackend: Send + Sync + fmt::Debug {
    fn open(&self) -> anyhow::Result<Notifier>;
}

/// A live subscription to filesystem notifications.
pub struct Notifier {
    registrar: Box<dyn DirectoryWatch>,
    events: mpsc::UnboundedReceiver<RawEvent>,
    errors: mpsc::UnboundedReceiver<anyhow::Error>,
}

impl fmt::Debug for Notifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Notifier").finish_non_exhaustive()
    }
}

impl Notifier {
    pub fn new(
        registrar: Box<dyn DirectoryWatch>,
        events: mpsc::UnboundedReceiver<RawEvent>,
        errors: mpsc::UnboundedReceiver<anyhow::Error>,
    ) -> Self {
        Self {
            registrar,
            events,
            errors,
        }
    }

    /// Register `dir` (non-recursively).
    pub fn add_watch(&mut self, dir: &Path) -> Result<()> {
        self.registrar
            .add_watch(dir)
            .map_err(|source| SettleError::WatchRegistration {
                dir: dir.to_path_buf(),
                source,
            })
    }

    pub fn into_parts(
        self,
    ) -> (
        Box<dyn DirectoryWatch>,
        mpsc::UnboundedReceiver<RawEvent>,
        mpsc::UnboundedReceiver<anyhow::Error>,
    ) {
        (self.registrar, self.events, self.errors)
    }
}

/// Backend built on `notify::RecommendedWatcher`.
#[derive(Debug, Clone, Default)]
pub struct NotifyBackend;

struct NotifyRegistrar {
    inner: RecommendedWatcher,
}

impl DirectoryWatch for NotifyRegistrar {
    fn add_watch(&mut self, dir: &Path) -> anyhow::Result<()> {
        self.inner
            .watch(dir, RecursiveMode::NonRecursive)
            .with_context(|| format!("registering watch on {:?}", dir))
    }
}

impl NotificationBackend for NotifyBackend {
    fn open(&self) -> anyhow::Result<Notifier> {
        // Channels from the blocking notify callback into the async world.
        // The callback owns both senders, so dropping the watcher closes them.
        let (event_tx, event_rx) = mpsc::unbounded_channel::<RawEvent>();
        let (error_tx, error_rx) = mpsc::unbounded_channel::<anyhow::Error>();

        let watcher = RecommendedWatcher::new(
            move |res: notify::Result<Event>| match res {
                Ok(event) => {
                    let kind = OperationKind::from(&event.kind);
                    for path in event.paths {
                        // Receiver gone means the session is shutting down.
                        let _ = event_tx.send(RawEvent { path, kind });
                    }
                }
                Err(err) => {
                    let _ = error_tx.send(anyhow::Error::from(err));
                }
            },
            Config::default(),
        )
        .context("creating filesystem watcher")?;

        Ok(Notifier::new(
            Box::new(NotifyRegistrar { inner: watcher }),
            event_rx,
            error_rx,
        ))
    }
}
