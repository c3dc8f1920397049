use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use tokio::sync::mpsc;
use settlewatch::types::OperationKind;
use settlewatch::watch::{DirectoryWatch, NotificationBackend, Notifier, RawEvent};

/// A scripted notification backend.
///
/// - records every directory registered by every notifier
/// - delivers `emit`ted events to each live notifier watching the event's
///   parent directory, like a non-recursive inotify watch would
/// - closes a notifier's streams when its registrar is dropped
#[derive(Debug, Clone, Default)]
pub struct FakeBackend {
    state: Arc<Mutex<FakeState>>,
}

#[derive(Debug, Default)]
struct FakeState {
    next_id: usize,
    opened: usize,
    notifiers: Vec<FakeNotifier>,
    failing_dirs: HashSet<PathBuf>,
}

#[derive(Debug)]
struct FakeNotifier {
    id: usize,
    dirs: Vec<PathBuf>,
    events: mpsc::UnboundedSender<RawEvent>,
    errors: mpsc::UnboundedSender<anyhow::Error>,
}

struct FakeRegistrar {
    id: usize,
    state: Arc<Mutex<FakeState>>,
}

impl DirectoryWatch for FakeRegistrar {
    fn add_watch(&mut self, dir: &Path) -> anyhow::Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.failing_dirs.contains(dir) {
            anyhow::bail!("No such file or directory (os error 2)");
        }
        if let Some(n) = state.notifiers.iter_mut().find(|n| n.id == self.id) {
            n.dirs.push(dir.to_path_buf());
        }
        Ok(())
    }
}

impl Drop for FakeRegistrar {
    fn drop(&mut self) {
        // Dropping the senders closes both streams.
        if let Ok(mut state) = self.state.lock() {
            state.notifiers.retain(|n| n.id != self.id);
        }
    }
}

impl NotificationBackend for FakeBackend {
    fn open(&self) -> anyhow::Result<Notifier> {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (error_tx, error_rx) = mpsc::unbounded_channel();

        let mut state = self.state.lock().unwrap();
        let id = state.next_id;
        state.next_id += 1;
        state.opened += 1;
        state.notifiers.push(FakeNotifier {
            id,
            dirs: Vec::new(),
            events: event_tx,
            errors: error_tx,
        });

        Ok(Notifier::new(
            Box::new(FakeRegistrar {
                id,
                state: Arc::clone(&self.state),
            }),
            event_rx,
            error_rx,
        ))
    }
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every future `add_watch(dir)` fail.
    pub fn fail_dir(&self, dir: impl AsRef<Path>) {
        let mut state = self.state.lock().unwrap();
        state.failing_dirs.insert(dir.as_ref().to_path_buf());
    }

    /// Deliver one event; returns how many notifiers received it.
    pub fn emit(&self, path: impl AsRef<Path>, kind: OperationKind) -> usize {
        let path = path.as_ref();
        let parent = path.parent().map(Path::to_path_buf).unwrap_or_default();
        let state = self.state.lock().unwrap();
        state
            .notifiers
            .iter()
            .filter(|n| n.dirs.contains(&parent))
            .filter(|n| n.events.send(RawEvent::new(path, kind)).is_ok())
            .count()
    }

    /// Push a stream error to every live notifier.
    pub fn emit_error(&self, message: &str) {
        let state = self.state.lock().unwrap();
        for n in &state.notifiers {
            let _ = n.errors.send(anyhow::anyhow!(message.to_string()));
        }
    }

    /// Directories registered by notifiers that are still alive.
    pub fn watched_dirs(&self) -> Vec<PathBuf> {
        let state = self.state.lock().unwrap();
        let mut dirs: Vec<PathBuf> = state
            .notifiers
            .iter()
            .flat_map(|n| n.dirs.iter().cloned())
            .collect();
        dirs.sort();
        dirs
    }

    /// Notifiers opened over the backend's lifetime.
    pub fn opened(&self) -> usize {
        self.state.lock().unwrap().opened
    }

    /// Notifiers whose registrar has not been dropped yet.
    pub fn live(&self) -> usize {
        self.state.lock().unwrap().notifiers.len()
    }
}
