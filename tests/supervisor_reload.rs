// tests/supervisor_reload.rs

use settlewatch_test_utils::builders::ConfigFileBuilder;
use settlewatch_test_utils::fake_backend::FakeBackend;
use settlewatch_test_utils::fake_executor::RecordingExecutor;
use settlewatch_test_utils::{init_tracing, with_timeout_of};

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use settlewatch::errors::{Result, SettleError};
use settlewatch::fs::RealFileSystem;
use settlewatch::session::SessionDeps;
use settlewatch::supervisor::{ConfigSupervisor, SupervisorEvent};
use settlewatch::types::OperationKind;

struct Running {
    root: PathBuf,
    config: PathBuf,
    backend: FakeBackend,
    exec: RecordingExecutor,
    status: mpsc::UnboundedReceiver<SupervisorEvent>,
    stop: Option<oneshot::Sender<()>>,
    handle: JoinHandle<Result<()>>,
    _dir: tempfile::TempDir,
}

impl Running {
    fn start(builder: ConfigFileBuilder, backend: FakeBackend, exec: RecordingExecutor) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().canonicalize().unwrap();
        let config = root.join("settlewatch.toml");
        fs::write(&config, builder.to_toml()).unwrap();

        let deps = SessionDeps {
            fs: Arc::new(RealFileSystem),
            backend: Arc::new(backend.clone()),
            executor: Arc::new(exec.clone()),
        };
        let (status_tx, status) = mpsc::unbounded_channel();
        let (stop, stop_rx) = oneshot::channel::<()>();

        let supervisor = ConfigSupervisor::new(&config, deps).with_status(status_tx);
        let handle = tokio::spawn(supervisor.run(async move {
            let _ = stop_rx.await;
        }));

        Self {
            root,
            config,
            backend,
            exec,
            status,
            stop: Some(stop),
            handle,
            _dir: dir,
        }
    }

    async fn next(&mut self) -> SupervisorEvent {
        with_timeout_of(Duration::from_secs(60), self.status.recv())
            .await
            .expect("supervisor status channel closed")
    }

    /// Rewrite the config on disk and deliver the matching notification.
    fn rewrite(&self, contents: &str) {
        fs::write(&self.config, contents).unwrap();
        self.backend.emit(&self.config, OperationKind::Write);
    }

    fn touch(&self, name: &str) -> PathBuf {
        let path = self.root.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, b"x,y\n1,2\n").unwrap();
        path
    }

    /// Request shutdown and return every status event emitted after it.
    async fn stop(mut self) -> (Result<()>, Vec<SupervisorEvent>) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        let result = with_timeout_of(Duration::from_secs(60), self.handle)
            .await
            .unwrap();
        let mut rest = Vec::new();
        while let Some(event) = self.status.recv().await {
            rest.push(event);
        }
        (result, rest)
    }
}

fn quick() -> ConfigFileBuilder {
    ConfigFileBuilder::new()
        .probe("10ms", 1, 1)
        .reload_debounce("2s")
}

async fn eventually(mut cond: impl FnMut() -> bool) {
    with_timeout_of(Duration::from_secs(60), async {
        while !cond() {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await;
}

fn started(generation: u64, files: usize) -> SupervisorEvent {
    SupervisorEvent::SessionStarted { generation, files }
}

#[tokio::test(start_paused = true)]
async fn rapid_config_rewrites_reload_once() {
    init_tracing();

    let mut run = Running::start(
        quick().watch("a.csv", "echo A"),
        FakeBackend::new(),
        RecordingExecutor::new(),
    );
    assert_eq!(run.next().await, started(1, 1));

    let next = quick()
        .watch("a.csv", "echo A")
        .watch("b.csv", "echo B")
        .to_toml();
    // Editor-style save: two writes back to back.
    run.rewrite(&next);
    run.rewrite(&next);

    assert!(matches!(
        run.next().await,
        SupervisorEvent::SessionStopped { generation: 1, .. }
    ));
    assert_eq!(run.next().await, started(2, 2));

    let (result, rest) = run.stop().await;
    result.unwrap();
    assert_eq!(
        rest,
        vec![SupervisorEvent::SessionStopped {
            generation: 2,
            dispatched: 0,
            leaked_reservations: 0
        }]
    );
}

#[tokio::test(start_paused = true)]
async fn invalid_config_is_rejected_and_current_set_keeps_running() {
    init_tracing();

    let mut run = Running::start(
        quick().watch("a.csv", "echo A"),
        FakeBackend::new(),
        RecordingExecutor::new(),
    );
    assert_eq!(run.next().await, started(1, 1));
    let a = run.touch("a.csv");

    run.rewrite("[[watch]]\nfile = \"a.csv\"\ncommand = ");
    match run.next().await {
        SupervisorEvent::ReloadRejected { reason } => {
            assert!(reason.contains("TOML"), "unexpected reason: {reason}")
        }
        other => panic!("expected ReloadRejected, got {other:?}"),
    }

    // An empty watch list is valid TOML but not a valid configuration.
    tokio::time::sleep(Duration::from_secs(3)).await;
    run.rewrite("[settings]\ndebounce = \"1s\"\n");
    assert!(matches!(
        run.next().await,
        SupervisorEvent::ReloadRejected { .. }
    ));

    run.backend.emit(&a, OperationKind::Write);
    eventually(|| run.exec.finished().len() == 1).await;
    assert_eq!(run.exec.executed(), vec!["echo A".to_string()]);

    let (result, rest) = run.stop().await;
    result.unwrap();
    assert!(matches!(
        rest.as_slice(),
        [SupervisorEvent::SessionStopped { generation: 1, dispatched: 1, .. }]
    ));
}

#[tokio::test(start_paused = true)]
async fn failed_registration_on_reload_restores_previous_set() {
    init_tracing();

    let backend = FakeBackend::new();
    let mut run = Running::start(
        quick().watch("a.csv", "echo A"),
        backend.clone(),
        RecordingExecutor::new(),
    );
    assert_eq!(run.next().await, started(1, 1));
    backend.fail_dir(run.root.join("missing"));

    run.rewrite(
        &quick()
            .watch("a.csv", "echo A")
            .watch("missing/b.csv", "echo B")
            .to_toml(),
    );

    assert!(matches!(
        run.next().await,
        SupervisorEvent::SessionStopped { generation: 1, .. }
    ));
    match run.next().await {
        SupervisorEvent::ReloadRejected { reason } => {
            assert!(reason.contains("missing"), "unexpected reason: {reason}")
        }
        other => panic!("expected ReloadRejected, got {other:?}"),
    }
    assert_eq!(run.next().await, started(3, 1));
    assert_eq!(
        run.next().await,
        SupervisorEvent::PreviousRestored { generation: 3 }
    );

    // Config watch plus the restored session, both on the root.
    assert_eq!(backend.watched_dirs(), vec![run.root.clone(), run.root.clone()]);

    let a = run.touch("a.csv");
    backend.emit(&a, OperationKind::Write);
    eventually(|| run.exec.finished().len() == 1).await;

    let (result, _) = run.stop().await;
    result.unwrap();
    assert_eq!(backend.live(), 0);
}

#[tokio::test(start_paused = true)]
async fn old_session_is_joined_before_new_one_starts() {
    init_tracing();

    let exec = RecordingExecutor::new().with_delay(Duration::from_secs(10));
    let mut run = Running::start(quick().watch("a.csv", "echo A"), FakeBackend::new(), exec.clone());
    assert_eq!(run.next().await, started(1, 1));

    let a = run.touch("a.csv");
    run.backend.emit(&a, OperationKind::Write);
    eventually(|| !exec.executed().is_empty()).await;
    assert!(exec.finished().is_empty());

    run.rewrite(&quick().watch("a.csv", "echo A2").to_toml());
    assert_eq!(
        run.next().await,
        SupervisorEvent::SessionStopped {
            generation: 1,
            dispatched: 1,
            leaked_reservations: 0
        }
    );
    assert_eq!(exec.finished(), vec!["echo A".to_string()]);
    assert_eq!(run.next().await, started(2, 1));

    run.backend.emit(&a, OperationKind::Write);
    eventually(|| exec.finished().len() == 2).await;
    assert_eq!(exec.finished()[1], "echo A2");

    let (result, _) = run.stop().await;
    result.unwrap();
}

#[tokio::test(start_paused = true)]
async fn double_rewrite_during_long_join_reloads_once() {
    init_tracing();

    let exec = RecordingExecutor::new().with_delay(Duration::from_secs(10));
    let mut run = Running::start(quick().watch("a.csv", "echo A"), FakeBackend::new(), exec.clone());
    assert_eq!(run.next().await, started(1, 1));

    let a = run.touch("a.csv");
    run.backend.emit(&a, OperationKind::Write);
    eventually(|| !exec.executed().is_empty()).await;

    // The join outlasts the reload window; the second notification must
    // still be folded into the first reload.
    let next = quick().watch("a.csv", "echo A2").to_toml();
    run.rewrite(&next);
    run.rewrite(&next);

    assert_eq!(
        run.next().await,
        SupervisorEvent::SessionStopped {
            generation: 1,
            dispatched: 1,
            leaked_reservations: 0
        }
    );
    assert_eq!(run.next().await, started(2, 1));
    assert_eq!(exec.finished(), vec!["echo A".to_string()]);

    tokio::time::sleep(Duration::from_secs(5)).await;
    let (result, rest) = run.stop().await;
    result.unwrap();
    assert_eq!(
        rest,
        vec![SupervisorEvent::SessionStopped {
            generation: 2,
            dispatched: 0,
            leaked_reservations: 0
        }]
    );
}

#[tokio::test(start_paused = true)]
async fn edit_made_during_reload_is_applied_afterwards() {
    init_tracing();

    let exec = RecordingExecutor::new().with_delay(Duration::from_secs(10));
    let mut run = Running::start(quick().watch("a.csv", "echo A"), FakeBackend::new(), exec.clone());
    assert_eq!(run.next().await, started(1, 1));

    let a = run.touch("a.csv");
    run.backend.emit(&a, OperationKind::Write);
    eventually(|| !exec.executed().is_empty()).await;

    run.rewrite(&quick().watch("a.csv", "echo A2").to_toml());
    // Past the settle check, while generation 1 is still being joined.
    tokio::time::sleep(Duration::from_secs(2)).await;
    assert!(exec.finished().is_empty());
    run.rewrite(
        &quick()
            .watch("a.csv", "echo A3")
            .watch("b.csv", "echo B")
            .to_toml(),
    );

    assert!(matches!(
        run.next().await,
        SupervisorEvent::SessionStopped { generation: 1, .. }
    ));
    assert_eq!(run.next().await, started(2, 1));
    assert!(matches!(
        run.next().await,
        SupervisorEvent::SessionStopped { generation: 2, dispatched: 0, .. }
    ));
    assert_eq!(run.next().await, started(3, 2));

    let (result, _) = run.stop().await;
    result.unwrap();
}

#[tokio::test(start_paused = true)]
async fn shutdown_during_reload_does_not_start_new_set() {
    init_tracing();

    let exec = RecordingExecutor::new().with_delay(Duration::from_secs(10));
    let mut run = Running::start(quick().watch("a.csv", "echo A"), FakeBackend::new(), exec.clone());
    assert_eq!(run.next().await, started(1, 1));

    let a = run.touch("a.csv");
    run.backend.emit(&a, OperationKind::Write);
    eventually(|| !exec.executed().is_empty()).await;

    run.rewrite(&quick().watch("a.csv", "echo A2").to_toml());
    tokio::time::sleep(Duration::from_secs(2)).await;

    let backend = run.backend.clone();
    let (result, rest) = run.stop().await;
    result.unwrap();
    assert_eq!(exec.finished(), vec!["echo A".to_string()]);
    assert_eq!(
        rest,
        vec![SupervisorEvent::SessionStopped {
            generation: 1,
            dispatched: 1,
            leaked_reservations: 0
        }]
    );
    assert_eq!(backend.live(), 0);
}

#[tokio::test(start_paused = true)]
async fn graceful_shutdown_lets_running_command_finish() {
    init_tracing();

    let exec = RecordingExecutor::new().with_delay(Duration::from_secs(5));
    let mut run = Running::start(quick().watch("a.csv", "echo A"), FakeBackend::new(), exec.clone());
    assert_eq!(run.next().await, started(1, 1));

    let a = run.touch("a.csv");
    run.backend.emit(&a, OperationKind::Write);
    eventually(|| !exec.executed().is_empty()).await;

    let backend = run.backend.clone();
    let (result, rest) = run.stop().await;
    result.unwrap();
    assert_eq!(exec.finished(), vec!["echo A".to_string()]);
    assert_eq!(
        rest,
        vec![SupervisorEvent::SessionStopped {
            generation: 1,
            dispatched: 1,
            leaked_reservations: 0
        }]
    );
    assert_eq!(backend.live(), 0);
}

#[tokio::test(start_paused = true)]
async fn unrelated_files_next_to_config_do_not_reload() {
    init_tracing();

    let mut run = Running::start(
        quick().watch("a.csv", "echo A"),
        FakeBackend::new(),
        RecordingExecutor::new(),
    );
    assert_eq!(run.next().await, started(1, 1));

    let other = run.touch("notes.txt");
    run.backend.emit(&other, OperationKind::Write);
    run.backend.emit(&run.config, OperationKind::Chmod);
    tokio::time::sleep(Duration::from_secs(5)).await;

    let (result, rest) = run.stop().await;
    result.unwrap();
    assert!(matches!(
        rest.as_slice(),
        [SupervisorEvent::SessionStopped { generation: 1, .. }]
    ));
}

async fn run_once(config: &Path, backend: FakeBackend) -> Result<()> {
    let deps = SessionDeps {
        fs: Arc::new(RealFileSystem),
        backend: Arc::new(backend),
        executor: Arc::new(RecordingExecutor::new()),
    };
    ConfigSupervisor::new(config, deps)
        .run(std::future::ready(()))
        .await
}

#[tokio::test(start_paused = true)]
async fn startup_errors_are_returned() {
    init_tracing();

    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().canonicalize().unwrap();

    let missing = root.join("absent.toml");
    let err = run_once(&missing, FakeBackend::new()).await.unwrap_err();
    assert!(matches!(err, SettleError::IoError(_)), "got {err:?}");

    let malformed = root.join("bad.toml");
    fs::write(&malformed, "[[watch]\nfile = 1").unwrap();
    let err = run_once(&malformed, FakeBackend::new()).await.unwrap_err();
    assert!(matches!(err, SettleError::TomlError(_)), "got {err:?}");

    let empty = root.join("empty.toml");
    fs::write(&empty, "").unwrap();
    let err = run_once(&empty, FakeBackend::new()).await.unwrap_err();
    assert!(matches!(err, SettleError::ConfigError(_)), "got {err:?}");

    let unwatchable = root.join("unwatchable.toml");
    fs::write(&unwatchable, quick().watch("data/x.csv", "true").to_toml()).unwrap();
    let backend = FakeBackend::new();
    backend.fail_dir(root.join("data"));
    let err = run_once(&unwatchable, backend.clone()).await.unwrap_err();
    match err {
        SettleError::WatchRegistration { dir, .. } => assert_eq!(dir, root.join("data")),
        other => panic!("expected WatchRegistration, got {other:?}"),
    }
    assert_eq!(backend.live(), 0);
}

#[tokio::test(start_paused = true)]
async fn json_config_is_supported() {
    init_tracing();

    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().canonicalize().unwrap();
    let config = root.join("fileWatcher.json");
    fs::write(&config, r#"[{"file": "a.csv", "command": "echo A"}]"#).unwrap();

    let backend = FakeBackend::new();
    run_once(&config, backend.clone()).await.unwrap();
    assert_eq!(backend.opened(), 2);
    assert_eq!(backend.live(), 0);
}
