use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use settlewatch::exec::{CommandExecutor, CommandOutcome};

/// How the fake should answer every command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FakeBehaviour {
    Succeed,
    ExitWith(i32),
    FailToStart,
}

/// A fake executor that:
/// - records which commands were "run", in start order
/// - optionally sleeps to simulate a long command
/// - answers with a fixed behaviour.
#[derive(Debug, Clone)]
pub struct RecordingExecutor {
    executed: Arc<Mutex<Vec<String>>>,
    finished: Arc<Mutex<Vec<String>>>,
    delay: Duration,
    behaviour: FakeBehaviour,
}

impl RecordingExecutor {
    pub fn new() -> Self {
        Self {
            executed: Arc::new(Mutex::new(Vec::new())),
            finished: Arc::new(Mutex::new(Vec::new())),
            delay: Duration::ZERO,
            behaviour: FakeBehaviour::Succeed,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_behaviour(mut self, behaviour: FakeBehaviour) -> Self {
        self.behaviour = behaviour;
        self
    }

    /// Commands started so far.
    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }

    /// Commands that ran to completion.
    pub fn finished(&self) -> Vec<String> {
        self.finished.lock().unwrap().clone()
    }
}

impl Default for RecordingExecutor {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandExecutor for RecordingExecutor {
    fn run<'a>(
        &'a self,
        command: &'a str,
    ) -> Pin<Box<dyn Future<Output = anyhow::Result<CommandOutcome>> + Send + 'a>> {
        Box::pin(async move {
            if self.behaviour == FakeBehaviour::FailToStart {
                anyhow::bail!("spawning `{command}`: No such file or directory");
            }

            self.executed.lock().unwrap().push(command.to_string());

            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }

            self.finished.lock().unwrap().push(command.to_string());

            Ok(match self.behaviour {
                FakeBehaviour::ExitWith(code) => CommandOutcome::Failed(Some(code)),
                _ => CommandOutcome::Success,
            })
        })
    }
}
