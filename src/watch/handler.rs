// src/watch/handler.rs

//! Per-change task: wait for the file to settle, then run its command.

use std::fmt;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::StabilityPolicy;
use crate::exec::{CommandExecutor, CommandOutcome};
use crate::fs::FileSystem;
use crate::watch::dedup::Reservation;
use crate::watch::probe::{await_settled, Settlement};

/// Everything a handler needs besides the path and its command.
pub struct HandlerContext {
    pub fs: Arc<dyn FileSystem>,
    pub executor: Arc<dyn CommandExecutor>,
    pub policy: StabilityPolicy,
    /// Session cancellation; interrupts probing but not a running command.
    pub cancel: CancellationToken,
}

impl fmt::Debug for HandlerContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerContext")
            .field("fs", &self.fs)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

/// How one handled change ended.
#[derive(Debug)]
pub enum HandleOutcome {
    /// The command ran (successfully or not).
    Executed(CommandOutcome),
    /// The command could not be started.
    ExecError(anyhow::Error),
    /// The file never settled, or the session stopped while probing.
    Skipped(Settlement),
}

/// Probe the reserved path with the two-phase policy and run `command` if it
/// settles. The reservation is held until this returns.
pub async fn settle_and_run(
    ctx: Arc<HandlerContext>,
    reservation: Reservation,
    command: Arc<str>,
) -> HandleOutcome {
    let path = reservation.path();
    info!(path = %path.display(), "change detected; waiting for file to stabilize");

    let settlement = await_settled(ctx.fs.as_ref(), path, &ctx.policy, &ctx.cancel).await;
    match settlement {
        Settlement::Stable => {
            info!(path = %path.display(), command = %command, "file stable; running command");
        }
        Settlement::StableAfterRetry => {
            info!(
                path = %path.display(),
                command = %command,
                "file stable on retry; running command"
            );
        }
        Settlement::NeverSettled => return HandleOutcome::Skipped(settlement),
        Settlement::Cancelled => {
            info!(path = %path.display(), "session stopping; abandoning pending change");
            return HandleOutcome::Skipped(settlement);
        }
    }

    match ctx.executor.run(&command).await {
        Ok(CommandOutcome::Success) => {
            info!(path = %path.display(), command = %command, "command finished");
            HandleOutcome::Executed(CommandOutcome::Success)
        }
        Ok(CommandOutcome::Failed(code)) => {
            error!(
                path = %path.display(),
                command = %command,
                exit_code = ?code,
                "command failed"
            );
            HandleOutcome::Executed(CommandOutcome::Failed(code))
        }
        Err(err) => {
            error!(
                path = %path.display(),
                command = %command,
                error = %format!("{err:#}"),
                "command could not be started"
            );
            HandleOutcome::ExecError(err)
        }
    }
}
