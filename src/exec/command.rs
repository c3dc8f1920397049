// src/exec/command.rs

//! Shell command runner with inherited standard streams.

use std::process::Stdio;

use anyhow::{Context, Result};
use tokio::process::Command;
use tracing::debug;

use super::CommandOutcome;

/// Build a shell command appropriate for the platform.
pub fn shell_command(command: &str) -> Command {
    let mut cmd = if cfg!(windows) {
        let mut c = Command::new("cmd");
        c.arg("/C").arg(command);
        c
    } else {
        let mut c = Command::new("sh");
        c.arg("-c").arg(command);
        c
    };

    cmd.stdin(Stdio::null())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit());
    cmd
}

/// Run `command` through the shell and wait for it to exit.
///
/// Output goes straight to the operator's terminal. An error means the
/// process could not be started or waited on; a non-zero exit is a
/// [`CommandOutcome::Failed`].
pub async fn run_shell(command: &str) -> Result<CommandOutcome> {
    let mut child = shell_command(command)
        .spawn()
        .with_context(|| format!("spawning `{command}`"))?;

    let status = child
        .wait()
        .await
        .with_context(|| format!("waiting for `{command}`"))?;

    debug!(command, ?status, "command exited");

    if status.success() {
        Ok(CommandOutcome::Success)
    } else {
        Ok(CommandOutcome::Failed(status.code()))
    }
}
