// src/exec/backend.rs

//! Pluggable command executor abstraction.
//!
//! Handlers talk to a `CommandExecutor` instead of spawning processes
//! directly, so tests can swap in a recorder while production uses
//! [`ShellExecutor`].

use std::future::Future;
use std::pin::Pin;

use anyhow::Result;

use super::CommandOutcome;
use super::command::run_shell;

/// Trait abstracting how a triggered command is executed.
pub trait CommandExecutor: Send + Sync {
    /// Run `command` to completion.
    ///
    /// `Err` means the command could not be started at all.
    fn run<'a>(
        &'a self,
        command: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<CommandOutcome>> + Send + 'a>>;
}

/// Real executor used in production: `sh -c` (or `cmd /C`) with inherited
/// stdout/stderr.
#[derive(Debug, Clone, Default)]
pub struct ShellExecutor;

impl CommandExecutor for ShellExecutor {
    fn run<'a>(
        &'a self,
        command: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<CommandOutcome>> + Send + 'a>> {
        Box::pin(run_shell(command))
    }
}
