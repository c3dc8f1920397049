// src/exec/mod.rs

//! Process execution layer.
//!
//! - [`command`] builds and runs the shell command with inherited streams.
//! - [`backend`] provides the `CommandExecutor` trait and the production
//!   `ShellExecutor`, which tests can replace with a fake implementation.

pub mod backend;
pub mod command;

pub use backend::{CommandExecutor, ShellExecutor};
pub use command::run_shell;

/// Outcome of a finished command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandOutcome {
    Success,
    /// Non-zero exit; `None` when terminated by a signal.
    Failed(Option<i32>),
}
