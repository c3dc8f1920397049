// src/cli.rs

//! CLI argument parsing using `clap`.

use clap::{Parser, ValueEnum};

/// Command-line arguments for `settlewatch`.
#[derive(Debug, Clone, Parser)]
#[command(
    name = "settlewatch",
    version,
    about = "Run a command once a watched file has stopped changing.",
    long_about = None
)]
pub struct CliArgs {
    /// Path to the config file (TOML, or JSON when the extension is `.json`).
    ///
    /// The file is itself watched; edits are applied without a restart.
    #[arg(long, value_name = "PATH", default_value = "settlewatch.toml")]
    pub config: String,

    /// Logging level (error, warn, info, debug, trace).
    ///
    /// If omitted, `SETTLEWATCH_LOG` or a default level will be used.
    #[arg(long, value_enum, value_name = "LEVEL")]
    pub log_level: Option<LogLevel>,

    /// Parse + validate, print the watch set, but don't watch anything.
    #[arg(long)]
    pub dry_run: bool,
}

/// Log level as exposed on the CLI.
#[derive(Debug, Copy, Clone, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// Convenience wrapper around `CliArgs::parse()`.
pub fn parse() -> CliArgs {
    CliArgs::parse()
}
