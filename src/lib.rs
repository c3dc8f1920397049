// src/lib.rs

pub mod cli;
pub mod config;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod session;
pub mod supervisor;
pub mod types;
pub mod watch;

use std::path::PathBuf;

use anyhow::Result;
use tracing::debug;

use crate::cli::CliArgs;
use crate::config::{load_and_validate, ConfigFile};
use crate::fs::RealFileSystem;
use crate::session::SessionDeps;
use crate::supervisor::ConfigSupervisor;
use crate::watch::CommandMap;

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading (or a dry-run print)
/// - the config supervisor and its first watch session
/// - Ctrl-C handling
pub async fn run(args: CliArgs) -> Result<()> {
    let config_path = PathBuf::from(&args.config);

    if args.dry_run {
        let cfg = load_and_validate(&config_path)?;
        print_dry_run(&cfg);
        return Ok(());
    }

    // Ctrl-C → graceful shutdown; the active session is joined first.
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            eprintln!("failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    ConfigSupervisor::new(config_path, SessionDeps::production())
        .run(shutdown)
        .await?;

    Ok(())
}

/// Simple dry-run output: print settings and the watch set.
fn print_dry_run(cfg: &ConfigFile) {
    let settings = &cfg.settings;
    println!("settlewatch dry-run");
    println!("  settings.debounce = {:?}", settings.debounce);
    println!("  settings.probe_interval = {:?}", settings.stability.interval);
    println!(
        "  settings.samples = {} then {} after {:?}",
        settings.stability.initial_samples,
        settings.stability.retry_samples,
        settings.stability.retry_cooldown
    );
    println!("  settings.reload_debounce = {:?}", settings.reload_debounce);
    println!();

    // Show what a session would actually key on and register.
    let commands = CommandMap::build(&RealFileSystem, &cfg.entries);
    let mut files: Vec<_> = commands.iter().collect();
    files.sort();

    println!("watch ({}):", files.len());
    for (path, command) in files {
        println!("  - {}", path.display());
        println!("      command: {}", command);
    }
    println!();

    println!("directories:");
    for dir in commands.watch_dirs() {
        println!("  - {}", dir.display());
    }

    debug!("dry-run complete (no watching)");
}
