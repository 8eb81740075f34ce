// src/lib.rs

pub mod cli;
pub mod config;
pub mod engine;
pub mod errors;
pub mod exec;
pub mod fs;
pub mod logging;
pub mod shutdown;
pub mod template;
pub mod watch;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use tracing::{Level, debug, error, info};

use crate::cli::CliArgs;
use crate::config::{Configuration, load_and_validate};
use crate::engine::{ActivityReporter, WatchOrchestrator, select_watches};
use crate::exec::{ProcessSupervisor, ShellRunner};
use crate::fs::RealDirCreator;
use crate::shutdown::{ShutdownReason, stop_and_terminate, task_monitor, wait_for_signal};
use crate::watch::NotifyBackend;

/// How a `run` ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunOutcome {
    /// `--list` or `--show` printed what was asked and returned.
    Listed,
    /// The watch loop ran and was stopped.
    Shutdown(ShutdownReason),
}

impl RunOutcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            RunOutcome::Listed => 0,
            RunOutcome::Shutdown(reason) => reason.exit_code(),
        }
    }
}

/// High-level entry point used by `main.rs`.
///
/// This wires together:
/// - config loading and watch selection
/// - the shell runner and its process supervisor
/// - the notify-based watchers and the orchestrator loop
/// - signal handling and child cleanup on the way out
pub async fn run(args: CliArgs, log_level: Level) -> Result<RunOutcome> {
    let config_path = PathBuf::from(&args.config);
    let config = load_and_validate(&config_path)
        .with_context(|| format!("loading watch definitions from {config_path:?}"))?;

    if args.list {
        print_watch_list(&config);
        return Ok(RunOutcome::Listed);
    }
    if let Some(name) = args.show.as_deref() {
        print_watch(&config, name)?;
        return Ok(RunOutcome::Listed);
    }

    let selection = select_watches(&config.watches, &args.watches)?;

    let activity = ActivityReporter::stdout(logging::activity_report_enabled(log_level));
    let supervisor = Arc::new(ProcessSupervisor::new());
    let (monitor, mut failures) = task_monitor();
    let runner = ShellRunner::new(Arc::clone(&supervisor), activity.clone(), monitor);

    let mut orchestrator =
        WatchOrchestrator::new(NotifyBackend::new(), runner, RealDirCreator, activity.clone());
    let activated = orchestrator.activate(&config.base_root, &selection.active);
    if activated == 0 {
        return Err(anyhow!("no watch could be started"));
    }
    info!(
        activated,
        base_root = ?config.base_root,
        "watching; press Ctrl+C to stop"
    );
    activity.print_legend();

    let mut loop_handle = tokio::spawn(orchestrator.run());

    let (reason, still_running) = tokio::select! {
        signal = wait_for_signal() => match signal {
            Ok(name) => {
                info!(signal = name, "shutting down");
                (ShutdownReason::Signal(name), true)
            }
            Err(err) => {
                error!(error = %err, "failed to listen for termination signals");
                (ShutdownReason::Failure(err.to_string()), true)
            }
        },
        Some(failure) = failures.recv() => (ShutdownReason::Failure(failure), true),
        joined = &mut loop_handle => match joined {
            Ok(()) => (ShutdownReason::WatchesClosed, false),
            Err(err) => {
                error!(error = %err, "orchestrator task failed");
                (ShutdownReason::Failure(err.to_string()), false)
            }
        },
    };

    // A finished JoinHandle must not be polled again.
    let orchestrator = still_running.then_some(loop_handle);
    let terminated = stop_and_terminate(orchestrator, &supervisor).await;
    debug!(terminated, "child processes terminated");

    Ok(RunOutcome::Shutdown(reason))
}

/// `--list`: base folder plus one line per watch.
fn print_watch_list(config: &Configuration) {
    println!("Base folder: {}", config.base_root.display());
    println!();
    println!("Available watches:");
    for line in config.describe_watches() {
        println!("  - {line}");
    }
}

/// `--show`: the definition(s) carrying `name`, as pretty JSON.
fn print_watch(config: &Configuration, name: &str) -> Result<()> {
    let matching: Vec<_> = config.watches_named(name).collect();
    match matching.as_slice() {
        [] => Err(anyhow!("watch {name:?} is not defined in {:?}", config.source)),
        [watch] => {
            println!("{}", serde_json::to_string_pretty(watch)?);
            Ok(())
        }
        many => {
            println!("{}", serde_json::to_string_pretty(many)?);
            Ok(())
        }
    }
}
