// src/shutdown.rs

//! Why the process stops, what can stop it, and the orderly way down.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::io;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error};

use crate::exec::ProcessSupervisor;

/// Reason the watch loop ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShutdownReason {
    /// SIGINT, SIGHUP or SIGTERM.
    Signal(&'static str),
    /// Unexpected error while running.
    Failure(String),
    /// Every watcher subscription went away.
    WatchesClosed,
}

impl ShutdownReason {
    /// Process exit code: 0 for a signal, 1 otherwise.
    pub fn exit_code(&self) -> i32 {
        match self {
            ShutdownReason::Signal(_) => 0,
            ShutdownReason::Failure(_) | ShutdownReason::WatchesClosed => 1,
        }
    }
}

impl fmt::Display for ShutdownReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShutdownReason::Signal(name) => write!(f, "received {name}"),
            ShutdownReason::Failure(msg) => write!(f, "failure: {msg}"),
            ShutdownReason::WatchesClosed => f.write_str("all watches closed"),
        }
    }
}

/// Resolve with the name of the first termination signal received.
#[cfg(unix)]
pub async fn wait_for_signal() -> io::Result<&'static str> {
    use tokio::signal::unix::{SignalKind, signal};

    let mut hangup = signal(SignalKind::hangup())?;
    let mut terminate = signal(SignalKind::terminate())?;

    tokio::select! {
        res = tokio::signal::ctrl_c() => res.map(|()| "SIGINT"),
        _ = hangup.recv() => Ok("SIGHUP"),
        _ = terminate.recv() => Ok("SIGTERM"),
    }
}

#[cfg(not(unix))]
pub async fn wait_for_signal() -> io::Result<&'static str> {
    tokio::signal::ctrl_c().await.map(|()| "SIGINT")
}

/// Spawns background tasks and reports any that panic, so a panic anywhere
/// ends the run instead of being swallowed by the runtime.
#[derive(Debug, Clone)]
pub struct TaskMonitor {
    failures: mpsc::UnboundedSender<String>,
}

/// Receiving end of [`TaskMonitor`] panic reports.
pub type FailureReceiver = mpsc::UnboundedReceiver<String>;

pub fn task_monitor() -> (TaskMonitor, FailureReceiver) {
    let (failures, rx) = mpsc::unbounded_channel();
    (TaskMonitor { failures }, rx)
}

impl TaskMonitor {
    pub fn spawn<F>(&self, what: &'static str, task: F)
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let failures = self.failures.clone();
        tokio::spawn(async move {
            if let Err(panic) = AssertUnwindSafe(task).catch_unwind().await {
                let message = format!("{what} panicked: {}", panic_message(panic.as_ref()));
                error!(task = what, "{message}");
                // Nobody listening means the run is already ending.
                let _ = failures.send(message);
            }
        });
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    panic
        .downcast_ref::<&str>()
        .copied()
        .or_else(|| panic.downcast_ref::<String>().map(String::as_str))
        .unwrap_or("unknown panic")
}

/// Stop the orchestrator (if it is still running), then kill and await every
/// tracked child.
///
/// The orchestrator is awaited after the abort so nothing it is still doing
/// can register a child behind `terminate_all`'s back. Returns the number of
/// children terminated.
pub async fn stop_and_terminate(
    orchestrator: Option<JoinHandle<()>>,
    supervisor: &ProcessSupervisor,
) -> usize {
    if let Some(handle) = orchestrator {
        handle.abort();
        if let Err(err) = handle.await {
            if !err.is_cancelled() {
                debug!(error = %err, "orchestrator task ended abnormally");
            }
        }
    }
    supervisor.terminate_all().await
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::time::Duration;

    use tokio::sync::oneshot;

    use super::*;
    use crate::exec::{ExitReport, process_channel};

    #[test]
    fn only_signals_exit_cleanly() {
        assert_eq!(ShutdownReason::Signal("SIGTERM").exit_code(), 0);
        assert_eq!(ShutdownReason::Failure("boom".into()).exit_code(), 1);
        assert_eq!(ShutdownReason::WatchesClosed.exit_code(), 1);
    }

    #[test]
    fn display_names_the_signal() {
        assert_eq!(ShutdownReason::Signal("SIGHUP").to_string(), "received SIGHUP");
    }

    #[tokio::test]
    async fn panicking_tasks_are_reported() {
        let (monitor, mut failures) = task_monitor();
        monitor.spawn("reader", async { panic!("pipe exploded") });
        monitor.spawn("quiet", async {});

        let message = tokio::time::timeout(Duration::from_secs(5), failures.recv())
            .await
            .expect("panic report")
            .expect("channel open");
        assert_eq!(message, "reader panicked: pipe exploded");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn children_started_while_stopping_are_still_terminated() {
        let supervisor = Arc::new(ProcessSupervisor::new());
        let (started_tx, started_rx) = oneshot::channel();

        // Stands in for an orchestrator busy with an event when the stop
        // request arrives: it registers a child before its next await.
        let busy = {
            let supervisor = Arc::clone(&supervisor);
            tokio::spawn(async move {
                let _ = started_tx.send(());
                std::thread::sleep(Duration::from_millis(100));

                let (handle, mut control) = process_channel();
                supervisor.register(42, handle);
                tokio::spawn(async move {
                    control.kill_requested().await;
                    control.report_exit(ExitReport {
                        code: None,
                        signal: Some(15),
                    });
                });

                std::future::pending::<()>().await;
            })
        };

        started_rx.await.expect("task started");
        let terminated = tokio::time::timeout(
            Duration::from_secs(5),
            stop_and_terminate(Some(busy), &supervisor),
        )
        .await
        .expect("shutdown finished");

        assert_eq!(terminated, 1);
        assert!(supervisor.is_empty());
    }
}
