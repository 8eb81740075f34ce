// src/exec/supervisor.rs

//! Registry of in-flight child processes and the coordinated shutdown that
//! waits for each of them to exit.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use futures::future::join_all;
use tokio::sync::{oneshot, watch};
use tracing::{debug, info};

/// How a child process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitReport {
    /// Exit code, if the process exited normally.
    pub code: Option<i32>,
    /// Terminating signal, if the process was killed by one (unix only).
    pub signal: Option<i32>,
}

impl ExitReport {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    pub fn from_status(status: std::process::ExitStatus) -> Self {
        #[cfg(unix)]
        let signal = std::os::unix::process::ExitStatusExt::signal(&status);
        #[cfg(not(unix))]
        let signal = None;

        Self {
            code: status.code(),
            signal,
        }
    }
}

/// Supervisor-side half of a tracked child: ask it to die, learn when it did.
#[derive(Debug)]
pub struct ProcessHandle {
    kill_tx: Option<oneshot::Sender<()>>,
    exit_rx: watch::Receiver<Option<ExitReport>>,
}

/// Owner-side half, held by whatever task waits on the OS process.
#[derive(Debug)]
pub struct ProcessControl {
    kill_rx: oneshot::Receiver<()>,
    exit_tx: watch::Sender<Option<ExitReport>>,
}

/// Create the two halves connecting a child's owner task to the supervisor.
pub fn process_channel() -> (ProcessHandle, ProcessControl) {
    let (kill_tx, kill_rx) = oneshot::channel();
    let (exit_tx, exit_rx) = watch::channel(None);
    (
        ProcessHandle {
            kill_tx: Some(kill_tx),
            exit_rx,
        },
        ProcessControl { kill_rx, exit_tx },
    )
}

impl ProcessControl {
    /// Resolves once the supervisor asks for the child to be killed.
    ///
    /// Never resolves if the supervisor dropped the handle without asking.
    pub async fn kill_requested(&mut self) {
        if (&mut self.kill_rx).await.is_err() {
            std::future::pending::<()>().await;
        }
    }

    /// Publish the child's exit. Must be called once the OS process is gone.
    pub fn report_exit(self, report: ExitReport) {
        // No receivers left just means nobody is waiting.
        let _ = self.exit_tx.send(Some(report));
    }
}

/// Process-wide registry of spawned children keyed by pid.
///
/// The registry lock is never held across an `.await`.
#[derive(Debug, Default)]
pub struct ProcessSupervisor {
    registry: Mutex<HashMap<u32, ProcessHandle>>,
}

impl ProcessSupervisor {
    pub fn new() -> Self {
        Self::default()
    }

    fn registry(&self) -> MutexGuard<'_, HashMap<u32, ProcessHandle>> {
        // A panic while holding the lock cannot leave the map half-updated.
        match self.registry.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Track a freshly spawned child. Call before anything can observe its
    /// exit.
    pub fn register(&self, pid: u32, handle: ProcessHandle) {
        let previous = self.registry().insert(pid, handle);
        if previous.is_some() {
            debug!(pid, "replaced stale registry entry for reused pid");
        }
        debug!(pid, "registered child process");
    }

    /// Forget a child that completed on its own.
    ///
    /// Returns false (and logs) when the pid is not tracked.
    pub fn unregister(&self, pid: u32) -> bool {
        if self.registry().remove(&pid).is_none() {
            debug!(pid, "trying to unregister a non existing process");
            return false;
        }
        debug!(pid, "unregistered child process");
        true
    }

    pub fn contains(&self, pid: u32) -> bool {
        self.registry().contains_key(&pid)
    }

    pub fn len(&self) -> usize {
        self.registry().len()
    }

    pub fn is_empty(&self) -> bool {
        self.registry().is_empty()
    }

    /// Kill every child registered right now and wait until each one has
    /// reported its own exit.
    ///
    /// A child that exits, or whose owner goes away, between the snapshot
    /// and the kill counts as terminated. Returns the number of children
    /// this call waited for.
    pub async fn terminate_all(&self) -> usize {
        let pending: Vec<(u32, watch::Receiver<Option<ExitReport>>)> = {
            let mut registry = self.registry();
            registry
                .iter_mut()
                .map(|(pid, handle)| {
                    if let Some(kill) = handle.kill_tx.take() {
                        if kill.send(()).is_err() {
                            debug!(pid, "child already exiting; kill not delivered");
                        }
                    }
                    (*pid, handle.exit_rx.clone())
                })
                .collect()
        };

        if pending.is_empty() {
            return 0;
        }

        info!(count = pending.len(), "terminating child processes");

        let exited = join_all(pending.into_iter().map(|(pid, mut exit_rx)| async move {
            let confirmed = exit_rx.wait_for(Option::is_some).await.is_ok();
            if confirmed {
                debug!(pid, "terminated child process confirmed exit");
            } else {
                debug!(pid, "child owner went away; treating as exited");
            }
            pid
        }))
        .await;

        let mut registry = self.registry();
        for pid in &exited {
            registry.remove(pid);
        }
        exited.len()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use super::*;

    const EXITED: ExitReport = ExitReport {
        code: Some(0),
        signal: None,
    };

    #[test]
    fn register_then_unregister_each_leaves_registry_empty() {
        let supervisor = ProcessSupervisor::new();
        let mut controls = Vec::new();
        for pid in 100..105 {
            let (handle, control) = process_channel();
            supervisor.register(pid, handle);
            controls.push((pid, control));
        }
        assert_eq!(supervisor.len(), 5);

        for (pid, control) in controls {
            control.report_exit(EXITED);
            assert!(supervisor.unregister(pid));
        }
        assert!(supervisor.is_empty());
    }

    #[test]
    fn unregister_unknown_pid_returns_false_and_keeps_entries() {
        let supervisor = ProcessSupervisor::new();
        let (handle, _control) = process_channel();
        supervisor.register(7, handle);

        assert!(!supervisor.unregister(8));
        assert_eq!(supervisor.len(), 1);
        assert!(supervisor.contains(7));

        assert!(supervisor.unregister(7));
        assert!(!supervisor.unregister(7));
    }

    #[tokio::test]
    async fn terminate_all_without_children_resolves_immediately() {
        let supervisor = ProcessSupervisor::new();
        let waited = tokio::time::timeout(Duration::from_millis(50), supervisor.terminate_all())
            .await
            .expect("terminate_all should not wait with no children");
        assert_eq!(waited, 0);
    }

    #[tokio::test]
    async fn terminate_all_waits_for_every_exit_notification() {
        let supervisor = Arc::new(ProcessSupervisor::new());
        let exits = Arc::new(AtomicUsize::new(0));

        for pid in 1..=3u32 {
            let (handle, mut control) = process_channel();
            supervisor.register(pid, handle);
            let exits = Arc::clone(&exits);
            tokio::spawn(async move {
                control.kill_requested().await;
                // Exit well after the kill call itself has returned.
                tokio::time::sleep(Duration::from_millis(20 * u64::from(pid))).await;
                exits.fetch_add(1, Ordering::SeqCst);
                control.report_exit(ExitReport {
                    code: None,
                    signal: Some(9),
                });
            });
        }

        let waited = supervisor.terminate_all().await;

        assert_eq!(waited, 3);
        assert_eq!(exits.load(Ordering::SeqCst), 3);
        assert!(supervisor.is_empty());
    }

    #[tokio::test]
    async fn child_that_exits_before_the_kill_counts_as_terminated() {
        let supervisor = ProcessSupervisor::new();

        let (handle, control) = process_channel();
        supervisor.register(1, handle);
        control.report_exit(EXITED);

        // Owner vanished without reporting.
        let (handle, control) = process_channel();
        supervisor.register(2, handle);
        drop(control);

        let waited = tokio::time::timeout(Duration::from_secs(1), supervisor.terminate_all())
            .await
            .expect("already-exited children must not block shutdown");
        assert_eq!(waited, 2);
        assert!(supervisor.is_empty());
    }

    #[tokio::test]
    async fn kill_requested_ignores_a_dropped_handle() {
        let (handle, mut control) = process_channel();
        drop(handle);
        let waited =
            tokio::time::timeout(Duration::from_millis(30), control.kill_requested()).await;
        assert!(waited.is_err());
    }
}
