// src/exec/command.rs

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, error, info, warn};

use crate::engine::ActivityReporter;
use crate::errors::{IncbuildError, Result};
use crate::exec::backend::{CommandRequest, CommandRunner};
use crate::exec::supervisor::{ExitReport, ProcessControl, ProcessSupervisor, process_channel};
use crate::shutdown::TaskMonitor;

/// How long a child gets to exit after SIGTERM before it is killed outright.
pub const TERMINATE_GRACE: Duration = Duration::from_secs(10);

/// Production runner: runs commands through the platform shell and tracks
/// every child with the [`ProcessSupervisor`].
///
/// Must be used from within a Tokio runtime.
#[derive(Debug, Clone)]
pub struct ShellRunner {
    supervisor: Arc<ProcessSupervisor>,
    activity: ActivityReporter,
    monitor: TaskMonitor,
}

impl ShellRunner {
    pub fn new(
        supervisor: Arc<ProcessSupervisor>,
        activity: ActivityReporter,
        monitor: TaskMonitor,
    ) -> Self {
        Self {
            supervisor,
            activity,
            monitor,
        }
    }
}

impl CommandRunner for ShellRunner {
    fn execute(&mut self, request: CommandRequest) -> Result<u32> {
        debug!(watch = %request.watch, cmd = %request.command, "starting command process");

        let mut cmd = shell_command(&request.command);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|source| IncbuildError::SpawnError {
            command: request.command.clone(),
            source,
        })?;

        let pid = child.id().ok_or_else(|| IncbuildError::SpawnError {
            command: request.command.clone(),
            source: std::io::Error::other("process was reaped before its pid was read"),
        })?;

        // Register before the owner task exists, so the exit can never be
        // observed ahead of the registration.
        let (handle, control) = process_channel();
        self.supervisor.register(pid, handle);

        attach_output_readers(&mut child, pid, &request, &self.activity, &self.monitor);

        let supervisor = Arc::clone(&self.supervisor);
        self.monitor.spawn(
            "child supervisor",
            supervise_child(child, pid, request, control, supervisor),
        );

        Ok(pid)
    }
}

/// Build a shell command appropriate for the platform.
///
/// On unix the shell leads its own process group, so termination reaches
/// whatever the command line started.
#[cfg(unix)]
fn shell_command(command: &str) -> Command {
    let mut c = Command::new("sh");
    c.arg("-c").arg(command).process_group(0);
    c
}

#[cfg(not(unix))]
fn shell_command(command: &str) -> Command {
    let mut c = Command::new("cmd");
    c.arg("/C").arg(command);
    c
}

/// Always consume stdout/stderr so pipe buffers don't fill.
fn attach_output_readers(
    child: &mut Child,
    pid: u32,
    request: &CommandRequest,
    activity: &ActivityReporter,
    monitor: &TaskMonitor,
) {
    if let Some(stdout) = child.stdout.take() {
        let show = request.show_stdout;
        let activity = activity.clone();
        monitor.spawn("stdout reader", async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if show {
                    activity.passthrough(&line);
                } else {
                    debug!(pid, "stdout: {}", line);
                }
            }
        });
    }

    if let Some(stderr) = child.stderr.take() {
        let show = request.show_stdout;
        let activity = activity.clone();
        monitor.spawn("stderr reader", async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                if show {
                    activity.passthrough(&format!("stderr: {line}"));
                } else {
                    debug!(pid, "stderr: {}", line);
                }
            }
        });
    }
}

/// Ask the child to stop (SIGTERM to its process group on unix) and wait for
/// it. Kills it outright if it is still running after [`TERMINATE_GRACE`].
async fn terminate(child: &mut Child, pid: u32) -> std::io::Result<std::process::ExitStatus> {
    if request_stop(pid) {
        match tokio::time::timeout(TERMINATE_GRACE, child.wait()).await {
            Ok(status) => return status,
            Err(_) => warn!(pid, "child process ignored SIGTERM; killing it"),
        }
    }
    if let Err(e) = child.start_kill() {
        warn!(pid, error = %e, "failed to send kill to child process");
    }
    child.wait().await
}

/// Returns false when no stop request could be delivered.
#[cfg(unix)]
fn request_stop(pid: u32) -> bool {
    let Ok(pgid) = libc::pid_t::try_from(pid) else {
        return false;
    };
    // SAFETY: killpg only sends a signal. The child is not reaped yet, so
    // the group it leads still exists.
    let rc = unsafe { libc::killpg(pgid, libc::SIGTERM) };
    if rc != 0 {
        warn!(pid, error = %std::io::Error::last_os_error(), "failed to send SIGTERM to child process group");
        return false;
    }
    true
}

#[cfg(not(unix))]
fn request_stop(_pid: u32) -> bool {
    false
}

/// Wait for the child to exit on its own or be killed by the supervisor,
/// publish the exit, then drop it from the registry.
async fn supervise_child(
    mut child: Child,
    pid: u32,
    request: CommandRequest,
    mut control: ProcessControl,
    supervisor: Arc<ProcessSupervisor>,
) {
    let (status, killed) = tokio::select! {
        status = child.wait() => (status, false),
        _ = control.kill_requested() => {
            debug!(pid, cmd = %request.command, "terminating child process for shutdown");
            (terminate(&mut child, pid).await, true)
        }
    };

    let report = match status {
        Ok(status) => ExitReport::from_status(status),
        Err(e) => {
            error!(pid, cmd = %request.command, error = %e, "failed waiting for child process");
            ExitReport {
                code: None,
                signal: None,
            }
        }
    };

    if killed {
        info!(watch = %request.watch, pid, cmd = %request.command, "terminated child process");
    } else if report.success() {
        debug!(watch = %request.watch, pid, cmd = %request.command, "command finished");
    } else {
        error!(
            watch = %request.watch,
            pid,
            cmd = %request.command,
            exit_code = ?report.code,
            signal = ?report.signal,
            "error executing shell command"
        );
    }

    control.report_exit(report);
    supervisor.unregister(pid);
}
