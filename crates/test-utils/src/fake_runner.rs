use std::sync::{Arc, Mutex};

use incbuild::errors::{IncbuildError, Result};
use incbuild::exec::{CommandRequest, CommandRunner};

/// A fake runner that:
/// - records every request it receives, in order
/// - hands out increasing fake pids
/// - refuses commands containing `fail_marker`, if set.
#[derive(Debug, Clone, Default)]
pub struct RecordingRunner {
    executed: Arc<Mutex<Vec<CommandRequest>>>,
    next_pid: u32,
    fail_marker: Option<String>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self {
            next_pid: 1000,
            ..Self::default()
        }
    }

    /// Make commands containing `marker` fail to start.
    pub fn failing_on(mut self, marker: &str) -> Self {
        self.fail_marker = Some(marker.to_string());
        self
    }

    /// Shared view of the recorded requests.
    pub fn log(&self) -> Arc<Mutex<Vec<CommandRequest>>> {
        Arc::clone(&self.executed)
    }
}

impl CommandRunner for RecordingRunner {
    fn execute(&mut self, request: CommandRequest) -> Result<u32> {
        let refuse = self
            .fail_marker
            .as_deref()
            .is_some_and(|marker| request.command.contains(marker));

        self.executed.lock().unwrap().push(request.clone());

        if refuse {
            return Err(IncbuildError::SpawnError {
                command: request.command,
                source: std::io::Error::other("refused by RecordingRunner"),
            });
        }

        self.next_pid += 1;
        Ok(self.next_pid)
    }
}

/// Commands recorded so far.
pub fn commands(log: &Arc<Mutex<Vec<CommandRequest>>>) -> Vec<String> {
    log.lock()
        .unwrap()
        .iter()
        .map(|r| r.command.clone())
        .collect()
}
