// src/exec/backend.rs

//! Pluggable command runner abstraction.
//!
//! The orchestrator talks to a `CommandRunner` instead of spawning processes
//! itself. This makes it easy to swap in a recording runner in tests while
//! keeping the production implementation in [`command`](super::command).

use crate::errors::Result;

/// A digested command ready to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandRequest {
    /// Watch the command belongs to (for logs).
    pub watch: String,
    pub command: String,
    /// Print the command's stdout instead of only logging it.
    pub show_stdout: bool,
}

/// Trait abstracting how digested commands are executed.
///
/// Implementations must not block: spawn the command and return. A returned
/// error means the command could not be started; failures of a started
/// command are the runner's to report.
pub trait CommandRunner: Send {
    /// Start the command and return the pid of the spawned child.
    fn execute(&mut self, request: CommandRequest) -> Result<u32>;
}
