// src/exec/mod.rs

//! Process execution layer.
//!
//! This module is responsible for actually running the digested commands,
//! using `tokio::process::Command`, and for keeping track of every child
//! until it has exited.
//!
//! - [`backend`] provides the `CommandRunner` trait the orchestrator uses.
//! - [`command`] holds `ShellRunner`, the production runner.
//! - [`supervisor`] owns the registry of live children and the coordinated
//!   "kill everything and wait" shutdown.

pub mod backend;
pub mod command;
pub mod supervisor;

pub use backend::{CommandRequest, CommandRunner};
pub use command::ShellRunner;
pub use supervisor::{ExitReport, ProcessControl, ProcessHandle, ProcessSupervisor, process_channel};
