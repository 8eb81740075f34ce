// src/engine/mod.rs

//! Orchestration engine for incbuild.
//!
//! This module ties together:
//! - watch selection (duplicate names, `--watches` filter)
//! - the per-watch execution gate
//! - the orchestrator event loop that turns watcher events into commands
//! - the activity report on stdout

pub mod activity;
pub mod gate;
pub mod orchestrator;
pub mod selection;

pub use activity::ActivityReporter;
pub use gate::ExecutionGate;
pub use orchestrator::WatchOrchestrator;
pub use selection::{WatchSelection, select_watches};
