// src/watch/mod.rs

//! File watching and change detection.
//!
//! This module is responsible for:
//! - Compiling `sources` / `ignored` glob patterns per subscription.
//! - Wiring up a cross-platform filesystem watcher (`notify`) plus the
//!   initial scan that precedes the `Ready` event.
//! - Defining the event types and the [`WatchBackend`] seam the orchestrator
//!   consumes.
//!
//! It does **not** know about gates or commands; it only turns filesystem
//! changes into [`WatchEvent`]s.

pub mod event;
pub mod path_utils;
pub mod patterns;
pub mod watcher;

pub use event::{ChangeKind, EventSink, SourcedEvent, SubscriptionId, WatchEvent};
pub use patterns::WatchPatterns;
pub use watcher::{NotifyBackend, SubscriptionSpec, WatchBackend, WatcherHandle};
