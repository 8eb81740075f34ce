// src/watch/event.rs

//! Events flowing from watcher subscriptions into the orchestrator.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

/// Category of a filesystem change, named the way watch definitions spell
/// them in `triggeringEvents`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChangeKind {
    Add,
    Change,
    Unlink,
    AddDir,
    UnlinkDir,
    Error,
}

impl ChangeKind {
    pub const ALL: [ChangeKind; 6] = [
        ChangeKind::Add,
        ChangeKind::Change,
        ChangeKind::Unlink,
        ChangeKind::AddDir,
        ChangeKind::UnlinkDir,
        ChangeKind::Error,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ChangeKind::Add => "add",
            ChangeKind::Change => "change",
            ChangeKind::Unlink => "unlink",
            ChangeKind::AddDir => "addDir",
            ChangeKind::UnlinkDir => "unlinkDir",
            ChangeKind::Error => "error",
        }
    }
}

impl fmt::Display for ChangeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChangeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ChangeKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s.trim())
            .ok_or_else(|| {
                format!(
                    "invalid change kind: {s} (expected one of add, change, unlink, addDir, unlinkDir, error)"
                )
            })
    }
}

/// A single notification from a watcher subscription.
///
/// Every subscription emits exactly one `Ready` once its initial scan of the
/// root is complete; entries found by that scan are reported as `Add` /
/// `AddDir` before it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchEvent {
    Changed { kind: ChangeKind, path: String },
    Ready,
    Error { message: String },
}

impl WatchEvent {
    pub fn changed(kind: ChangeKind, path: impl Into<String>) -> Self {
        WatchEvent::Changed {
            kind,
            path: path.into(),
        }
    }
}

/// Identifies which subscription an event came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub usize);

/// A `WatchEvent` tagged with its subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourcedEvent {
    pub subscription: SubscriptionId,
    pub event: WatchEvent,
}

/// Sending half handed to a watcher backend for one subscription.
///
/// The channel is unbounded because backends push from synchronous callbacks
/// (the `notify` thread, the initial scan).
#[derive(Debug, Clone)]
pub struct EventSink {
    id: SubscriptionId,
    tx: mpsc::UnboundedSender<SourcedEvent>,
}

impl EventSink {
    pub fn new(id: SubscriptionId, tx: mpsc::UnboundedSender<SourcedEvent>) -> Self {
        Self { id, tx }
    }

    /// Forward an event; returns false once the orchestrator has gone away.
    pub fn emit(&self, event: WatchEvent) -> bool {
        self.tx
            .send(SourcedEvent {
                subscription: self.id,
                event,
            })
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn change_kinds_use_watcher_event_names() {
        let kinds: Vec<ChangeKind> =
            serde_json::from_str(r#"["add", "addDir", "unlinkDir", "error"]"#).unwrap();
        assert_eq!(
            kinds,
            vec![
                ChangeKind::Add,
                ChangeKind::AddDir,
                ChangeKind::UnlinkDir,
                ChangeKind::Error
            ]
        );
        assert_eq!("unlink".parse::<ChangeKind>(), Ok(ChangeKind::Unlink));
        assert!("rename".parse::<ChangeKind>().is_err());
        assert_eq!(ChangeKind::AddDir.to_string(), "addDir");
    }

    #[test]
    fn sink_reports_closed_channel() {
        let (tx, rx) = mpsc::unbounded_channel();
        let sink = EventSink::new(SubscriptionId(3), tx);
        assert!(sink.emit(WatchEvent::Ready));
        drop(rx);
        assert!(!sink.emit(WatchEvent::Ready));
    }
}
