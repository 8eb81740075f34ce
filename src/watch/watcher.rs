// src/watch/watcher.rs

use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::event::{CreateKind, ModifyKind, RemoveKind, RenameMode};
use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::errors::Result;
use crate::watch::event::{ChangeKind, EventSink, WatchEvent};
use crate::watch::path_utils::relative_str;
use crate::watch::patterns::WatchPatterns;

/// What a subscription should observe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionSpec {
    /// Human-readable name used in logs (usually the watch name).
    pub label: String,
    /// Absolute folder the patterns are relative to.
    pub root: PathBuf,
    pub sources: Vec<String>,
    pub ignored: Vec<String>,
}

/// Handle for a watcher subscription.
///
/// This exists mainly so the underlying watcher is kept alive for as long as
/// needed. Dropping this handle stops the subscription.
pub struct WatcherHandle {
    _inner: Option<Box<dyn Send>>,
}

impl WatcherHandle {
    pub fn new<T: Send + 'static>(inner: T) -> Self {
        Self {
            _inner: Some(Box::new(inner)),
        }
    }

    /// A handle that owns nothing, for backends without a background watcher.
    pub fn detached() -> Self {
        Self { _inner: None }
    }
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle").finish()
    }
}

/// Source of filesystem change events.
///
/// Production code uses [`NotifyBackend`]; tests provide a scripted backend
/// that pushes a fixed sequence of events into the sink.
pub trait WatchBackend: Send {
    /// Start observing `spec.root`. Events go to `sink` until the returned
    /// handle is dropped; exactly one `Ready` follows the initial scan.
    fn subscribe(&mut self, spec: &SubscriptionSpec, sink: EventSink) -> Result<WatcherHandle>;
}

/// Real watcher backend built on `notify` with a `walkdir` initial scan.
#[derive(Debug, Clone, Default)]
pub struct NotifyBackend;

impl NotifyBackend {
    pub fn new() -> Self {
        Self
    }
}

impl WatchBackend for NotifyBackend {
    fn subscribe(&mut self, spec: &SubscriptionSpec, sink: EventSink) -> Result<WatcherHandle> {
        let root = spec
            .root
            .canonicalize()
            .unwrap_or_else(|_| spec.root.clone());
        let patterns = Arc::new(WatchPatterns::new(
            spec.label.clone(),
            &spec.sources,
            &spec.ignored,
        )?);

        // Closure called synchronously by notify whenever an event arrives.
        let mut watcher = RecommendedWatcher::new(
            {
                let sink = sink.clone();
                let root = root.clone();
                let patterns = Arc::clone(&patterns);
                move |res: notify::Result<Event>| match res {
                    Ok(event) => forward_notify_event(&root, &patterns, &sink, &event),
                    Err(err) => {
                        sink.emit(WatchEvent::Error {
                            message: err.to_string(),
                        });
                    }
                }
            },
            Config::default(),
        )?;

        watcher.watch(&root, RecursiveMode::Recursive)?;

        info!(watch = %spec.label, root = ?root, "file watcher started");

        // The initial scan runs off the event loop; `Ready` is its last event.
        let scan_root = root.clone();
        tokio::task::spawn_blocking(move || {
            let reported = initial_scan(&scan_root, &patterns, &sink);
            debug!(watch = %patterns.label(), reported, "initial scan complete");
            sink.emit(WatchEvent::Ready);
        });

        Ok(WatcherHandle::new(watcher))
    }
}

/// Walk `root` and report every matching entry as `add` / `addDir`.
///
/// Returns the number of entries reported.
pub fn initial_scan(root: &Path, patterns: &WatchPatterns, sink: &EventSink) -> usize {
    let mut reported = 0;
    let walker = WalkDir::new(root)
        .min_depth(1)
        .follow_links(false)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| {
            relative_str(root, entry.path()).is_none_or(|rel| !patterns.is_excluded(&rel))
        });

    for entry in walker {
        let entry = match entry {
            Ok(e) => e,
            Err(err) => {
                warn!(watch = %patterns.label(), error = %err, "error during initial scan");
                sink.emit(WatchEvent::Error {
                    message: err.to_string(),
                });
                continue;
            }
        };
        let Some(rel) = relative_str(root, entry.path()) else {
            continue;
        };
        if !patterns.matches(&rel) {
            continue;
        }
        let kind = if entry.file_type().is_dir() {
            ChangeKind::AddDir
        } else {
            ChangeKind::Add
        };
        if !sink.emit(WatchEvent::changed(kind, rel)) {
            break;
        }
        reported += 1;
    }
    reported
}

fn forward_notify_event(root: &Path, patterns: &WatchPatterns, sink: &EventSink, event: &Event) {
    for (kind, path) in classify(event) {
        let Some(rel) = relative_str(root, &path) else {
            continue;
        };
        if rel.is_empty() || !patterns.matches(&rel) {
            continue;
        }
        sink.emit(WatchEvent::changed(kind, rel));
    }
}

/// Translate a raw `notify` event into change kinds per affected path.
///
/// Events that do not correspond to a content or tree change (access,
/// metadata-only) yield nothing.
pub fn classify(event: &Event) -> Vec<(ChangeKind, PathBuf)> {
    let added = |path: &PathBuf| {
        if path.is_dir() {
            (ChangeKind::AddDir, path.clone())
        } else {
            (ChangeKind::Add, path.clone())
        }
    };

    match &event.kind {
        EventKind::Create(CreateKind::File) => {
            event.paths.iter().map(|p| (ChangeKind::Add, p.clone())).collect()
        }
        EventKind::Create(CreateKind::Folder) => {
            event.paths.iter().map(|p| (ChangeKind::AddDir, p.clone())).collect()
        }
        EventKind::Create(_) => event.paths.iter().map(added).collect(),

        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
            event.paths.iter().map(|p| (ChangeKind::Unlink, p.clone())).collect()
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            event.paths.iter().map(added).collect()
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
            let mut out = Vec::with_capacity(2);
            if let Some(from) = event.paths.first() {
                out.push((ChangeKind::Unlink, from.clone()));
            }
            if let Some(to) = event.paths.get(1) {
                out.push(added(to));
            }
            out
        }
        EventKind::Modify(ModifyKind::Name(_)) => event
            .paths
            .iter()
            .map(|p| {
                if p.exists() {
                    added(p)
                } else {
                    (ChangeKind::Unlink, p.clone())
                }
            })
            .collect(),
        EventKind::Modify(ModifyKind::Metadata(_)) => Vec::new(),
        EventKind::Modify(_) => event
            .paths
            .iter()
            .filter(|p| !p.is_dir())
            .map(|p| (ChangeKind::Change, p.clone()))
            .collect(),

        EventKind::Remove(RemoveKind::Folder) => {
            event.paths.iter().map(|p| (ChangeKind::UnlinkDir, p.clone())).collect()
        }
        EventKind::Remove(_) => {
            event.paths.iter().map(|p| (ChangeKind::Unlink, p.clone())).collect()
        }

        EventKind::Access(_) | EventKind::Any | EventKind::Other => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{DataChange, MetadataKind};

    fn event(kind: EventKind, paths: &[&str]) -> Event {
        let mut ev = Event::new(kind);
        for p in paths {
            ev = ev.add_path(PathBuf::from(p));
        }
        ev
    }

    #[test]
    fn classifies_creation_modification_and_removal() {
        let created = classify(&event(EventKind::Create(CreateKind::File), &["/r/a.ts"]));
        assert_eq!(created, vec![(ChangeKind::Add, PathBuf::from("/r/a.ts"))]);

        let folder = classify(&event(EventKind::Create(CreateKind::Folder), &["/r/d"]));
        assert_eq!(folder, vec![(ChangeKind::AddDir, PathBuf::from("/r/d"))]);

        let changed = classify(&event(
            EventKind::Modify(ModifyKind::Data(DataChange::Content)),
            &["/r/does-not-exist.ts"],
        ));
        assert_eq!(changed, vec![(ChangeKind::Change, PathBuf::from("/r/does-not-exist.ts"))]);

        let removed = classify(&event(EventKind::Remove(RemoveKind::Folder), &["/r/d"]));
        assert_eq!(removed, vec![(ChangeKind::UnlinkDir, PathBuf::from("/r/d"))]);
    }

    #[test]
    fn rename_pairs_become_unlink_then_add() {
        let renamed = classify(&event(
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
            &["/r/old.ts", "/r/new.ts"],
        ));
        assert_eq!(
            renamed,
            vec![
                (ChangeKind::Unlink, PathBuf::from("/r/old.ts")),
                (ChangeKind::Add, PathBuf::from("/r/new.ts")),
            ]
        );
    }

    #[test]
    fn metadata_and_access_events_are_dropped() {
        assert!(classify(&event(
            EventKind::Modify(ModifyKind::Metadata(MetadataKind::Permissions)),
            &["/r/a.ts"]
        ))
        .is_empty());
        assert!(classify(&event(
            EventKind::Access(notify::event::AccessKind::Any),
            &["/r/a.ts"]
        ))
        .is_empty());
    }
}
