use std::sync::{Arc, Mutex};

use incbuild::errors::{IncbuildError, Result};
use incbuild::watch::{
    ChangeKind, EventSink, SubscriptionSpec, WatchBackend, WatchEvent, WatcherHandle,
};

type Subscriptions = Arc<Mutex<Vec<(SubscriptionSpec, EventSink)>>>;

/// A fake watcher backend that:
/// - records every subscription with its sink
/// - emits nothing on its own; tests drive events through [`ScriptedWatches`]
/// - refuses subscriptions whose label is listed in `failing_labels`.
#[derive(Debug, Clone, Default)]
pub struct ScriptedBackend {
    subscriptions: Subscriptions,
    failing_labels: Vec<String>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_on(mut self, label: &str) -> Self {
        self.failing_labels.push(label.to_string());
        self
    }

    /// Test-side handle for driving the recorded subscriptions.
    pub fn watches(&self) -> ScriptedWatches {
        ScriptedWatches {
            subscriptions: Arc::clone(&self.subscriptions),
        }
    }
}

impl WatchBackend for ScriptedBackend {
    fn subscribe(&mut self, spec: &SubscriptionSpec, sink: EventSink) -> Result<WatcherHandle> {
        if self.failing_labels.contains(&spec.label) {
            return Err(IncbuildError::IoError(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("scripted failure for {}", spec.label),
            )));
        }
        self.subscriptions
            .lock()
            .unwrap()
            .push((spec.clone(), sink));
        Ok(WatcherHandle::detached())
    }
}

/// Emits events as if they came from the recorded subscriptions.
#[derive(Debug, Clone)]
pub struct ScriptedWatches {
    subscriptions: Subscriptions,
}

impl ScriptedWatches {
    pub fn specs(&self) -> Vec<SubscriptionSpec> {
        self.subscriptions
            .lock()
            .unwrap()
            .iter()
            .map(|(spec, _)| spec.clone())
            .collect()
    }

    /// Emit on the subscription with the given label.
    pub fn emit(&self, label: &str, event: WatchEvent) {
        let subs = self.subscriptions.lock().unwrap();
        let (_, sink) = subs
            .iter()
            .find(|(spec, _)| spec.label == label)
            .unwrap_or_else(|| panic!("no subscription labelled {label:?}"));
        assert!(sink.emit(event), "orchestrator is gone");
    }

    pub fn ready(&self, label: &str) {
        self.emit(label, WatchEvent::Ready);
    }

    pub fn change(&self, label: &str, kind: ChangeKind, path: &str) {
        self.emit(label, WatchEvent::changed(kind, path));
    }

    /// Drop every sink, as if all watchers had stopped.
    pub fn close_all(&self) {
        self.subscriptions.lock().unwrap().clear();
    }
}
