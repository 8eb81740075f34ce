// src/engine/orchestrator.rs

//! Binds watch definitions to watcher subscriptions, gates and templates,
//! and turns watcher events into commands.

use std::fmt;
use std::path::Path;

use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use crate::config::{TriggerRule, WatchDefinition};
use crate::engine::activity::ActivityReporter;
use crate::engine::gate::ExecutionGate;
use crate::exec::{CommandRequest, CommandRunner};
use crate::fs::DirCreator;
use crate::template::{CommandTemplate, NO_CHANGE_KIND};
use crate::watch::path_utils::join_normalized;
use crate::watch::{
    ChangeKind, EventSink, SourcedEvent, SubscriptionId, SubscriptionSpec, WatchBackend,
    WatchEvent, WatcherHandle,
};

/// Index of a watch's gate in the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct GateId(usize);

/// One trigger rule, with its templates bound to the watch roots.
#[derive(Debug)]
struct RuleBinding {
    rule: TriggerRule,
    template: CommandTemplate,
}

#[derive(Debug)]
enum BindingRole {
    /// The watch's main subscription over its `sources`.
    Triggers {
        rules: Vec<RuleBinding>,
        after_ready: Option<CommandTemplate>,
        ready_seen: bool,
    },
    /// Secondary subscription creating folders for every added folder.
    AutoCreateDir { target: CommandTemplate },
}

/// What one subscription feeds into.
#[derive(Debug)]
struct Binding {
    watch: String,
    gate: GateId,
    role: BindingRole,
}

/// Event loop over every active watch.
///
/// All subscriptions feed a single channel and each event is handled to
/// completion before the next one is taken, so per-subscription ordering is
/// preserved and gate state needs no locking.
pub struct WatchOrchestrator<B, R, D>
where
    B: WatchBackend,
    R: CommandRunner,
    D: DirCreator,
{
    backend: B,
    runner: R,
    dirs: D,
    activity: ActivityReporter,
    gates: Vec<ExecutionGate>,
    bindings: Vec<Binding>,
    handles: Vec<WatcherHandle>,
    events_tx: mpsc::UnboundedSender<SourcedEvent>,
    events_rx: mpsc::UnboundedReceiver<SourcedEvent>,
}

impl<B, R, D> fmt::Debug for WatchOrchestrator<B, R, D>
where
    B: WatchBackend,
    R: CommandRunner,
    D: DirCreator,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchOrchestrator")
            .field("gates", &self.gates)
            .field("bindings", &self.bindings.len())
            .finish_non_exhaustive()
    }
}

impl<B, R, D> WatchOrchestrator<B, R, D>
where
    B: WatchBackend,
    R: CommandRunner,
    D: DirCreator,
{
    pub fn new(backend: B, runner: R, dirs: D, activity: ActivityReporter) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Self {
            backend,
            runner,
            dirs,
            activity,
            gates: Vec::new(),
            bindings: Vec::new(),
            handles: Vec::new(),
            events_tx,
            events_rx,
        }
    }

    /// Subscribe every watch. A watch whose subscription fails is logged and
    /// skipped; returns the number of watches that are now active.
    pub fn activate(&mut self, base_root: &Path, watches: &[&WatchDefinition]) -> usize {
        let names: Vec<&str> = watches.iter().map(|w| w.name.as_str()).collect();
        info!(watches = ?names, "start listening to watch(es)");

        watches
            .iter()
            .filter(|watch| self.activate_watch(base_root, watch))
            .count()
    }

    fn activate_watch(&mut self, base_root: &Path, watch: &WatchDefinition) -> bool {
        let watch_root = join_normalized(base_root, &watch.watch_root);
        debug!(
            watch = %watch.name,
            sources = ?watch.sources,
            root = ?watch_root,
            "registering watch"
        );

        let gate = GateId(self.gates.len());
        self.gates.push(if watch.execute_before_ready {
            ExecutionGate::pre_armed()
        } else {
            ExecutionGate::new()
        });

        let rules = watch
            .triggered_commands
            .iter()
            .map(|rule| RuleBinding {
                rule: rule.clone(),
                template: CommandTemplate::new(base_root, &watch_root, rule.commands.clone()),
            })
            .collect();
        let after_ready = watch
            .exec_after_ready
            .as_ref()
            .map(|cmd| CommandTemplate::single(base_root, &watch_root, cmd.clone()));

        let spec = SubscriptionSpec {
            label: watch.name.clone(),
            root: watch_root.clone(),
            sources: watch.sources.clone(),
            ignored: watch.ignored.clone(),
        };
        let role = BindingRole::Triggers {
            rules,
            after_ready,
            ready_seen: false,
        };
        if let Err(err) = self.subscribe(&watch.name, gate, &spec, role) {
            error!(watch = %watch.name, root = ?watch_root, error = %err, "could not start watch");
            return false;
        }

        if let Some(target) = &watch.auto_create_dir {
            self.activate_auto_create_dir(base_root, &watch_root, watch, gate, target);
        }

        true
    }

    fn activate_auto_create_dir(
        &mut self,
        base_root: &Path,
        watch_root: &Path,
        watch: &WatchDefinition,
        gate: GateId,
        target: &str,
    ) {
        // Quotes are meaningful to a shell, not to a folder path.
        let target = CommandTemplate::single(base_root, watch_root, target.replace('"', ""));
        let spec = SubscriptionSpec {
            label: format!("{} (auto-create-dir)", watch.name),
            root: watch_root.to_path_buf(),
            sources: vec!["**".to_string()],
            ignored: watch.ignored.clone(),
        };

        match self.subscribe(&watch.name, gate, &spec, BindingRole::AutoCreateDir { target }) {
            Ok(()) => debug!(watch = %watch.name, root = ?watch_root, "registered auto folder creation"),
            Err(err) => error!(
                watch = %watch.name,
                error = %err,
                "could not start auto folder creation"
            ),
        }
    }

    fn subscribe(
        &mut self,
        watch: &str,
        gate: GateId,
        spec: &SubscriptionSpec,
        role: BindingRole,
    ) -> crate::errors::Result<()> {
        let id = SubscriptionId(self.bindings.len());
        let sink = EventSink::new(id, self.events_tx.clone());
        let handle = self.backend.subscribe(spec, sink)?;

        self.bindings.push(Binding {
            watch: watch.to_string(),
            gate,
            role,
        });
        self.handles.push(handle);
        Ok(())
    }

    /// Number of live subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.handles.len()
    }

    /// Whether the gate of the named watch is armed (`None` if not active).
    pub fn is_armed(&self, watch: &str) -> Option<bool> {
        self.bindings
            .iter()
            .find(|b| b.watch == watch)
            .map(|b| self.gates[b.gate.0].is_armed())
    }

    /// Handle every event already queued, without waiting for more.
    ///
    /// Returns the number of events handled.
    pub fn process_pending(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.events_rx.try_recv() {
            self.handle_event(event);
            handled += 1;
        }
        handled
    }

    /// Main event loop. Returns once every subscription has gone away.
    pub async fn run(mut self) {
        // Only subscriptions may keep the channel open.
        let (closed_tx, _) = mpsc::unbounded_channel();
        drop(std::mem::replace(&mut self.events_tx, closed_tx));

        info!(subscriptions = self.handles.len(), "orchestrator started");

        while let Some(event) = self.events_rx.recv().await {
            self.handle_event(event);
        }

        info!("all watcher subscriptions closed; orchestrator exiting");
    }

    /// Apply a single watcher event.
    pub fn handle_event(&mut self, event: SourcedEvent) {
        let Some(binding) = self.bindings.get_mut(event.subscription.0) else {
            warn!(subscription = ?event.subscription, "event for unknown subscription");
            return;
        };
        let gate = &mut self.gates[binding.gate.0];
        let watch = binding.watch.as_str();

        match (&mut binding.role, event.event) {
            (
                BindingRole::Triggers {
                    after_ready,
                    ready_seen,
                    ..
                },
                WatchEvent::Ready,
            ) => {
                if gate.arm() {
                    debug!(watch = %watch, "gate armed");
                }
                let first_ready = !std::mem::replace(ready_seen, true);
                info!(watch = %watch, "watch is ready");

                if let (true, Some(template)) = (first_ready, after_ready.as_ref()) {
                    debug!(watch = %watch, "executing 'afterReady' command");
                    let root = template.watch_root().to_string_lossy().into_owned();
                    let command = template.digest(NO_CHANGE_KIND, &root, None);
                    execute(&mut self.runner, watch, command, true);
                }
            }
            (BindingRole::Triggers { rules, .. }, WatchEvent::Changed { kind, path }) => {
                let path = path.replace('\\', "/");
                on_change(
                    &mut self.runner,
                    &self.activity,
                    gate,
                    watch,
                    rules,
                    kind,
                    &path,
                );
            }
            (BindingRole::Triggers { rules, .. }, WatchEvent::Error { message }) => {
                warn!(watch = %watch, error = %message, "watcher error");
                on_change(
                    &mut self.runner,
                    &self.activity,
                    gate,
                    watch,
                    rules,
                    ChangeKind::Error,
                    "",
                );
            }
            (BindingRole::AutoCreateDir { target }, WatchEvent::Changed { kind, path }) => {
                if kind != ChangeKind::AddDir {
                    return;
                }
                if !gate.is_armed() {
                    debug!(watch = %watch, path = %path, "not ready yet; ignoring addDir for auto folder creation");
                    return;
                }
                let path = path.replace('\\', "/");
                let folder = target.digest(ChangeKind::AddDir.as_str(), &path, None);
                match self.dirs.create_dir_all(Path::new(&folder)) {
                    Ok(()) => {
                        debug!(watch = %watch, folder = %folder, "created folder");
                        self.activity.report(ChangeKind::AddDir);
                    }
                    Err(err) => error!(
                        watch = %watch,
                        path = %path,
                        folder = %folder,
                        error = %err,
                        "could not create target folder"
                    ),
                }
            }
            (BindingRole::AutoCreateDir { .. }, WatchEvent::Ready) => {
                debug!(watch = %watch, "auto folder creation watcher is ready");
            }
            (BindingRole::AutoCreateDir { .. }, WatchEvent::Error { message }) => {
                warn!(watch = %watch, error = %message, "auto folder creation watcher error");
            }
        }
    }
}

/// Run every rule that fires on `kind`, once the gate is armed.
fn on_change<R: CommandRunner>(
    runner: &mut R,
    activity: &ActivityReporter,
    gate: &ExecutionGate,
    watch: &str,
    rules: &[RuleBinding],
    kind: ChangeKind,
    path: &str,
) {
    let mut matching = rules.iter().filter(|binding| binding.rule.fires_on(kind)).peekable();
    if matching.peek().is_none() {
        return;
    }

    if !gate.is_armed() {
        debug!(
            watch = %watch,
            kind = %kind,
            path = %path,
            "triggered for execution but not ready yet; ignoring event"
        );
        return;
    }

    debug!(watch = %watch, kind = %kind, path = %path, "digesting commands");
    for binding in matching {
        for command in binding.template.digest_all(kind.as_str(), path) {
            execute(runner, watch, command, binding.rule.show_stdout);
        }
    }

    activity.report(kind);
}

/// Hand a digested command to the runner; failures are logged, never fatal.
fn execute<R: CommandRunner>(runner: &mut R, watch: &str, command: String, show_stdout: bool) {
    let request = CommandRequest {
        watch: watch.to_string(),
        command,
        show_stdout,
    };
    let command = request.command.clone();
    match runner.execute(request) {
        Ok(pid) => debug!(watch = %watch, pid, cmd = %command, "spawned command"),
        Err(err) => error!(watch = %watch, cmd = %command, error = %err, "error executing shell command"),
    }
}
