#![allow(dead_code)]

use incbuild::config::{TriggerRule, WatchDefinition};
use incbuild::watch::ChangeKind;

/// Builder for `WatchDefinition` to simplify test setup.
pub struct WatchDefinitionBuilder {
    watch: WatchDefinition,
}

impl WatchDefinitionBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            watch: WatchDefinition {
                name: name.to_string(),
                watch_root: ".".to_string(),
                sources: vec!["**".to_string()],
                ignored: vec![],
                auto_create_dir: None,
                exec_after_ready: None,
                execute_before_ready: false,
                triggered_commands: vec![],
            },
        }
    }

    pub fn root(mut self, root: &str) -> Self {
        self.watch.watch_root = root.to_string();
        self
    }

    /// Replace the default `**` source.
    pub fn sources(mut self, patterns: &[&str]) -> Self {
        self.watch.sources = patterns.iter().map(|p| p.to_string()).collect();
        self
    }

    pub fn ignore(mut self, pattern: &str) -> Self {
        self.watch.ignored.push(pattern.to_string());
        self
    }

    pub fn auto_create_dir(mut self, target: &str) -> Self {
        self.watch.auto_create_dir = Some(target.to_string());
        self
    }

    pub fn after_ready(mut self, cmd: &str) -> Self {
        self.watch.exec_after_ready = Some(cmd.to_string());
        self
    }

    pub fn execute_before_ready(mut self) -> Self {
        self.watch.execute_before_ready = true;
        self
    }

    pub fn rule(mut self, rule: TriggerRule) -> Self {
        self.watch.triggered_commands.push(rule);
        self
    }

    pub fn build(self) -> WatchDefinition {
        self.watch
    }
}

/// Builder for `TriggerRule`.
pub struct TriggerRuleBuilder {
    rule: TriggerRule,
}

impl TriggerRuleBuilder {
    pub fn on(kinds: &[ChangeKind]) -> Self {
        Self {
            rule: TriggerRule {
                triggering_events: kinds.to_vec(),
                commands: vec![],
                show_stdout: false,
            },
        }
    }

    pub fn command(mut self, cmd: &str) -> Self {
        self.rule.commands.push(cmd.to_string());
        self
    }

    pub fn show_stdout(mut self) -> Self {
        self.rule.show_stdout = true;
        self
    }

    pub fn build(self) -> TriggerRule {
        self.rule
    }
}
