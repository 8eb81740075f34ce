// src/config/model.rs

use std::path::PathBuf;

use serde::{Deserialize, Deserializer, Serialize};

use crate::watch::ChangeKind;

/// Top-level configuration as read from a watch-definitions file.
///
/// ```json
/// {
///   "baseRoot": "..",
///   "watches": [
///     {
///       "name": "ts",
///       "watchRoot": "src",
///       "sources": ["**/*.ts"],
///       "triggeredCommands": [
///         { "triggeringEvents": ["add", "change"], "commands": "tsc :changedAbsPath:" }
///       ]
///     }
///   ]
/// }
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RawConfigFile {
    /// Base folder, relative to the directory holding the config file.
    #[serde(default = "default_root")]
    pub base_root: String,

    #[serde(default)]
    pub watches: Vec<WatchDefinition>,
}

fn default_root() -> String {
    ".".to_string()
}

/// One configured watch: a root folder plus the rules fired by changes in it.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WatchDefinition {
    pub name: String,

    /// Folder to watch, relative to the base root.
    #[serde(default = "default_root")]
    pub watch_root: String,

    /// Glob patterns (relative to the watch root) of the entries to watch.
    #[serde(default)]
    pub sources: Vec<String>,

    /// Glob patterns excluded from `sources`.
    #[serde(default)]
    pub ignored: Vec<String>,

    /// Template of a folder path to create whenever a folder is added under
    /// the watch root.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auto_create_dir: Option<String>,

    /// Command run once the initial scan of the watch root completes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exec_after_ready: Option<String>,

    /// Act on events seen during the initial scan as well.
    #[serde(default)]
    pub execute_before_ready: bool,

    #[serde(default)]
    pub triggered_commands: Vec<TriggerRule>,
}

/// Commands run for a set of change kinds.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TriggerRule {
    pub triggering_events: Vec<ChangeKind>,

    /// Either a single command template or a list run in order.
    #[serde(deserialize_with = "one_or_many")]
    pub commands: Vec<String>,

    #[serde(default)]
    pub show_stdout: bool,
}

impl TriggerRule {
    pub fn fires_on(&self, kind: ChangeKind) -> bool {
        self.triggering_events.contains(&kind)
    }
}

fn one_or_many<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum OneOrMany {
        One(String),
        Many(Vec<String>),
    }

    Ok(match OneOrMany::deserialize(deserializer)? {
        OneOrMany::One(cmd) => vec![cmd],
        OneOrMany::Many(cmds) => cmds,
    })
}

/// Loaded configuration with the base root resolved to an absolute path.
#[derive(Debug, Clone)]
pub struct Configuration {
    /// The file this configuration was read from.
    pub source: PathBuf,
    pub base_root: PathBuf,
    pub watches: Vec<WatchDefinition>,
}

impl Configuration {
    /// All watches carrying the given name (more than one means a conflict).
    pub fn watches_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a WatchDefinition> {
        self.watches.iter().filter(move |w| w.name == name)
    }

    /// Absolute root of a watch.
    pub fn watch_root(&self, watch: &WatchDefinition) -> PathBuf {
        crate::watch::path_utils::join_normalized(&self.base_root, &watch.watch_root)
    }

    /// One human-readable line per watch, used by `--list`.
    pub fn describe_watches(&self) -> Vec<String> {
        self.watches
            .iter()
            .map(|w| {
                let conflict = if self.watches_named(&w.name).count() > 1 {
                    " (conflicting name, will not be activated)"
                } else {
                    ""
                };
                format!(
                    "{} - [{}] on '{}'{}",
                    w.name,
                    w.sources.join(", "),
                    self.watch_root(w).display(),
                    conflict
                )
            })
            .collect()
    }
}
