// src/config/validate.rs

use globset::Glob;

use crate::config::model::{Configuration, WatchDefinition};
use crate::errors::{IncbuildError, Result};

/// Run basic semantic validation against a loaded configuration.
///
/// This checks:
/// - there is at least one watch
/// - every watch has a non-empty name
/// - every trigger rule names at least one event and one command
/// - every `sources` / `ignored` glob compiles
///
/// Duplicate watch names are not rejected here; watch selection skips them.
pub fn validate_config(cfg: &Configuration) -> Result<()> {
    ensure_has_watches(cfg)?;
    for watch in &cfg.watches {
        validate_watch(watch)?;
    }
    Ok(())
}

fn ensure_has_watches(cfg: &Configuration) -> Result<()> {
    if cfg.watches.is_empty() {
        return Err(IncbuildError::ConfigError(
            "no watches defined in configuration".to_string(),
        ));
    }
    Ok(())
}

fn validate_watch(watch: &WatchDefinition) -> Result<()> {
    if watch.name.trim().is_empty() {
        return Err(IncbuildError::ConfigError(format!(
            "watch on '{}' is missing the 'name' property",
            watch.watch_root
        )));
    }

    for (idx, rule) in watch.triggered_commands.iter().enumerate() {
        if rule.triggering_events.is_empty() {
            return Err(IncbuildError::ConfigError(format!(
                "watch '{}': triggeredCommands[{}] has no triggeringEvents",
                watch.name, idx
            )));
        }
        if rule.commands.is_empty() || rule.commands.iter().any(|c| c.trim().is_empty()) {
            return Err(IncbuildError::ConfigError(format!(
                "watch '{}': triggeredCommands[{}] has an empty command",
                watch.name, idx
            )));
        }
    }

    if watch.auto_create_dir.as_deref().is_some_and(|t| t.trim().is_empty()) {
        return Err(IncbuildError::ConfigError(format!(
            "watch '{}': autoCreateDir is empty",
            watch.name
        )));
    }

    for pattern in watch.sources.iter().chain(watch.ignored.iter()) {
        Glob::new(pattern).map_err(|e| {
            IncbuildError::ConfigError(format!("watch '{}': {e}", watch.name))
        })?;
    }

    Ok(())
}
