// src/engine/selection.rs

//! Decide which configured watches get activated.

use std::collections::HashMap;

use tracing::{debug, warn};

use crate::config::WatchDefinition;
use crate::errors::{IncbuildError, Result};

/// Outcome of matching the configured watches against the requested names.
#[derive(Debug)]
pub struct WatchSelection<'a> {
    /// Watches to activate, in configuration order.
    pub active: Vec<&'a WatchDefinition>,
    /// Names declared more than once; none of their watches is activated.
    pub conflicting: Vec<String>,
    /// Requested names that no watch carries.
    pub unknown: Vec<String>,
}

/// Pick the watches to activate.
///
/// - An empty `requested` list selects every watch.
/// - A name used by more than one watch is ambiguous: all of those watches
///   are skipped with a warning, the rest are unaffected.
/// - Fails when nothing is left to activate.
pub fn select_watches<'a>(
    watches: &'a [WatchDefinition],
    requested: &[String],
) -> Result<WatchSelection<'a>> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for watch in watches {
        *counts.entry(watch.name.as_str()).or_default() += 1;
    }

    let mut conflicting: Vec<String> = counts
        .iter()
        .filter(|(_, n)| **n > 1)
        .map(|(name, _)| name.to_string())
        .collect();
    conflicting.sort();

    for name in &conflicting {
        warn!(watch = %name, "watch is defined more than once; conflicting watches are not activated");
    }

    let unknown: Vec<String> = requested
        .iter()
        .filter(|name| !counts.contains_key(name.as_str()))
        .cloned()
        .collect();
    for name in &unknown {
        warn!(watch = %name, "requested watch is not defined");
    }

    if requested.is_empty() {
        debug!("no specific watches requested; using all watches");
    }

    let active: Vec<&WatchDefinition> = watches
        .iter()
        .filter(|w| counts.get(w.name.as_str()).copied() == Some(1))
        .filter(|w| requested.is_empty() || requested.iter().any(|r| *r == w.name))
        .collect();

    if active.is_empty() {
        let wanted = if requested.is_empty() {
            "any watch".to_string()
        } else {
            requested.join(", ")
        };
        return Err(IncbuildError::ConfigError(format!(
            "none of the watches can be activated (requested: {wanted}; conflicting: [{}])",
            conflicting.join(", ")
        )));
    }

    Ok(WatchSelection {
        active,
        conflicting,
        unknown,
    })
}
