// src/watch/patterns.rs

use std::fmt;

use globset::{GlobBuilder, GlobSet, GlobSetBuilder};

use crate::errors::Result;

/// Compiled `sources` / `ignored` glob patterns for one subscription.
///
/// Patterns are relative to the subscription root. `*` does not cross `/`;
/// use `**` for that. A path is also excluded when one of its parent
/// folders matches an ignore pattern, so `node_modules` hides the whole tree.
#[derive(Clone)]
pub struct WatchPatterns {
    label: String,
    watch_set: GlobSet,
    exclude_set: Option<GlobSet>,
}

impl fmt::Debug for WatchPatterns {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WatchPatterns")
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

impl WatchPatterns {
    pub fn new(label: impl Into<String>, sources: &[String], ignored: &[String]) -> Result<Self> {
        let watch_set = build_globset(sources)?;
        let exclude_set = if ignored.is_empty() {
            None
        } else {
            Some(build_globset(ignored)?)
        };

        Ok(Self {
            label: label.into(),
            watch_set,
            exclude_set,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Returns true if an entry at `rel_path` (relative to the root, forward
    /// slashes) is of interest.
    pub fn matches(&self, rel_path: &str) -> bool {
        if !self.watch_set.is_match(rel_path) {
            return false;
        }
        !self.is_excluded(rel_path)
    }

    /// Returns true if `rel_path` or any of its parent folders is ignored.
    pub fn is_excluded(&self, rel_path: &str) -> bool {
        let Some(exclude) = &self.exclude_set else {
            return false;
        };
        if exclude.is_match(rel_path) {
            return true;
        }
        rel_path
            .match_indices('/')
            .any(|(idx, _)| exclude.is_match(&rel_path[..idx]))
    }
}

/// Build a GlobSet from simple string patterns.
fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pat in patterns {
        let glob = GlobBuilder::new(pat).literal_separator(true).build()?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}
