// src/template.rs

//! Command template substitution.
//!
//! A template is a shell command (or, for auto-created folders, a path) with
//! `:token:` markers that are replaced by values derived from the changed
//! path:
//!
//! | token                | value                                        |
//! |----------------------|----------------------------------------------|
//! | `:baseRoot:`         | resolved base root                           |
//! | `:watchedRoot:`      | absolute watch root                          |
//! | `:changedAbsPath:`   | watch root joined with the changed path      |
//! | `:changedRelPath:`   | changed path, relative to the watch root     |
//! | `:changedFile:`      | file name of the changed path                |
//! | `:changedRelFolder:` | folder of the changed path (`.` at the root) |
//! | `:changedAbsFolder:` | folder of the absolute changed path          |
//! | `:changeType:`       | change kind (`add`, `change`, ...)           |
//!
//! After substitution every `\` becomes `/`.

use std::path::{Path, PathBuf};

use crate::watch::path_utils::{join_normalized, to_slash};

pub const BASE_ROOT: &str = ":baseRoot:";
pub const WATCHED_ROOT: &str = ":watchedRoot:";
pub const CHANGED_ABS_PATH: &str = ":changedAbsPath:";
pub const CHANGED_REL_PATH: &str = ":changedRelPath:";
pub const CHANGED_FILE: &str = ":changedFile:";
pub const CHANGED_REL_FOLDER: &str = ":changedRelFolder:";
pub const CHANGED_ABS_FOLDER: &str = ":changedAbsFolder:";
pub const CHANGE_TYPE: &str = ":changeType:";

/// Change kind substituted when a command is not tied to a changed path
/// (the `execAfterReady` command).
pub const NO_CHANGE_KIND: &str = "N/A";

/// Immutable set of command templates bound to one watch's roots.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandTemplate {
    base_root: String,
    watch_root: PathBuf,
    templates: Vec<String>,
}

impl CommandTemplate {
    /// `watch_root` is the absolute root of the watch (base root already
    /// joined in).
    pub fn new(base_root: &Path, watch_root: &Path, templates: Vec<String>) -> Self {
        Self {
            base_root: base_root.to_string_lossy().into_owned(),
            watch_root: watch_root.to_path_buf(),
            templates,
        }
    }

    pub fn single(base_root: &Path, watch_root: &Path, template: impl Into<String>) -> Self {
        Self::new(base_root, watch_root, vec![template.into()])
    }

    pub fn watch_root(&self) -> &Path {
        &self.watch_root
    }

    /// Substitute the tokens of one template.
    ///
    /// Without `template_override` the first configured template is used.
    pub fn digest(
        &self,
        change_kind: &str,
        changed_rel_path: &str,
        template_override: Option<&str>,
    ) -> String {
        let template = template_override
            .or_else(|| self.templates.first().map(String::as_str))
            .unwrap_or_default();

        let abs_path = join_normalized(&self.watch_root, changed_rel_path);
        let rel = Path::new(changed_rel_path);

        template
            .replace(BASE_ROOT, &self.base_root)
            .replace(WATCHED_ROOT, &self.watch_root.to_string_lossy())
            .replace(CHANGED_ABS_PATH, &abs_path.to_string_lossy())
            .replace(CHANGED_REL_PATH, changed_rel_path)
            .replace(CHANGED_FILE, &file_name(rel))
            .replace(CHANGED_REL_FOLDER, &folder(rel))
            .replace(CHANGED_ABS_FOLDER, &folder(&abs_path))
            .replace(CHANGE_TYPE, change_kind)
            .replace('\\', "/")
    }

    /// Substitute every configured template, in configured order.
    pub fn digest_all(&self, change_kind: &str, changed_rel_path: &str) -> Vec<String> {
        self.templates
            .iter()
            .map(|t| self.digest(change_kind, changed_rel_path, Some(t)))
            .collect()
    }
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn folder(path: &Path) -> String {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => to_slash(parent),
        Some(_) => ".".to_string(),
        // Root paths are their own folder.
        None if path.has_root() => to_slash(path),
        None => ".".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EVERY_TOKEN: &str = ":baseRoot:|:watchedRoot:|:changedAbsPath:|:changedRelPath:|:changedFile:|:changedRelFolder:|:changedAbsFolder:|:changeType:";

    fn template(templates: &[&str]) -> CommandTemplate {
        CommandTemplate::new(
            Path::new("/base"),
            Path::new("/base/w"),
            templates.iter().map(|t| t.to_string()).collect(),
        )
    }

    #[test]
    fn every_token_is_substituted() {
        let digested = template(&[EVERY_TOKEN]).digest("change", "a/b.txt", None);

        assert_eq!(
            digested,
            "/base|/base/w|/base/w/a/b.txt|a/b.txt|b.txt|a|/base/w/a|change"
        );
        assert!(!digested.contains(":changed"));
        assert!(!digested.contains('\\'));
    }

    #[test]
    fn repeated_tokens_are_all_replaced() {
        let digested =
            template(&["cp :changedFile: out/:changedFile:.bak"]).digest("add", "x/y.ts", None);
        assert_eq!(digested, "cp y.ts out/y.ts.bak");
    }

    #[test]
    fn backslashes_are_normalised_to_forward_slashes() {
        let digested =
            template(&["copy :changedRelPath: C:\\out\\:changedFile:"]).digest("add", "a\\b.txt", None);
        assert!(!digested.contains('\\'));
        assert!(digested.starts_with("copy a/b.txt C:/out/"));
    }

    #[test]
    fn file_at_watch_root_has_dot_folder() {
        let digested = template(&[":changedRelFolder:|:changedAbsFolder:|:changedFile:"])
            .digest("add", "top.txt", None);
        assert_eq!(digested, ".|/base/w|top.txt");
    }

    #[test]
    fn empty_changed_path_points_at_the_watch_root() {
        let digested = template(&["run :changedAbsPath: :changeType:"]).digest(NO_CHANGE_KIND, "", None);
        assert_eq!(digested, "run /base/w N/A");
    }

    #[test]
    fn override_wins_over_first_template() {
        let t = template(&["first :changedFile:", "second"]);
        assert_eq!(t.digest("add", "a.ts", None), "first a.ts");
        assert_eq!(t.digest("add", "a.ts", Some("other :changeType:")), "other add");
    }

    #[test]
    fn digest_all_preserves_configured_order() {
        let t = template(&["tsc :changedRelPath:", "cp :changedFile: dist/"]);
        assert_eq!(
            t.digest_all("change", "src/a.ts"),
            vec!["tsc src/a.ts".to_string(), "cp a.ts dist/".to_string()]
        );
    }

    #[test]
    fn digest_is_stateless_across_invocations() {
        let t = template(&[":changedRelPath:"]);
        assert_eq!(t.digest("add", "one", None), "one");
        assert_eq!(t.digest("add", "two", None), "two");
    }
}
