// src/config/loader.rs

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::model::{Configuration, RawConfigFile};
use crate::config::validate::validate_config;
use crate::errors::{IncbuildError, Result};
use crate::watch::path_utils::join_normalized;

/// Load a configuration file and resolve its base root.
///
/// Files ending in `.toml` are read as TOML, everything else as JSON. This
/// only performs deserialization; use [`load_and_validate`] for semantic
/// checks.
pub fn load_from_path(path: impl AsRef<Path>) -> Result<Configuration> {
    let path = path.as_ref();
    ensure_is_file(path)?;

    let contents = fs::read_to_string(path)?;
    let raw: RawConfigFile = if is_toml(path) {
        toml::from_str(&contents)?
    } else {
        serde_json::from_str(&contents)?
    };

    let source = absolute(path)?;
    let config_dir = source
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let base_root = resolve_base_root(&config_dir, &raw.base_root);

    debug!(config = ?source, base_root = ?base_root, "loaded configuration");

    Ok(Configuration {
        source,
        base_root,
        watches: raw.watches,
    })
}

/// Load a configuration file from path and run validation.
///
/// This is the recommended entry point for the rest of the application.
pub fn load_and_validate(path: impl AsRef<Path>) -> Result<Configuration> {
    let config = load_from_path(&path)?;
    validate_config(&config)?;
    Ok(config)
}

fn ensure_is_file(path: &Path) -> Result<()> {
    let meta = fs::metadata(path).map_err(|_| IncbuildError::ConfigNotFound(path.to_path_buf()))?;
    if !meta.is_file() {
        return Err(IncbuildError::ConfigError(format!(
            "given path {:?} is not a file",
            path
        )));
    }
    Ok(())
}

fn is_toml(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"))
}

fn absolute(path: &Path) -> Result<PathBuf> {
    Ok(path
        .canonicalize()
        .or_else(|_| std::path::absolute(path))?)
}

/// The base root is relative to the folder of the config file. It is
/// canonicalized when it exists so templates see a stable absolute path.
fn resolve_base_root(config_dir: &Path, base_root: &str) -> PathBuf {
    let joined = join_normalized(config_dir, base_root);
    joined.canonicalize().unwrap_or(joined)
}
