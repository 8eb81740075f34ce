// src/fs/mod.rs

use std::fmt::Debug;
use std::fs;
use std::path::Path;

use crate::errors::Result;

/// Directory-creation collaborator used by auto-create-dir watches.
pub trait DirCreator: Send + Debug {
    /// Create `path` and every missing parent. Succeeds if it already exists.
    fn create_dir_all(&self, path: &Path) -> Result<()>;
}

/// Implementation that uses `std::fs`.
#[derive(Debug, Clone, Default)]
pub struct RealDirCreator;

impl DirCreator for RealDirCreator {
    fn create_dir_all(&self, path: &Path) -> Result<()> {
        fs::create_dir_all(path)?;
        Ok(())
    }
}
