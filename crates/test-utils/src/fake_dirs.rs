use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use incbuild::errors::Result;
use incbuild::fs::DirCreator;

/// Records requested folders instead of touching the filesystem.
#[derive(Debug, Clone, Default)]
pub struct RecordingDirCreator {
    created: Arc<Mutex<Vec<PathBuf>>>,
}

impl RecordingDirCreator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn created(&self) -> Vec<PathBuf> {
        self.created.lock().unwrap().clone()
    }
}

impl DirCreator for RecordingDirCreator {
    fn create_dir_all(&self, path: &Path) -> Result<()> {
        self.created.lock().unwrap().push(path.to_path_buf());
        Ok(())
    }
}
