//! Storage configuration.

use std::path::PathBuf;

/// Directory name used under the platform temp dir when nothing is configured.
const DEFAULT_DIR_NAME: &str = "depot-data";

/// Where the local storage service keeps its files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorageConfig {
    pub root_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root_dir: std::env::temp_dir().join(DEFAULT_DIR_NAME),
        }
    }
}

impl StorageConfig {
    /// Read `DEPOT_DATA_DIR`, falling back to the default directory.
    pub fn from_env() -> Self {
        match std::env::var_os("DEPOT_DATA_DIR") {
            Some(dir) if !dir.is_empty() => Self {
                root_dir: PathBuf::from(dir),
            },
            _ => Self::default(),
        }
    }

    pub fn with_root_dir(mut self, root_dir: impl Into<PathBuf>) -> Self {
        self.root_dir = root_dir.into();
        self
    }
}
