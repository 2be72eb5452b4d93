//! Configuration for the snapshot store

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration for the snapshot store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotStoreConfig {
    /// Base directory for all pipeline files
    pub data_dir: PathBuf,
}

impl Default for SnapshotStoreConfig {
    fn default() -> Self {
        Self { data_dir: PathBuf::from("./data") }
    }
}

impl SnapshotStoreConfig {
    /// Create a new configuration with custom data directory
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self { data_dir: data_dir.into() }
    }

    /// Directory holding one `<date>.json` file per snapshot
    pub fn snapshots_dir(&self) -> PathBuf {
        self.data_dir.join("snapshots")
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.data_dir.as_os_str().is_empty() {
            return Err("data_dir must not be empty".to_string());
        }
        Ok(())
    }
}
