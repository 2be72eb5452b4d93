//! Local file-based snapshot backend

use crate::backend::SnapshotBackend;
use crate::config::SnapshotStoreConfig;
use crate::error::{Result, SnapshotError};
use crate::plan::SnapshotIndex;
use crate::snapshot::Snapshot;
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// Snapshots as `<data_dir>/snapshots/<YYYY-MM-DD>.json`
pub struct LocalSnapshotStore {
    config: SnapshotStoreConfig,
    initialized: bool,
}

impl LocalSnapshotStore {
    /// Create a new local snapshot store
    pub fn new(config: SnapshotStoreConfig) -> Result<Self> {
        config.validate().map_err(SnapshotError::config)?;
        Ok(Self { config, initialized: false })
    }

    pub fn config(&self) -> &SnapshotStoreConfig {
        &self.config
    }

    fn snapshot_path(&self, date: NaiveDate) -> PathBuf {
        self.config.snapshots_dir().join(format!("{}.json", date.format(DATE_FORMAT)))
    }

    fn ensure_initialized(&self) -> Result<()> {
        if !self.initialized {
            return Err(SnapshotError::invalid_operation("Snapshot store not initialized"));
        }
        Ok(())
    }

    /// Read one snapshot file; unreadable or corrupt files count as missing
    async fn read_snapshot_file(path: &Path) -> Option<Snapshot> {
        let contents = match tokio::fs::read_to_string(path).await {
            Ok(contents) => contents,
            Err(e) => {
                warn!("Could not read snapshot {:?}, treating as not fetched: {}", path, e);
                return None;
            }
        };
        match serde_json::from_str(&contents) {
            Ok(snapshot) => Some(snapshot),
            Err(e) => {
                warn!("Corrupt snapshot {:?}, treating as not fetched: {}", path, e);
                None
            }
        }
    }

    /// Every readable snapshot in the directory, keyed by date
    async fn read_all(&self) -> Result<BTreeMap<NaiveDate, Snapshot>> {
        self.ensure_initialized()?;

        let mut snapshots = BTreeMap::new();
        let mut entries = tokio::fs::read_dir(self.config.snapshots_dir()).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) != Some("json") {
                continue;
            }
            let Some(date) = path
                .file_stem()
                .and_then(|stem| stem.to_str())
                .and_then(|stem| NaiveDate::parse_from_str(stem, DATE_FORMAT).ok())
            else {
                debug!("Ignoring non-snapshot file {:?}", path);
                continue;
            };

            if let Some(snapshot) = Self::read_snapshot_file(&path).await {
                if snapshot.date != date {
                    warn!("Snapshot {:?} holds date {}, skipping", path, snapshot.date);
                    continue;
                }
                snapshots.insert(date, snapshot);
            }
        }

        Ok(snapshots)
    }
}

/// Create a local snapshot store rooted at `data_dir`
pub fn create_local_store(data_dir: impl Into<PathBuf>) -> Result<LocalSnapshotStore> {
    LocalSnapshotStore::new(SnapshotStoreConfig::new(data_dir))
}

#[async_trait::async_trait]
impl SnapshotBackend for LocalSnapshotStore {
    async fn initialize(&mut self) -> Result<()> {
        if self.initialized {
            return Ok(());
        }

        tokio::fs::create_dir_all(self.config.snapshots_dir()).await?;
        self.initialized = true;

        info!("Local snapshot store initialized at: {:?}", self.config.data_dir);
        Ok(())
    }

    async fn index(&self) -> Result<SnapshotIndex> {
        let snapshots = self.read_all().await?;
        Ok(snapshots.iter().map(|(date, snapshot)| (*date, snapshot.status())).collect())
    }

    async fn write_snapshot(&self, snapshot: &Snapshot) -> Result<()> {
        self.ensure_initialized()?;

        let path = self.snapshot_path(snapshot.date);
        if let Some(existing) = Self::read_snapshot_file(&path).await {
            if existing.is_final() {
                return Err(SnapshotError::AlreadyFinal(snapshot.date));
            }
        }

        write_json_atomic(&path, snapshot).await?;
        debug!("Wrote snapshot {} with {} observations", snapshot.date, snapshot.len());
        Ok(())
    }

    async fn load_snapshot(&self, date: NaiveDate) -> Result<Option<Snapshot>> {
        self.ensure_initialized()?;

        let path = self.snapshot_path(date);
        if !tokio::fs::try_exists(&path).await? {
            return Ok(None);
        }
        Ok(Self::read_snapshot_file(&path).await)
    }

    async fn load_all(&self) -> Result<Vec<Snapshot>> {
        let snapshots = self.read_all().await?;
        Ok(snapshots.into_values().filter(Snapshot::is_final).collect())
    }
}

/// Serialize `value` as pretty JSON and move it into place in one step
///
/// The content goes to a sibling `.tmp` file, is synced, then renamed over
/// `path`, so readers see either the old file or the complete new one.
pub async fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let json = serde_json::to_vec_pretty(value)?;
    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    let mut file = tokio::fs::File::create(&tmp_path).await?;
    file.write_all(&json).await?;
    file.sync_all().await?;
    drop(file);

    tokio::fs::rename(&tmp_path, path).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::{SnapshotStatus, StatObservation};
    use tempfile::TempDir;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, d).unwrap()
    }

    fn final_snapshot(date: NaiveDate, value: &str) -> Snapshot {
        Snapshot::from_observations(date, vec![StatObservation::new("p1", "7", date, Some(value.into()))]).0
    }

    async fn store(temp_dir: &TempDir) -> LocalSnapshotStore {
        let mut store = create_local_store(temp_dir.path()).unwrap();
        store.initialize().await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_uninitialized_store_rejects_operations() {
        let temp_dir = TempDir::new().unwrap();
        let store = create_local_store(temp_dir.path()).unwrap();
        assert!(matches!(store.index().await, Err(SnapshotError::InvalidOperation(_))));
    }

    #[tokio::test]
    async fn test_write_and_load_snapshot() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir).await;

        let snapshot = final_snapshot(day(9), "301");
        store.write_snapshot(&snapshot).await.unwrap();

        assert!(temp_dir.path().join("snapshots/2025-01-09.json").exists());
        assert!(!temp_dir.path().join("snapshots/2025-01-09.json.tmp").exists());

        let loaded = store.load_snapshot(day(9)).await.unwrap().unwrap();
        assert_eq!(loaded, snapshot);
        assert_eq!(store.load_snapshot(day(10)).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_final_snapshot_never_overwritten() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir).await;

        store.write_snapshot(&final_snapshot(day(1), "10")).await.unwrap();
        let err = store.write_snapshot(&final_snapshot(day(1), "12")).await.unwrap_err();
        assert!(matches!(err, SnapshotError::AlreadyFinal(_)));

        let loaded = store.load_snapshot(day(1)).await.unwrap().unwrap();
        assert_eq!(loaded.observations[0].cumulative_value, Some(10.0));
    }

    #[tokio::test]
    async fn test_empty_snapshot_replaced_and_indexed() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir).await;

        store.write_snapshot(&Snapshot::new(day(3))).await.unwrap();
        assert_eq!(store.index().await.unwrap().get(&day(3)), Some(&SnapshotStatus::FetchedEmpty));
        assert!(store.load_all().await.unwrap().is_empty());

        store.write_snapshot(&final_snapshot(day(3), "15")).await.unwrap();
        assert_eq!(store.index().await.unwrap().get(&day(3)), Some(&SnapshotStatus::FetchedNonEmpty));
    }

    #[tokio::test]
    async fn test_corrupt_snapshot_treated_as_not_fetched() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir).await;

        let path = temp_dir.path().join("snapshots/2025-01-05.json");
        tokio::fs::write(&path, b"{ not json").await.unwrap();
        tokio::fs::write(temp_dir.path().join("snapshots/notes.txt"), b"hello").await.unwrap();

        let index = store.index().await.unwrap();
        assert!(index.get(&day(5)).is_none());
        assert_eq!(store.load_snapshot(day(5)).await.unwrap(), None);

        // A corrupt file does not block a retry
        store.write_snapshot(&final_snapshot(day(5), "4")).await.unwrap();
        assert_eq!(store.load_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_load_all_ascending() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir).await;

        for d in [4, 1, 2] {
            store.write_snapshot(&final_snapshot(day(d), "1")).await.unwrap();
        }

        let dates: Vec<NaiveDate> = store.load_all().await.unwrap().iter().map(|s| s.date).collect();
        assert_eq!(dates, vec![day(1), day(2), day(4)]);
    }

    #[tokio::test]
    async fn test_write_json_atomic_creates_parents() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("derived/daily_deltas.json");

        write_json_atomic(&path, &vec![1, 2, 3]).await.unwrap();
        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        let values: Vec<i32> = serde_json::from_str(&contents).unwrap();
        assert_eq!(values, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_history_and_index_agree_in_one_pass() {
        let temp_dir = TempDir::new().unwrap();
        let store = store(&temp_dir).await;

        store.write_snapshot(&final_snapshot(day(1), "10")).await.unwrap();
        store.write_snapshot(&Snapshot::new(day(2))).await.unwrap();
        store.write_snapshot(&final_snapshot(day(3), "15")).await.unwrap();
        tokio::fs::write(temp_dir.path().join("snapshots/2025-01-04.json"), b"[").await.unwrap();
        // A file named for one date but holding another is not trusted
        let misplaced = serde_json::to_vec(&final_snapshot(day(9), "1")).unwrap();
        tokio::fs::write(temp_dir.path().join("snapshots/2025-01-05.json"), misplaced).await.unwrap();

        let index = store.index().await.unwrap();
        assert_eq!(index.len(), 3);
        assert_eq!(index.get(&day(2)), Some(&SnapshotStatus::FetchedEmpty));

        let dates: Vec<NaiveDate> = store.load_all().await.unwrap().iter().map(|s| s.date).collect();
        assert_eq!(dates, vec![day(1), day(3)]);
    }
}
