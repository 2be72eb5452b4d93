//! Snapshot backend trait and in-memory implementation

use crate::error::{Result, SnapshotError};
use crate::plan::SnapshotIndex;
use crate::snapshot::Snapshot;
use chrono::NaiveDate;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Abstract trait for snapshot storage backends
#[async_trait::async_trait]
pub trait SnapshotBackend: Send + Sync {
    /// Prepare the backend for use
    async fn initialize(&mut self) -> Result<()>;

    /// Status of every date with a readable snapshot
    async fn index(&self) -> Result<SnapshotIndex>;

    /// Store a snapshot so that either all of it becomes visible or none does
    ///
    /// Refuses to replace a final snapshot. An empty one is replaced.
    async fn write_snapshot(&self, snapshot: &Snapshot) -> Result<()>;

    /// Load the snapshot for a date, `None` when missing or unreadable
    async fn load_snapshot(&self, date: NaiveDate) -> Result<Option<Snapshot>>;

    /// Load every final snapshot, oldest first
    async fn load_all(&self) -> Result<Vec<Snapshot>>;
}

/// In-memory backend for tests
#[derive(Clone, Default)]
pub struct InMemorySnapshotStore {
    snapshots: Arc<Mutex<BTreeMap<NaiveDate, Snapshot>>>,
}

impl InMemorySnapshotStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored snapshots, empty ones included
    pub async fn len(&self) -> usize {
        self.snapshots.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.snapshots.lock().await.is_empty()
    }
}

#[async_trait::async_trait]
impl SnapshotBackend for InMemorySnapshotStore {
    async fn initialize(&mut self) -> Result<()> {
        Ok(())
    }

    async fn index(&self) -> Result<SnapshotIndex> {
        let snapshots = self.snapshots.lock().await;
        Ok(snapshots.iter().map(|(date, snapshot)| (*date, snapshot.status())).collect())
    }

    async fn write_snapshot(&self, snapshot: &Snapshot) -> Result<()> {
        let mut snapshots = self.snapshots.lock().await;
        if snapshots.get(&snapshot.date).is_some_and(Snapshot::is_final) {
            return Err(SnapshotError::AlreadyFinal(snapshot.date));
        }
        snapshots.insert(snapshot.date, snapshot.clone());
        Ok(())
    }

    async fn load_snapshot(&self, date: NaiveDate) -> Result<Option<Snapshot>> {
        Ok(self.snapshots.lock().await.get(&date).cloned())
    }

    async fn load_all(&self) -> Result<Vec<Snapshot>> {
        let snapshots = self.snapshots.lock().await;
        Ok(snapshots.values().filter(|snapshot| snapshot.is_final()).cloned().collect())
    }
}
