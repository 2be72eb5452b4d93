//! Snapshot data types

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// One stat value for one entity as of one date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatObservation {
    /// Canonical entity key from the registry
    pub entity_key: String,

    /// Upstream stat identifier
    pub stat_id: String,

    /// Date the value was observed for
    pub snapshot_date: NaiveDate,

    /// Season-to-date total, `None` when `raw_value` is not numeric
    pub cumulative_value: Option<f64>,

    /// Value exactly as the upstream reported it
    pub raw_value: Option<String>,

    /// Name carried by the stat response
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,

    /// Coverage type reported by the upstream (`date`, `week`, `season`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coverage: Option<String>,
}

impl StatObservation {
    pub fn new(
        entity_key: impl Into<String>,
        stat_id: impl Into<String>,
        snapshot_date: NaiveDate,
        raw_value: Option<String>,
    ) -> Self {
        let cumulative_value = raw_value.as_deref().and_then(parse_cumulative);
        Self {
            entity_key: entity_key.into(),
            stat_id: stat_id.into(),
            snapshot_date,
            cumulative_value,
            raw_value,
            display_name: None,
            coverage: None,
        }
    }

    pub fn with_display_name(mut self, display_name: Option<String>) -> Self {
        self.display_name = display_name;
        self
    }

    pub fn with_coverage(mut self, coverage: Option<String>) -> Self {
        self.coverage = coverage;
        self
    }
}

/// Parse an upstream value as a cumulative number
///
/// Integers and decimals are accepted. Placeholders such as `-`, blanks and
/// ratio strings like `45/100` are not numbers.
pub fn parse_cumulative(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() || trimmed == "-" {
        return None;
    }
    trimmed.parse::<f64>().ok().filter(|value| value.is_finite())
}

/// Fetch state of one date
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SnapshotStatus {
    /// No snapshot on record (or the file was unreadable)
    NotFetched,

    /// Written with zero observations; retried on the next run
    FetchedEmpty,

    /// Written with at least one observation; never fetched again
    FetchedNonEmpty,
}

impl SnapshotStatus {
    pub fn is_final(&self) -> bool {
        matches!(self, SnapshotStatus::FetchedNonEmpty)
    }
}

/// Every observation collected for one date
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Date the snapshot covers
    pub date: NaiveDate,

    /// When the fetch finished
    pub fetched_at: DateTime<Utc>,

    /// Entities a fetch was attempted for
    pub entities_attempted: usize,

    /// Entities whose fetch failed and are missing from the snapshot
    pub entities_failed: usize,

    /// Observations, at most one per (entity_key, stat_id)
    pub observations: Vec<StatObservation>,
}

impl Snapshot {
    /// Create an empty snapshot for a date
    pub fn new(date: NaiveDate) -> Self {
        Self {
            date,
            fetched_at: Utc::now(),
            entities_attempted: 0,
            entities_failed: 0,
            observations: Vec::new(),
        }
    }

    /// Build a snapshot, dropping duplicate (entity_key, stat_id) observations
    ///
    /// The first occurrence wins. Returns the snapshot and the number of
    /// duplicates dropped.
    pub fn from_observations(date: NaiveDate, observations: Vec<StatObservation>) -> (Self, usize) {
        let mut seen: HashSet<(String, String)> = HashSet::with_capacity(observations.len());
        let mut kept = Vec::with_capacity(observations.len());
        let mut dropped = 0;

        for observation in observations {
            if seen.insert((observation.entity_key.clone(), observation.stat_id.clone())) {
                kept.push(observation);
            } else {
                dropped += 1;
            }
        }

        let mut snapshot = Self::new(date);
        snapshot.observations = kept;
        (snapshot, dropped)
    }

    /// A snapshot with at least one observation is final
    pub fn is_final(&self) -> bool {
        !self.observations.is_empty()
    }

    pub fn status(&self) -> SnapshotStatus {
        if self.is_final() {
            SnapshotStatus::FetchedNonEmpty
        } else {
            SnapshotStatus::FetchedEmpty
        }
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }
}
