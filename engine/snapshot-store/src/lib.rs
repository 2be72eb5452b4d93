//! # Snapshot Store
//!
//! Immutable per-date observation sets for the season stat ledger.
//!
//! ## Architecture
//!
//! - **SnapshotBackend**: Abstract trait for storage backends
//! - **LocalSnapshotStore**: One JSON file per date, written via temp file + rename
//! - **InMemorySnapshotStore**: Backend for tests
//! - **plan_fetch**: Which dates still need fetching
//!
//! A date moves `NotFetched -> FetchedNonEmpty` (final, never refetched) or
//! `NotFetched -> FetchedEmpty`, and an empty snapshot is planned again on the
//! next run.

pub mod backend;
pub mod config;
pub mod error;
pub mod local;
pub mod plan;
pub mod snapshot;

pub use backend::{InMemorySnapshotStore, SnapshotBackend};
pub use config::SnapshotStoreConfig;
pub use error::{Result, SnapshotError};
pub use local::{create_local_store, write_json_atomic, LocalSnapshotStore};
pub use plan::{plan_fetch, DateRange, SnapshotIndex};
pub use snapshot::{parse_cumulative, Snapshot, SnapshotStatus, StatObservation};

pub use chrono::NaiveDate;
