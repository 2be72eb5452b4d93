//! Delta Engine - Daily increments from cumulative totals
//!
//! The upstream reports season-to-date totals. Differencing consecutive
//! observed dates of each (entity, stat) series recovers what happened on
//! each day. The whole history is recomputed on every run.

pub mod delta;

pub use delta::{compute_deltas, compute_from_snapshots, DeltaOutput, DeltaRecord, DeltaSummary};
