//! View Composer - Roster dimensions joined with daily stat deltas
//!
//! Every dimension row survives the join, with null stat fields when the
//! entity has no deltas yet. When both sides carry a name, the delta side's
//! name is used.

pub mod compose;
pub mod dimension;
pub mod error;

pub use compose::{compose, CombinedViewRow};
pub use dimension::{DimensionRow, DimensionTable};
pub use error::{Result, ViewError};
