//! Entity Registry - One stable key per real-world player or team
//!
//! The upstream identifies the same player with a native key (`466.p.4912`),
//! a bare numeric id (`4912`) or a legacy editorial key (`nba.p.4912`), and
//! different endpoints send different subsets. The registry keeps a
//! multi-key index so every form converges on a single canonical key.

pub mod keys;
pub mod registry;
pub mod types;

pub use keys::{CandidateKeys, KeyKind};
pub use registry::EntityRegistry;
pub use types::{Entity, RegistryError, RegistryFile, Result};
