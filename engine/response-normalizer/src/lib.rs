//! Response Normalizer - Recovers canonical records from upstream stat responses
//!
//! The fantasy stats API nests the same logical record in different shapes
//! depending on the endpoint and the season: lists of single-key maps, maps
//! keyed `"0".."N-1"` next to a `count` field, single-element wrapper lists,
//! and fields sitting at inconsistent depths. Nothing in this crate relies on
//! positional paths. Every extractor is built from a few pure tree searches
//! over [`RawNode`].

pub mod extract;
pub mod node;
pub mod search;
pub mod types;

pub use extract::{
    count_entries, extract_current_date, extract_entities, extract_standings, extract_stat_sheet,
};
pub use node::{display_name, RawNode, Scalar};
pub use search::{
    as_list, find_all, find_first, indexed_collection, merge_fragments, merge_node,
    unwrap_singleton,
};
pub use types::{CanonicalRecord, EntityType, Fields, StandingsRow, StatPair, StatSheet};
