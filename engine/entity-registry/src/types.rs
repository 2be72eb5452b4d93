use crate::keys::KeyKind;
use response_normalizer::EntityType;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

/// Result type alias for registry operations
pub type Result<T> = std::result::Result<T, RegistryError>;

/// A player or team with its one canonical key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    /// Key every pipeline stage uses for this entity
    pub canonical_key: String,

    /// Which identifier form the canonical key came from
    pub key_kind: KeyKind,

    /// Player or team
    pub entity_type: EntityType,

    /// Most recent name seen for the entity
    pub display_name: Option<String>,

    /// Descriptive attributes (position, team abbreviation, status)
    pub attributes: BTreeMap<String, String>,

    /// Every key known to resolve to this entity, canonical key included
    pub aliases: BTreeSet<String>,

    /// Registration order, used to break ties when two entities merge
    pub registered_seq: u64,
}

impl Entity {
    pub fn new(
        canonical_key: String,
        key_kind: KeyKind,
        entity_type: EntityType,
        registered_seq: u64,
    ) -> Self {
        let aliases = BTreeSet::from([canonical_key.clone()]);
        Self {
            canonical_key,
            key_kind,
            entity_type,
            display_name: None,
            attributes: BTreeMap::new(),
            aliases,
            registered_seq,
        }
    }

    /// Display name, or "Unknown" when no response has carried one yet
    pub fn name_or_unknown(&self) -> &str {
        self.display_name.as_deref().unwrap_or("Unknown")
    }
}

/// On-disk form of the registry
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistryFile {
    pub version: u32,
    pub next_seq: u64,
    pub entities: Vec<Entity>,
}

/// Errors that can occur while resolving or loading entities
#[derive(Error, Debug)]
pub enum RegistryError {
    /// The record carried no usable identifier; callers drop it
    #[error("No usable identifier for {entity_type} '{}'", .display_name.as_deref().unwrap_or("Unknown"))]
    Unresolved { entity_type: EntityType, display_name: Option<String> },

    /// Lookup by canonical key failed
    #[error("Entity not found: {0}")]
    NotFound(String),

    /// Registry file uses a layout this build does not read
    #[error("Unsupported registry file version {0}")]
    UnsupportedVersion(u32),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
