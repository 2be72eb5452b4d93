use crate::keys::{implied_numeric_id, CandidateKeys};
use crate::types::{Entity, RegistryError, RegistryFile, Result};
use response_normalizer::{CanonicalRecord, EntityType};
use std::collections::HashMap;
use std::path::Path;
use tracing::{debug, info, warn};

/// Current layout of the persisted registry file
pub const REGISTRY_FILE_VERSION: u32 = 1;

/// Record fields copied onto an entity as attributes, with the attribute name used
const ATTRIBUTE_FIELDS: [(&str, &str); 4] = [
    ("editorial_team_abbr", "team_abbr"),
    ("editorial_team_full_name", "team_name"),
    ("status", "status"),
    ("position_type", "position_type"),
];

type IndexKey = (EntityType, String);

/// Entity Registry - Maps every known identifier to one canonical key
///
/// Players and teams live in separate key spaces, so a player id `3` and a
/// team id `3` never collide.
pub struct EntityRegistry {
    /// Map from canonical key to entity
    entities: HashMap<IndexKey, Entity>,

    /// Map from any known alias to its canonical key
    aliases: HashMap<IndexKey, String>,

    /// Next registration sequence number
    next_seq: u64,
}

impl EntityRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self { entities: HashMap::new(), aliases: HashMap::new(), next_seq: 0 }
    }

    /// Resolve candidate keys to an entity, creating one when nothing matches
    ///
    /// If the candidates hit two different entities, those entities describe
    /// the same real-world object and are merged. The survivor is the entity
    /// whose canonical key came from the higher-priority identifier form, with
    /// ties going to the earlier registration. Every candidate becomes an alias
    /// of the returned entity.
    pub fn resolve_or_create(
        &mut self,
        candidates: &CandidateKeys,
        display_name: Option<&str>,
    ) -> Result<&Entity> {
        let entity_type = candidates.entity_type;
        let ordered = candidates.ordered();
        let Some((first_kind, first_key)) = ordered.first().cloned() else {
            return Err(RegistryError::Unresolved {
                entity_type,
                display_name: display_name.map(str::to_string),
            });
        };

        let mut hits: Vec<String> = Vec::new();
        for (_, key) in &ordered {
            if let Some(canonical) = self.aliases.get(&(entity_type, key.clone())) {
                if !hits.contains(canonical) {
                    hits.push(canonical.clone());
                }
            }
        }

        let canonical = match hits.as_slice() {
            [] => {
                let entity = Entity::new(first_key.clone(), first_kind, entity_type, self.next_seq);
                self.next_seq += 1;
                debug!("Registered {} {}", entity_type, first_key);
                self.entities.insert((entity_type, first_key.clone()), entity);
                first_key
            }
            [single] => single.clone(),
            _ => self.merge(entity_type, &hits)?,
        };

        let entity = self
            .entities
            .get_mut(&(entity_type, canonical.clone()))
            .ok_or_else(|| RegistryError::NotFound(canonical.clone()))?;

        for (_, key) in ordered {
            entity.aliases.insert(key.clone());
            self.aliases.insert((entity_type, key), canonical.clone());
        }

        if let Some(name) = display_name.map(str::trim).filter(|name| !name.is_empty()) {
            entity.display_name = Some(name.to_string());
        }

        Ok(entity)
    }

    /// Resolve a normalized record, refreshing the entity's name and attributes
    pub fn resolve_record(&mut self, record: &CanonicalRecord) -> Result<&Entity> {
        let candidates = CandidateKeys::from_record(record);
        let name = record.display_name();
        let canonical = self.resolve_or_create(&candidates, name.as_deref())?.canonical_key.clone();

        let entity = self
            .entities
            .get_mut(&(record.entity_type, canonical.clone()))
            .ok_or(RegistryError::NotFound(canonical))?;

        if let Some(position) = record.position() {
            entity.attributes.insert("position".to_string(), position);
        }
        for (field, attribute) in ATTRIBUTE_FIELDS {
            if let Some(value) = record.text(field) {
                entity.attributes.insert(attribute.to_string(), value);
            }
        }

        Ok(entity)
    }

    /// Fold every hit entity into the survivor and return the survivor's key
    fn merge(&mut self, entity_type: EntityType, hits: &[String]) -> Result<String> {
        let survivor = hits
            .iter()
            .filter_map(|key| self.entities.get(&(entity_type, key.clone())))
            .min_by_key(|entity| (entity.key_kind, entity.registered_seq))
            .map(|entity| entity.canonical_key.clone())
            .ok_or_else(|| RegistryError::NotFound(hits.join(", ")))?;

        for absorbed_key in hits.iter().filter(|key| **key != survivor) {
            let Some(absorbed) = self.entities.remove(&(entity_type, absorbed_key.clone())) else {
                continue;
            };
            info!("Merging {} {} into {}", entity_type, absorbed.canonical_key, survivor);

            for alias in &absorbed.aliases {
                self.aliases.insert((entity_type, alias.clone()), survivor.clone());
            }

            if let Some(target) = self.entities.get_mut(&(entity_type, survivor.clone())) {
                target.aliases.extend(absorbed.aliases);
                if target.display_name.is_none() {
                    target.display_name = absorbed.display_name;
                }
                for (attribute, value) in absorbed.attributes {
                    target.attributes.entry(attribute).or_insert(value);
                }
            }
        }

        Ok(survivor)
    }

    /// Map any known key (current or historical) to its canonical key
    ///
    /// A native key that was never seen still resolves when the numeric id it
    /// embeds is known.
    pub fn canonicalize(&self, entity_type: EntityType, key: &str) -> Option<&str> {
        let key = key.trim();
        if let Some(canonical) = self.aliases.get(&(entity_type, key.to_string())) {
            return Some(canonical.as_str());
        }
        let numeric = implied_numeric_id(entity_type, key)?;
        self.aliases.get(&(entity_type, numeric)).map(String::as_str)
    }

    /// Entity for any known alias
    pub fn lookup(&self, entity_type: EntityType, alias: &str) -> Option<&Entity> {
        let canonical = self.canonicalize(entity_type, alias)?;
        self.entities.get(&(entity_type, canonical.to_string()))
    }

    /// Entity by canonical key
    pub fn get(&self, entity_type: EntityType, canonical_key: &str) -> Result<&Entity> {
        self.entities
            .get(&(entity_type, canonical_key.to_string()))
            .ok_or_else(|| RegistryError::NotFound(canonical_key.to_string()))
    }

    /// All entities of one type, ordered by canonical key
    pub fn entities(&self, entity_type: EntityType) -> Vec<&Entity> {
        let mut entities: Vec<&Entity> =
            self.entities.values().filter(|entity| entity.entity_type == entity_type).collect();
        entities.sort_by(|a, b| a.canonical_key.cmp(&b.canonical_key));
        entities
    }

    /// Search for entities by partial name match
    pub fn search_by_name(&self, query: &str) -> Vec<&Entity> {
        let query_lower = query.to_lowercase();
        let mut found: Vec<&Entity> = self
            .entities
            .values()
            .filter(|entity| {
                entity
                    .display_name
                    .as_deref()
                    .is_some_and(|name| name.to_lowercase().contains(&query_lower))
            })
            .collect();
        found.sort_by(|a, b| a.canonical_key.cmp(&b.canonical_key));
        found
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Snapshot of the registry in its on-disk layout
    pub fn export(&self) -> RegistryFile {
        let mut entities: Vec<Entity> = self.entities.values().cloned().collect();
        entities.sort_by(|a, b| {
            (a.entity_type, &a.canonical_key).cmp(&(b.entity_type, &b.canonical_key))
        });
        RegistryFile { version: REGISTRY_FILE_VERSION, next_seq: self.next_seq, entities }
    }

    /// Rebuild a registry (and its alias index) from the on-disk layout
    pub fn from_registry_file(file: RegistryFile) -> Result<Self> {
        if file.version != REGISTRY_FILE_VERSION {
            return Err(RegistryError::UnsupportedVersion(file.version));
        }

        let mut registry = Self::new();
        registry.next_seq = file.next_seq;
        for entity in file.entities {
            let entity_type = entity.entity_type;
            for alias in &entity.aliases {
                let index_key = (entity_type, alias.clone());
                if let Some(owner) = registry.aliases.get(&index_key) {
                    warn!(
                        "Alias {} claimed by both {} and {}, keeping {}",
                        alias, owner, entity.canonical_key, owner
                    );
                    continue;
                }
                registry.aliases.insert(index_key, entity.canonical_key.clone());
            }
            registry.next_seq = registry.next_seq.max(entity.registered_seq + 1);
            registry.entities.insert((entity_type, entity.canonical_key.clone()), entity);
        }
        Ok(registry)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.export())?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let file: RegistryFile = serde_json::from_str(json)?;
        Self::from_registry_file(file)
    }

    /// Load a persisted registry, starting empty when the file does not exist yet
    pub async fn load_from_file<P: AsRef<Path>>(file_path: P) -> Result<Self> {
        let file_path = file_path.as_ref();
        if !tokio::fs::try_exists(file_path).await? {
            info!("No registry at {:?}, starting empty", file_path);
            return Ok(Self::new());
        }

        let json_content = tokio::fs::read_to_string(file_path).await?;
        let registry = Self::from_json(&json_content)?;
        info!("Loaded {} entities from {:?}", registry.len(), file_path);
        Ok(registry)
    }
}

impl Default for EntityRegistry {
    fn default() -> Self {
        Self::new()
    }
}
