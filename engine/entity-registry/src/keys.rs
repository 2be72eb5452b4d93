use response_normalizer::{CanonicalRecord, EntityType};
use serde::{Deserialize, Serialize};

/// Identifier forms, in resolution priority order (highest first)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyKind {
    /// Upstream native key, e.g. `466.p.4912`
    Native,

    /// Bare numeric id, e.g. `4912`
    NumericId,

    /// Legacy/editorial key, e.g. `nba.p.4912`
    Legacy,
}

/// Identifier candidates supplied by one response for one entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateKeys {
    pub entity_type: EntityType,
    pub native: Option<String>,
    pub numeric_id: Option<String>,
    pub legacy: Option<String>,
}

impl CandidateKeys {
    pub fn new(entity_type: EntityType) -> Self {
        Self { entity_type, native: None, numeric_id: None, legacy: None }
    }

    pub fn with_native(mut self, key: impl Into<String>) -> Self {
        self.native = Some(key.into());
        self
    }

    pub fn with_numeric_id(mut self, id: impl Into<String>) -> Self {
        self.numeric_id = Some(id.into());
        self
    }

    pub fn with_legacy(mut self, key: impl Into<String>) -> Self {
        self.legacy = Some(key.into());
        self
    }

    /// Pick the identifier fields out of a normalized record
    pub fn from_record(record: &CanonicalRecord) -> Self {
        let entity_type = record.entity_type;
        Self {
            entity_type,
            native: record.text(entity_type.native_key_field()),
            numeric_id: record.text(entity_type.numeric_id_field()),
            legacy: entity_type.legacy_key_field().and_then(|field| record.text(field)),
        }
    }

    /// Usable candidates, highest priority first, blanks dropped and duplicates removed
    ///
    /// When no numeric id was supplied, one is derived from a native key of
    /// the form `<game>.p.<id>` (players) or `<league>.t.<id>` (teams).
    ///
    /// Team numbers repeat in every league, so next to a team's native key a
    /// bare team id is qualified with that key's league.
    pub fn ordered(&self) -> Vec<(KeyKind, String)> {
        let native = clean(self.native.as_deref());
        let numeric = match (self.entity_type, clean(self.numeric_id.as_deref()), native.as_deref()) {
            (EntityType::Team, Some(id), Some(native)) => {
                Some(league_of_team(native).map_or_else(|| id.clone(), |league| scoped_team_id(league, &id)))
            }
            (_, Some(id), _) => Some(id),
            (_, None, Some(native)) => implied_numeric_id(self.entity_type, native),
            (_, None, None) => None,
        };
        let legacy = clean(self.legacy.as_deref());

        let mut ordered: Vec<(KeyKind, String)> = Vec::with_capacity(3);
        for (kind, key) in [(KeyKind::Native, native), (KeyKind::NumericId, numeric), (KeyKind::Legacy, legacy)] {
            if let Some(key) = key {
                if !ordered.iter().any(|(_, seen)| *seen == key) {
                    ordered.push((kind, key));
                }
            }
        }
        ordered
    }

    pub fn is_empty(&self) -> bool {
        self.ordered().is_empty()
    }
}

fn clean(key: Option<&str>) -> Option<String> {
    key.map(str::trim).filter(|k| !k.is_empty()).map(str::to_string)
}

/// Numeric id embedded in a native key
///
/// Players are numbered per game (`466.p.4912` -> `4912`). Teams are numbered
/// per league, so their id keeps the league (`466.l.1234.t.3` -> `l.1234.t.3`).
pub fn implied_numeric_id(entity_type: EntityType, native: &str) -> Option<String> {
    let marker = match entity_type {
        EntityType::Player => ".p.",
        EntityType::Team => ".t.",
    };
    let (head, tail) = native.rsplit_once(marker)?;
    if tail.is_empty() || !tail.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    match entity_type {
        EntityType::Player => Some(tail.to_string()),
        EntityType::Team => {
            let (_, league_id) = head.rsplit_once(".l.")?;
            Some(scoped_team_id(league_id, tail))
        }
    }
}

/// League id inside a team key (`466.l.1234.t.3` -> `1234`)
fn league_of_team(native: &str) -> Option<&str> {
    let (head, _) = native.rsplit_once(".t.")?;
    let (_, league_id) = head.rsplit_once(".l.")?;
    Some(league_id)
}

fn scoped_team_id(league_id: &str, team_id: &str) -> String {
    format!("l.{}.t.{}", league_id, team_id)
}
