use crate::node::{display_name, RawNode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Flat field map recovered from one logical record
pub type Fields = BTreeMap<String, RawNode>;

/// Kind of entity a record describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Player,
    Team,
}

impl EntityType {
    /// Field holding a collection of records (`players`, `teams`)
    pub fn collection_field(&self) -> &'static str {
        match self {
            EntityType::Player => "players",
            EntityType::Team => "teams",
        }
    }

    /// Field holding one record (`player`, `team`)
    pub fn record_field(&self) -> &'static str {
        match self {
            EntityType::Player => "player",
            EntityType::Team => "team",
        }
    }

    /// Field carrying the upstream's native key (e.g. `466.p.4912`)
    pub fn native_key_field(&self) -> &'static str {
        match self {
            EntityType::Player => "player_key",
            EntityType::Team => "team_key",
        }
    }

    /// Field carrying the bare numeric id
    pub fn numeric_id_field(&self) -> &'static str {
        match self {
            EntityType::Player => "player_id",
            EntityType::Team => "team_id",
        }
    }

    /// Field carrying the legacy editorial key, where the upstream has one
    pub fn legacy_key_field(&self) -> Option<&'static str> {
        match self {
            EntityType::Player => Some("editorial_player_key"),
            EntityType::Team => None,
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.record_field())
    }
}

/// A record flattened out of a response tree
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalRecord {
    /// What the record describes
    pub entity_type: EntityType,

    /// Merged fields of every fragment that made up the record
    pub fields: Fields,
}

impl CanonicalRecord {
    pub fn new(entity_type: EntityType, fields: Fields) -> Self {
        Self { entity_type, fields }
    }

    /// Text value of a field, `None` when missing, null or not a leaf
    pub fn text(&self, field: &str) -> Option<String> {
        self.fields
            .get(field)
            .and_then(RawNode::as_text)
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    /// Human readable name of the entity, if the record carries one
    pub fn display_name(&self) -> Option<String> {
        self.fields.get("name").and_then(display_name)
    }

    /// Eligible position, trying the fields the upstream has used over time
    pub fn position(&self) -> Option<String> {
        self.text("display_position")
            .or_else(|| self.text("primary_position"))
            .or_else(|| {
                self.fields
                    .get("selected_position")
                    .and_then(|node| crate::search::find_first(node, "position"))
                    .and_then(RawNode::as_text)
            })
    }
}

/// One `(stat_id, value)` pair from a stat response
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatPair {
    /// Upstream stat identifier (e.g. "12" for points)
    pub stat_id: String,

    /// Value as reported, `None` when the upstream sent nothing
    pub raw_value: Option<String>,
}

/// Everything recovered from a per-entity stat response
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatSheet {
    /// Name the response carried for the entity
    pub display_name: Option<String>,

    /// Coverage type (`date`, `week`, `season`)
    pub coverage: Option<String>,

    /// Period the values cover (a date, week number or season)
    pub period: Option<String>,

    /// Stat pairs, empty when the period has not closed yet
    pub stats: Vec<StatPair>,
}

impl StatSheet {
    pub fn is_empty(&self) -> bool {
        self.stats.is_empty()
    }
}

/// One team's line in the league standings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandingsRow {
    pub team_key: String,
    pub team_name: Option<String>,
    pub wins: Option<u32>,
    pub losses: Option<u32>,
    pub ties: Option<u32>,

    /// Winning percentage as reported (`.625`)
    pub win_pct: Option<f64>,

    /// Empty before the first scoring period closes
    pub rank: Option<u32>,
}
