use crate::error::{Result, ViewError};
use entity_registry::EntityRegistry;
use response_normalizer::EntityType;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use tracing::{debug, warn};

/// Descriptive row for one rostered entity
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DimensionRow {
    pub entity_key: String,
    pub team_key: Option<String>,
    pub team_name: Option<String>,
    pub position: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
}

impl DimensionRow {
    pub fn new(entity_key: impl Into<String>) -> Self {
        Self {
            entity_key: entity_key.into(),
            team_key: None,
            team_name: None,
            position: None,
            display_name: None,
        }
    }

    pub fn with_team(mut self, team_key: Option<String>, team_name: Option<String>) -> Self {
        self.team_key = team_key;
        self.team_name = team_name;
        self
    }

    pub fn with_position(mut self, position: Option<String>) -> Self {
        self.position = position;
        self
    }

    pub fn with_display_name(mut self, display_name: Option<String>) -> Self {
        self.display_name = display_name;
        self
    }
}

/// Dimension rows in insertion order
///
/// Several rows may share an `entity_key`, e.g. while a player moves between
/// rosters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DimensionTable {
    rows: Vec<DimensionRow>,
}

impl DimensionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rows(rows: Vec<DimensionRow>) -> Self {
        Self { rows }
    }

    /// Load rows from loose JSON objects
    ///
    /// A row without an `entity_key` column makes the whole table unusable.
    /// A row whose key is null or blank is dropped.
    pub fn from_json_rows(rows: &[Value]) -> Result<Self> {
        let mut table = Vec::with_capacity(rows.len());

        for (index, row) in rows.iter().enumerate() {
            let object = row.as_object().ok_or(ViewError::NotAnObject { row: index })?;
            let key = object.get("entity_key").ok_or(ViewError::MissingKeyColumn { row: index })?;

            let Some(entity_key) = text(key) else {
                warn!("Dropping dimension row {} with empty entity_key", index);
                continue;
            };

            table.push(DimensionRow {
                entity_key,
                team_key: object.get("team_key").and_then(text),
                team_name: object.get("team_name").and_then(text),
                position: object.get("position").and_then(text),
                display_name: object.get("display_name").and_then(text),
            });
        }

        debug!("Loaded {} dimension rows", table.len());
        Ok(Self { rows: table })
    }

    /// Swap in a complete roster table
    pub fn replace_all(&mut self, rows: Vec<DimensionRow>) {
        debug!("Replacing {} dimension rows with {}", self.rows.len(), rows.len());
        self.rows = rows;
    }

    /// Swap in the rosters of some teams, keeping the rows of every other team
    ///
    /// Rows of a refreshed team are dropped first, so a player released from
    /// it disappears. A player who moved keeps only their incoming row.
    pub fn replace_teams(&mut self, refreshed_teams: &[String], incoming: Vec<DimensionRow>) {
        let teams: HashSet<&str> = refreshed_teams.iter().map(String::as_str).collect();
        let keys: HashSet<&str> = incoming.iter().map(|row| row.entity_key.as_str()).collect();
        self.rows.retain(|row| {
            let on_refreshed_team = row.team_key.as_deref().is_some_and(|team| teams.contains(team));
            !on_refreshed_team && !keys.contains(row.entity_key.as_str())
        });
        self.rows.extend(incoming);
    }

    /// Re-key rows through the registry; unknown keys are left unchanged
    pub fn canonicalize(&mut self, registry: &EntityRegistry) {
        for row in &mut self.rows {
            if let Some(canonical) = registry.canonicalize(EntityType::Player, &row.entity_key) {
                if canonical != row.entity_key {
                    debug!("Re-keyed dimension row {} -> {}", row.entity_key, canonical);
                    row.entity_key = canonical.to_string();
                }
            }
        }
    }

    pub fn rows(&self) -> &[DimensionRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

fn text(value: &Value) -> Option<String> {
    let text = match value {
        Value::String(s) => s.trim().to_string(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    (!text.is_empty()).then_some(text)
}
