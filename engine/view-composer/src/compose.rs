use crate::dimension::{DimensionRow, DimensionTable};
use chrono::NaiveDate;
use delta_engine::DeltaRecord;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::info;

/// One dimension row joined with at most one delta record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CombinedViewRow {
    pub entity_key: String,
    pub display_name: Option<String>,
    pub team_key: Option<String>,
    pub team_name: Option<String>,
    pub position: Option<String>,
    pub stat_id: Option<String>,
    pub date: Option<NaiveDate>,
    pub cumulative_value: Option<f64>,
    pub daily_value: Option<f64>,
}

impl CombinedViewRow {
    fn dimension_only(dimension: &DimensionRow) -> Self {
        Self {
            entity_key: dimension.entity_key.clone(),
            display_name: dimension.display_name.clone(),
            team_key: dimension.team_key.clone(),
            team_name: dimension.team_name.clone(),
            position: dimension.position.clone(),
            stat_id: None,
            date: None,
            cumulative_value: None,
            daily_value: None,
        }
    }

    fn joined(dimension: &DimensionRow, delta: &DeltaRecord) -> Self {
        Self {
            display_name: delta.display_name.clone().or_else(|| dimension.display_name.clone()),
            stat_id: Some(delta.stat_id.clone()),
            date: Some(delta.date),
            cumulative_value: Some(delta.cumulative_value),
            daily_value: Some(delta.daily_value),
            ..Self::dimension_only(dimension)
        }
    }
}

/// Left join dimension rows with delta records on `entity_key`
///
/// Rows come out in dimension order, then in delta order within each
/// dimension row. Deltas for entities with no dimension row are not included.
pub fn compose(dimensions: &DimensionTable, deltas: &[DeltaRecord]) -> Vec<CombinedViewRow> {
    let mut facts: HashMap<&str, Vec<&DeltaRecord>> = HashMap::new();
    for delta in deltas {
        facts.entry(delta.entity_key.as_str()).or_default().push(delta);
    }

    let mut rows = Vec::with_capacity(deltas.len().max(dimensions.len()));
    let mut unmatched = 0;
    for dimension in dimensions.rows() {
        match facts.get(dimension.entity_key.as_str()) {
            Some(matching) => {
                rows.extend(matching.iter().map(|delta| CombinedViewRow::joined(dimension, delta)))
            }
            None => {
                unmatched += 1;
                rows.push(CombinedViewRow::dimension_only(dimension));
            }
        }
    }

    info!(
        "Composed {} view rows from {} dimension rows ({} without stats)",
        rows.len(),
        dimensions.len(),
        unmatched
    );
    rows
}
