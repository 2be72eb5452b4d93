//! Long-lived and derived files under the data directory

use anyhow::{Context, Result};
use serde::Serialize;
use serde_json::Value;
use snapshot_store::write_json_atomic;
use std::path::Path;
use tracing::{debug, info};
use view_composer::DimensionTable;

/// Load the dimension table, empty when the file does not exist yet
///
/// A row without an `entity_key` column fails the load.
pub async fn load_dimensions(path: &Path) -> Result<DimensionTable> {
    if !tokio::fs::try_exists(path).await.with_context(|| format!("Failed to stat {:?}", path))? {
        debug!("No dimension table at {:?}", path);
        return Ok(DimensionTable::new());
    }

    let contents = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read dimension table {:?}", path))?;
    let value: Value = serde_json::from_str(&contents)
        .with_context(|| format!("Dimension table {:?} is not valid JSON", path))?;
    let Value::Array(rows) = value else {
        anyhow::bail!("Dimension table {:?} must be a JSON array of rows", path);
    };

    let table = DimensionTable::from_json_rows(&rows)
        .with_context(|| format!("Dimension table {:?} violates its schema", path))?;
    info!("Loaded {} dimension rows from {:?}", table.len(), path);
    Ok(table)
}

/// Write a JSON artifact atomically
pub async fn save_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    write_json_atomic(path, value).await.with_context(|| format!("Failed to write {:?}", path))
}
