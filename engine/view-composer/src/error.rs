use thiserror::Error;

/// Result type alias for view composition
pub type Result<T> = std::result::Result<T, ViewError>;

#[derive(Error, Debug)]
pub enum ViewError {
    /// A dimension row has no `entity_key` column at all
    #[error("Dimension row {row} is missing the entity_key column")]
    MissingKeyColumn { row: usize },

    /// A dimension row is not a JSON object
    #[error("Dimension row {row} is not an object")]
    NotAnObject { row: usize },
}
