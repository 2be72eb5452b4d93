//! Stats Ingest - Incremental season stat ledger
//!
//! Wires the pipeline stages together: listing pages are normalized and
//! resolved through the entity registry, each planned date is fetched into an
//! atomic snapshot, and the daily delta table and combined roster view are
//! regenerated from the full snapshot history.

pub mod artifacts;
pub mod config;
pub mod http;
pub mod logging;
pub mod models;
pub mod pipeline;
pub mod retry;
pub mod source;


pub use config::PipelineConfig;
pub use http::HttpStatSource;
pub use logging::initialize_logging;
pub use models::RunReport;
pub use pipeline::{Pipeline, TrackedEntity};
pub use source::{FetchError, RosterBatch, StatSource};
