//! Upstream seam: where response trees come from

use chrono::NaiveDate;
use response_normalizer::RawNode;
use thiserror::Error;

/// Errors fetching one upstream response
#[derive(Error, Debug)]
pub enum FetchError {
    /// Transport failure (connect, timeout, body read)
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success HTTP status
    #[error("Upstream returned {status} for {url}")]
    Status { status: u16, url: String },

    /// Body was not valid JSON
    #[error("Could not decode response from {url}: {reason}")]
    Decode { url: String, reason: String },

    /// Credentials are not available
    #[error("Environment variable {0} with the access token is not set")]
    MissingToken(String),

    /// Any other upstream failure
    #[error("Upstream error: {0}")]
    Upstream(String),
}

impl FetchError {
    /// Whether another attempt could succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Http(e) => !e.is_builder(),
            FetchError::Status { status, .. } => *status == 429 || *status >= 500,
            FetchError::Decode { .. } | FetchError::MissingToken(_) => false,
            FetchError::Upstream(_) => true,
        }
    }
}

/// Roster trees from one refresh
#[derive(Debug, Clone, Default)]
pub struct RosterBatch {
    /// One tree per team roster that was fetched
    pub rosters: Vec<RawNode>,

    /// Teams whose roster could not be fetched
    pub failed_teams: usize,
}

impl RosterBatch {
    /// Every team's roster was fetched
    pub fn is_complete(&self) -> bool {
        self.failed_teams == 0
    }
}

/// Source of raw response trees for the pipeline
///
/// Every method returns the response body as an untyped tree. Shape
/// differences between endpoints are handled downstream by the normalizer.
#[async_trait::async_trait]
pub trait StatSource: Send + Sync {
    /// One page of the entity listing, starting at `start`
    async fn fetch_entity_page(&self, start: usize, count: usize) -> Result<RawNode, FetchError>;

    /// Stats of one entity as of one date
    ///
    /// A response without a stats node means the period has not closed yet.
    async fn fetch_entity_stats(&self, entity_key: &str, date: NaiveDate) -> Result<RawNode, FetchError>;

    /// Team rosters, used for the dimension table
    async fn fetch_rosters(&self) -> Result<RosterBatch, FetchError> {
        Ok(RosterBatch::default())
    }

    /// League standings, `None` when the source has none
    async fn fetch_standings(&self) -> Result<Option<RawNode>, FetchError> {
        Ok(None)
    }

    /// The league's current date, if the upstream reports one
    async fn fetch_current_date(&self) -> Result<Option<NaiveDate>, FetchError> {
        Ok(None)
    }
}
