use crate::config::{RetryConfig, UpstreamConfig};
use crate::retry::run_with_retry;
use crate::source::{FetchError, RosterBatch, StatSource};
use chrono::NaiveDate;
use reqwest::Client;
use response_normalizer::{extract_current_date, extract_entities, EntityType, RawNode};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Envelope the upstream wraps every response body in
const ENVELOPE_FIELD: &str = "fantasy_content";

/// `StatSource` over the upstream REST+JSON API
pub struct HttpStatSource {
    config: UpstreamConfig,
    retry: RetryConfig,
    client: Client,
    token: String,
}

impl HttpStatSource {
    /// Create a source, reading the bearer token from the configured environment variable
    pub fn new(config: UpstreamConfig, retry: RetryConfig) -> Result<Self, FetchError> {
        let token = std::env::var(&config.token_env)
            .map_err(|_| FetchError::MissingToken(config.token_env.clone()))?;

        let client = Client::builder().timeout(Duration::from_secs(config.timeout_secs)).build()?;

        Ok(Self { config, retry, client, token })
    }

    /// Full URL for an API path, with `format=json` appended when missing
    pub fn url(&self, path: &str) -> String {
        build_url(&self.config.base_url, path)
    }

    async fn get_tree(&self, path: &str) -> Result<RawNode, FetchError> {
        let url = self.url(path);
        let url = url.as_str();
        run_with_retry(|| self.get_once(url), &self.retry, path).await
    }

    async fn get_once(&self, url: &str) -> Result<RawNode, FetchError> {
        debug!("GET {}", url);
        let response = self.client.get(url).bearer_auth(&self.token).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status { status: status.as_u16(), url: url.to_string() });
        }

        let body = response.text().await?;
        let tree = RawNode::from_json_str(&body)
            .map_err(|e| FetchError::Decode { url: url.to_string(), reason: e.to_string() })?;
        Ok(unwrap_envelope(tree))
    }
}

#[async_trait::async_trait]
impl StatSource for HttpStatSource {
    async fn fetch_entity_page(&self, start: usize, count: usize) -> Result<RawNode, FetchError> {
        let path = format!("league/{}/players;start={};count={}", self.config.league_key, start, count);
        self.get_tree(&path).await
    }

    async fn fetch_entity_stats(&self, entity_key: &str, date: NaiveDate) -> Result<RawNode, FetchError> {
        let path = format!("player/{}/stats;type=date;date={}", entity_key, date.format("%Y-%m-%d"));
        self.get_tree(&path).await
    }

    async fn fetch_rosters(&self) -> Result<RosterBatch, FetchError> {
        let teams_tree = self.get_tree(&format!("league/{}/teams", self.config.league_key)).await?;
        let teams = extract_entities(&teams_tree, EntityType::Team);
        info!("Fetching rosters for {} teams", teams.len());

        let mut batch = RosterBatch { rosters: Vec::with_capacity(teams.len()), failed_teams: 0 };
        for team in &teams {
            let Some(team_key) = team.text(EntityType::Team.native_key_field()) else {
                warn!("Team record without a team_key, skipping roster");
                batch.failed_teams += 1;
                continue;
            };
            match self.get_tree(&format!("team/{}/roster", team_key)).await {
                Ok(roster) => batch.rosters.push(roster),
                Err(e) => {
                    warn!("Roster fetch failed for {}: {}", team_key, e);
                    batch.failed_teams += 1;
                }
            }
        }
        Ok(batch)
    }

    async fn fetch_standings(&self) -> Result<Option<RawNode>, FetchError> {
        let path = format!("league/{}/standings", self.config.league_key);
        self.get_tree(&path).await.map(Some)
    }

    async fn fetch_current_date(&self) -> Result<Option<NaiveDate>, FetchError> {
        let league = self.get_tree(&format!("league/{}", self.config.league_key)).await?;
        Ok(extract_current_date(&league))
    }
}

fn build_url(base_url: &str, path: &str) -> String {
    let mut url = format!("{}/{}", base_url.trim_end_matches('/'), path.trim_start_matches('/'));
    if !url.contains("format=json") {
        url.push(if url.contains('?') { '&' } else { '?' });
        url.push_str("format=json");
    }
    url
}

fn unwrap_envelope(tree: RawNode) -> RawNode {
    if let Some(inner) = tree.get(ENVELOPE_FIELD) {
        return inner.clone();
    }
    tree
}
