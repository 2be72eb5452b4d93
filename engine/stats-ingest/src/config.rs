use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable naming the config file
pub const CONFIG_PATH_ENV: &str = "STATS_INGEST_CONFIG";

/// Config file used when `STATS_INGEST_CONFIG` is not set
pub const DEFAULT_CONFIG_PATH: &str = "stats-ingest.toml";

/// Prefix of environment overrides, e.g. `STATS_INGEST__RUN__MAX_DAYS_PER_RUN`
pub const ENV_PREFIX: &str = "STATS_INGEST";

/// Configuration for the ingestion pipeline
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Upstream API configuration
    pub upstream: UpstreamConfig,

    /// On-disk storage
    pub storage: StorageConfig,

    /// Date range and pacing of one run
    pub run: RunConfig,

    /// Retry configuration for upstream requests
    pub retry: RetryConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// API root, paths are appended to it
    pub base_url: String,

    /// League whose players and rosters are tracked (e.g. "466.l.1234")
    pub league_key: String,

    /// Environment variable holding the OAuth bearer token
    pub token_env: String,

    /// Per-request timeout in seconds
    pub timeout_secs: u64,

    /// Players requested per listing page
    pub page_size: usize,

    /// Upper bound on listing pages per run
    pub max_pages: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Directory for snapshots, registry and derived files
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunConfig {
    /// Earliest date the history should cover
    pub backfill_start: NaiveDate,

    /// Last date to fetch; the league's current date when unset
    pub end_date: Option<NaiveDate>,

    /// Dates fetched per run, oldest first
    pub max_days_per_run: usize,

    /// Entity fetches in flight at once within one date
    pub max_concurrent_fetches: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Attempts per request, the first one included (1 disables retries)
    pub max_attempts: u32,

    /// Initial retry delay in milliseconds
    pub initial_delay_ms: u64,

    /// Maximum retry delay in milliseconds
    pub max_delay_ms: u64,

    /// Backoff multiplier
    pub backoff_multiplier: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// Log format (pretty, compact, json)
    pub format: String,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: "https://fantasysports.yahooapis.com/fantasy/v2".to_string(),
            league_key: String::new(),
            token_env: "YAHOO_ACCESS_TOKEN".to_string(),
            timeout_secs: 30,
            page_size: 25,
            max_pages: 200,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { data_dir: PathBuf::from("./data") }
    }
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            backfill_start: NaiveDate::from_ymd_opt(2024, 10, 22).unwrap_or_default(),
            end_date: None,
            max_days_per_run: 5,
            max_concurrent_fetches: 8,
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self { max_attempts: 3, initial_delay_ms: 500, max_delay_ms: 30_000, backoff_multiplier: 2.0 }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: "pretty".to_string() }
    }
}

impl PipelineConfig {
    /// Load configuration: defaults, then the config file, then environment overrides
    ///
    /// The file is `$STATS_INGEST_CONFIG`, falling back to `stats-ingest.toml`,
    /// and may be absent.
    pub fn load() -> Result<Self> {
        let path = std::env::var(CONFIG_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH));
        Self::load_from(&path)
    }

    /// Load configuration using a specific config file path
    pub fn load_from(path: &Path) -> Result<Self> {
        let defaults = config::Config::try_from(&Self::default())
            .context("Failed to build default configuration")?;

        let settings = config::Config::builder()
            .add_source(defaults)
            .add_source(config::File::from(path.to_path_buf()).required(false))
            .add_source(
                config::Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to read configuration from {:?}", path))?;

        let config: Self =
            settings.try_deserialize().context("Failed to deserialize configuration")?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.upstream.page_size == 0 {
            anyhow::bail!("upstream.page_size must be greater than zero");
        }
        if self.upstream.max_pages == 0 {
            anyhow::bail!("upstream.max_pages must be greater than zero");
        }
        if self.run.max_days_per_run == 0 {
            anyhow::bail!("run.max_days_per_run must be greater than zero");
        }
        if self.run.max_concurrent_fetches == 0 {
            anyhow::bail!("run.max_concurrent_fetches must be greater than zero");
        }
        if self.retry.max_attempts == 0 {
            anyhow::bail!("retry.max_attempts must be at least 1");
        }
        if self.retry.backoff_multiplier < 1.0 {
            anyhow::bail!("retry.backoff_multiplier must be at least 1.0");
        }

        match self.logging.level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => anyhow::bail!("Invalid log level: {}", self.logging.level),
        }

        match self.logging.format.as_str() {
            "json" | "pretty" | "compact" => {}
            _ => anyhow::bail!("Invalid log format: {}", self.logging.format),
        }

        Ok(())
    }

    pub fn registry_path(&self) -> PathBuf {
        self.storage.data_dir.join("registry.json")
    }

    pub fn dimensions_path(&self) -> PathBuf {
        self.storage.data_dir.join("dimensions.json")
    }

    pub fn deltas_path(&self) -> PathBuf {
        self.storage.data_dir.join("daily_deltas.json")
    }

    pub fn combined_view_path(&self) -> PathBuf {
        self.storage.data_dir.join("combined_view.json")
    }

    pub fn standings_path(&self) -> PathBuf {
        self.storage.data_dir.join("standings.json")
    }
}
