use anyhow::Context;
use snapshot_store::LocalSnapshotStore;
use snapshot_store::SnapshotStoreConfig;
use stats_ingest::{initialize_logging, HttpStatSource, Pipeline, PipelineConfig};
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv::dotenv().ok();

    let config = PipelineConfig::load()?;
    initialize_logging(&config.logging)?;

    info!("Starting stats ingest for league {}", config.upstream.league_key);
    info!("Data directory: {:?}", config.storage.data_dir);

    let source = HttpStatSource::new(config.upstream.clone(), config.retry.clone())
        .context("Failed to create upstream client")?;
    let store = LocalSnapshotStore::new(SnapshotStoreConfig::new(config.storage.data_dir.clone()))
        .context("Failed to create snapshot store")?;

    let mut pipeline = Pipeline::new(config, Arc::new(source), store);

    // Ctrl+C stops the run; the date being fetched is not written
    let cancel = pipeline.cancellation_token();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C signal: {}", e);
            return;
        }
        info!("Ctrl+C signal received, stopping run");
        cancel.cancel();
    });

    match pipeline.run().await {
        Ok(report) => {
            info!("{}", report);
            if report.cancelled {
                std::process::exit(130);
            }
            Ok(())
        }
        Err(e) => {
            error!("Run failed: {:#}", e);
            Err(e)
        }
    }
}
