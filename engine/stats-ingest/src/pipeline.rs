//! One ingestion run: discover, fetch, snapshot, derive

use crate::artifacts::{load_dimensions, save_json};
use crate::config::PipelineConfig;
use crate::models::RunReport;
use crate::source::StatSource;
use anyhow::{Context, Result};
use chrono::{NaiveDate, Utc};
use delta_engine::compute_from_snapshots;
use entity_registry::{EntityRegistry, RegistryError};
use futures::stream::{self, StreamExt};
use response_normalizer::{
    count_entries, extract_entities, extract_standings, extract_stat_sheet, CanonicalRecord, EntityType, RawNode,
};
use snapshot_store::{plan_fetch, DateRange, Snapshot, SnapshotBackend, StatObservation};
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use view_composer::{compose, DimensionRow, DimensionTable};

/// An entity whose stats are fetched this run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackedEntity {
    /// Registry key written into observations
    pub canonical_key: String,

    /// Key the upstream accepts in stat requests
    pub fetch_key: String,

    pub display_name: Option<String>,
}

/// Entities found in the listing, and whether the listing was read to its end
#[derive(Debug, Default)]
struct Discovery {
    entities: Vec<TrackedEntity>,
    complete: bool,
}

/// Observations gathered for one date before it is written
#[derive(Debug, Default)]
struct DateCollection {
    observations: Vec<StatObservation>,
    attempted: usize,
    failed: usize,
}

/// Ingestion pipeline over a stat source and a snapshot backend
pub struct Pipeline<B: SnapshotBackend> {
    config: PipelineConfig,
    source: Arc<dyn StatSource>,
    store: B,
    cancel: CancellationToken,
}

impl<B: SnapshotBackend> Pipeline<B> {
    pub fn new(config: PipelineConfig, source: Arc<dyn StatSource>, store: B) -> Self {
        Self { config, source, store, cancel: CancellationToken::new() }
    }

    /// Use an externally owned cancellation token
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that stops the run before the next date and aborts the current one
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run the pipeline once
    ///
    /// Dates lacking a final snapshot are fetched (capped per run), then the
    /// delta table and the combined view are regenerated from the full
    /// snapshot history. A cancelled run leaves the in-progress date unwritten
    /// and skips regeneration. When the entity listing could not be read to
    /// its end no dates are fetched, since their snapshots would be final
    /// while missing entities.
    pub async fn run(&mut self) -> Result<RunReport> {
        let mut report = RunReport::default();

        self.store.initialize().await.context("Failed to initialize snapshot store")?;

        let registry_path = self.config.registry_path();
        let mut registry = EntityRegistry::load_from_file(&registry_path)
            .await
            .with_context(|| format!("Failed to load entity registry {:?}", registry_path))?;

        let Discovery { entities, complete } = self.discover_entities(&mut registry, &mut report).await;
        report.entities_processed = entities.len();
        info!("Tracking {} entities", entities.len());

        let mut dimensions = load_dimensions(&self.config.dimensions_path()).await?;
        self.refresh_dimensions(&mut registry, &mut dimensions, &mut report).await;
        dimensions.canonicalize(&registry);

        self.refresh_standings(&mut registry, &mut report).await?;

        let range = DateRange::new(self.config.run.backfill_start, self.resolve_end_date().await);
        let index = self.store.index().await.context("Failed to index snapshots")?;
        let planned = if complete {
            plan_fetch(&range, &index, self.config.run.max_days_per_run)
        } else if self.cancel.is_cancelled() {
            report.cancelled = true;
            Vec::new()
        } else {
            // A snapshot missing part of the universe would become final
            warn!("Entity listing incomplete, no dates fetched this run");
            report.discovery_incomplete = true;
            Vec::new()
        };
        info!(
            "Planned {} dates between {} and {}: {:?}",
            planned.len(),
            range.start,
            range.end,
            planned
        );

        for date in planned {
            if self.cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }

            let Some(collection) = self.collect_date(date, &entities).await else {
                warn!("Run cancelled while fetching {}, date left unwritten", date);
                report.cancelled = true;
                break;
            };
            report.fetch_failures += collection.failed;

            let (mut snapshot, duplicates) = Snapshot::from_observations(date, collection.observations);
            snapshot.entities_attempted = collection.attempted;
            snapshot.entities_failed = collection.failed;
            report.records_dropped += duplicates;

            self.store
                .write_snapshot(&snapshot)
                .await
                .with_context(|| format!("Failed to write snapshot for {}", date))?;

            if snapshot.is_final() {
                info!(
                    "Snapshot {} written: {} observations, {}/{} entities failed",
                    date,
                    snapshot.len(),
                    collection.failed,
                    collection.attempted
                );
                report.observations_written += snapshot.len();
                report.dates_completed.push(date);
            } else {
                warn!("No observations for {}, will retry next run", date);
                report.dates_retried.push(date);
            }
        }

        save_json(&registry_path, &registry.export()).await?;
        save_json(&self.config.dimensions_path(), dimensions.rows()).await?;

        if report.cancelled {
            info!("Run cancelled, derived tables left as they were");
            return Ok(report);
        }

        self.regenerate_derived(&registry, &dimensions, &mut report).await?;
        info!("Run complete: {}", report);
        Ok(report)
    }

    /// Page through the entity listing and resolve every record
    ///
    /// Paging follows the raw entry count of each page, so an entry that
    /// cannot be parsed does not end the listing early. A failed page, or
    /// running out of pages, leaves the discovery incomplete.
    async fn discover_entities(&self, registry: &mut EntityRegistry, report: &mut RunReport) -> Discovery {
        let page_size = self.config.upstream.page_size;
        let mut discovered = Vec::new();
        let mut complete = false;

        for page in 0..self.config.upstream.max_pages {
            if self.cancel.is_cancelled() {
                break;
            }

            let start = page * page_size;
            let tree = match self.source.fetch_entity_page(start, page_size).await {
                Ok(tree) => tree,
                Err(e) => {
                    warn!("Listing page at {} failed, stopping discovery: {}", start, e);
                    break;
                }
            };

            let entries = count_entries(&tree, EntityType::Player);
            let records = extract_entities(&tree, EntityType::Player);
            if records.len() < entries {
                warn!("Listing page at {}: {} of {} entries unreadable", start, entries - records.len(), entries);
                report.records_dropped += entries - records.len();
            }
            debug!("Listing page at {} returned {} records", start, records.len());

            for record in &records {
                match track(registry, record) {
                    Ok(entity) => discovered.push(entity),
                    Err(e) => {
                        warn!("Dropping listing record: {}", e);
                        report.records_dropped += 1;
                    }
                }
            }

            if entries < page_size {
                complete = true;
                break;
            }
        }

        if !complete && !self.cancel.is_cancelled() {
            warn!("Entity listing not read to the end ({} pages max)", self.config.upstream.max_pages);
        }

        // Later records may have merged entities registered earlier in the run
        let mut seen = HashSet::new();
        let entities = discovered
            .into_iter()
            .filter_map(|mut entity| {
                if let Some(canonical) = registry.canonicalize(EntityType::Player, &entity.canonical_key) {
                    entity.canonical_key = canonical.to_string();
                }
                seen.insert(entity.canonical_key.clone()).then_some(entity)
            })
            .collect();

        Discovery { entities, complete }
    }

    /// Rebuild dimension rows from the current rosters
    ///
    /// When every roster was fetched the table is replaced outright.
    /// Otherwise only the teams that were fetched are replaced.
    async fn refresh_dimensions(
        &self,
        registry: &mut EntityRegistry,
        dimensions: &mut DimensionTable,
        report: &mut RunReport,
    ) {
        let batch = match self.source.fetch_rosters().await {
            Ok(batch) => batch,
            Err(e) => {
                warn!("Roster fetch failed, keeping previous dimension table: {}", e);
                return;
            }
        };
        if batch.rosters.is_empty() {
            debug!("No rosters returned, keeping previous dimension table");
            return;
        }

        let mut teams = Vec::new();
        let mut rows = Vec::new();
        for roster in &batch.rosters {
            let (team_key, roster_rows) = roster_rows(registry, roster, report);
            teams.extend(team_key);
            rows.extend(roster_rows);
        }

        if batch.is_complete() {
            info!("Replaced dimension table: {} rows from {} rosters", rows.len(), batch.rosters.len());
            dimensions.replace_all(rows);
        } else {
            warn!(
                "{} rosters could not be fetched, refreshing only {} teams",
                batch.failed_teams,
                teams.len()
            );
            dimensions.replace_teams(&teams, rows);
        }
    }

    /// Rewrite the standings table when the source has standings
    async fn refresh_standings(&self, registry: &mut EntityRegistry, report: &mut RunReport) -> Result<()> {
        let tree = match self.source.fetch_standings().await {
            Ok(Some(tree)) => tree,
            Ok(None) => return Ok(()),
            Err(e) => {
                warn!("Standings fetch failed, keeping previous standings: {}", e);
                return Ok(());
            }
        };

        let mut rows = extract_standings(&tree);
        if rows.is_empty() {
            warn!("Standings response held no teams, keeping previous standings");
            return Ok(());
        }

        for record in extract_entities(&tree, EntityType::Team) {
            if let Err(e) = registry.resolve_record(&record) {
                debug!("Standings team not registered: {}", e);
            }
        }
        for row in &mut rows {
            if let Some(canonical) = registry.canonicalize(EntityType::Team, &row.team_key) {
                row.team_key = canonical.to_string();
            }
        }
        rows.sort_by_key(|row| (row.rank.is_none(), row.rank, row.team_key.clone()));

        save_json(&self.config.standings_path(), &rows).await?;
        info!("Wrote standings for {} teams", rows.len());
        report.standings_rows = Some(rows.len());
        Ok(())
    }

    async fn resolve_end_date(&self) -> NaiveDate {
        if let Some(end_date) = self.config.run.end_date {
            return end_date;
        }
        match self.source.fetch_current_date().await {
            Ok(Some(current)) => current,
            Ok(None) => Utc::now().date_naive(),
            Err(e) => {
                warn!("Could not get the league's current date, using today (UTC): {}", e);
                Utc::now().date_naive()
            }
        }
    }

    /// Fetch every entity's stats for one date
    ///
    /// Returns `None` when cancelled before all fetches finished.
    async fn collect_date(&self, date: NaiveDate, entities: &[TrackedEntity]) -> Option<DateCollection> {
        let mut fetches = stream::iter(entities.iter().map(|entity| {
            let source = Arc::clone(&self.source);
            async move {
                let result = source.fetch_entity_stats(&entity.fetch_key, date).await;
                (entity, result)
            }
        }))
        .buffer_unordered(self.config.run.max_concurrent_fetches);

        let mut collection = DateCollection::default();
        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return None,
                next = fetches.next() => match next {
                    Some((entity, Ok(tree))) => {
                        collection.attempted += 1;
                        collection.observations.extend(observations_from(entity, date, &tree));
                    }
                    Some((entity, Err(e))) => {
                        collection.attempted += 1;
                        collection.failed += 1;
                        warn!("Stats fetch failed for {} on {}: {}", entity.fetch_key, date, e);
                    }
                    None => break,
                },
            }
        }

        Some(collection)
    }

    /// Recompute deltas and the combined view from every final snapshot
    async fn regenerate_derived(
        &self,
        registry: &EntityRegistry,
        dimensions: &DimensionTable,
        report: &mut RunReport,
    ) -> Result<()> {
        let mut history = self.store.load_all().await.context("Failed to load snapshot history")?;
        for snapshot in &mut history {
            for observation in &mut snapshot.observations {
                if let Some(canonical) = registry.canonicalize(EntityType::Player, &observation.entity_key) {
                    if canonical != observation.entity_key {
                        observation.entity_key = canonical.to_string();
                    }
                }
            }
        }

        let deltas = compute_from_snapshots(&history);
        let view = compose(dimensions, &deltas.records);
        report.delta_records = deltas.records.len();
        report.view_rows = view.len();

        save_json(&self.config.deltas_path(), &deltas.records).await?;
        save_json(&self.config.combined_view_path(), &view).await?;
        Ok(())
    }
}

fn track(registry: &mut EntityRegistry, record: &CanonicalRecord) -> Result<TrackedEntity, RegistryError> {
    let entity = registry.resolve_record(record)?;
    let fetch_key = record
        .text(EntityType::Player.native_key_field())
        .unwrap_or_else(|| entity.canonical_key.clone());
    Ok(TrackedEntity {
        canonical_key: entity.canonical_key.clone(),
        fetch_key,
        display_name: entity.display_name.clone(),
    })
}

/// Team key and dimension rows for the players of one team roster
fn roster_rows(
    registry: &mut EntityRegistry,
    roster: &RawNode,
    report: &mut RunReport,
) -> (Option<String>, Vec<DimensionRow>) {
    let team = extract_entities(roster, EntityType::Team).into_iter().next();
    let team_key = team.as_ref().and_then(|t| t.text(EntityType::Team.native_key_field()));
    let team_name = team.as_ref().and_then(CanonicalRecord::display_name);

    let mut rows = Vec::new();
    for record in extract_entities(roster, EntityType::Player) {
        match registry.resolve_record(&record) {
            Ok(entity) => rows.push(
                DimensionRow::new(entity.canonical_key.clone())
                    .with_team(team_key.clone(), team_name.clone())
                    .with_position(record.position())
                    .with_display_name(entity.display_name.clone()),
            ),
            Err(e) => {
                warn!("Dropping roster record: {}", e);
                report.records_dropped += 1;
            }
        }
    }
    (team_key, rows)
}

fn observations_from(entity: &TrackedEntity, date: NaiveDate, tree: &RawNode) -> Vec<StatObservation> {
    let sheet = extract_stat_sheet(tree);
    if sheet.is_empty() {
        debug!("No stats for {} on {}", entity.fetch_key, date);
    }
    let display_name = sheet.display_name.clone().or_else(|| entity.display_name.clone());

    sheet
        .stats
        .into_iter()
        .map(|pair| {
            StatObservation::new(entity.canonical_key.clone(), pair.stat_id, date, pair.raw_value)
                .with_display_name(display_name.clone())
                .with_coverage(sheet.coverage.clone())
        })
        .collect()
}
