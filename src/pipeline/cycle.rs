use crate::clock::Clock;
use crate::error::Result;
use crate::observability::metrics;
use crate::parser::extract_rows;
use crate::pipeline::dedupe::dedupe_by_id;
use crate::pipeline::identity::IdentityScheme;
use crate::pipeline::retention::sweep_expired;
use crate::pipeline::validate::{Region, Validator};
use crate::source::DocumentSource;
use crate::storage::Storage;
use crate::types::{CycleReport, Event};
use chrono::Duration;
use scraper::Html;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, instrument, warn};

/// Knobs for turning a bulletin page into stored events.
#[derive(Debug, Clone, Copy)]
pub struct CycleSettings {
    pub region: Region,
    pub utc_offset_hours: i32,
    pub identity: IdentityScheme,
    pub retention: Duration,
}

impl Default for CycleSettings {
    fn default() -> Self {
        Self {
            region: Region::default(),
            utc_offset_hours: 8,
            identity: IdentityScheme::default(),
            retention: Duration::hours(24),
        }
    }
}

/// Events extracted from one page, before deduplication.
#[derive(Debug, Clone, Default)]
pub struct ParsedBatch {
    pub events: Vec<Event>,
    pub rows_seen: usize,
    pub rows_malformed: usize,
    pub rows_rejected: usize,
}

/// Extracts, validates and identifies every bulletin row of `html`.
pub fn parse_page(html: &str, validator: &Validator, identity: IdentityScheme) -> ParsedBatch {
    let document = Html::parse_document(html);
    let mut rows = extract_rows(&document);
    let mut events = Vec::new();
    let mut rejected = 0;

    for raw in rows.by_ref() {
        match validator.validate(&raw) {
            Ok(reading) => events.push(identity.assign(reading)),
            Err(rejection) => {
                debug!(reason = rejection.reason(), "Rejected row: {}", rejection);
                metrics::extract::row_rejected(rejection.reason());
                rejected += 1;
            }
        }
    }

    ParsedBatch {
        events,
        rows_seen: rows.seen(),
        rows_malformed: rows.skipped(),
        rows_rejected: rejected,
    }
}

/// One fetch → extract → validate → dedupe → upsert → sweep run.
///
/// Cycles hold no lock against each other; overlapping runs are safe because
/// the upsert is idempotent per id.
pub struct ScrapeCycle {
    source: Arc<dyn DocumentSource>,
    storage: Arc<dyn Storage>,
    clock: Arc<dyn Clock>,
    validator: Validator,
    identity: IdentityScheme,
    retention: Duration,
}

impl ScrapeCycle {
    pub fn new(
        source: Arc<dyn DocumentSource>,
        storage: Arc<dyn Storage>,
        clock: Arc<dyn Clock>,
        settings: CycleSettings,
    ) -> Self {
        Self {
            source,
            storage,
            clock,
            validator: Validator::new(settings.region, settings.utc_offset_hours),
            identity: settings.identity,
            retention: settings.retention,
        }
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    #[instrument(skip(self), fields(source = %self.source.describe()))]
    pub async fn run(&self) -> Result<CycleReport> {
        let t0 = Instant::now();
        let result = self.run_steps().await;
        let secs = t0.elapsed().as_secs_f64();

        match &result {
            Ok(report) => {
                info!(
                    rows_seen = report.rows_seen,
                    malformed = report.rows_malformed,
                    rejected = report.rows_rejected,
                    duplicates = report.duplicates_collapsed,
                    inserted = report.inserted,
                    updated = report.updated,
                    deleted = report.deleted,
                    "Scrape cycle finished in {:.2}s",
                    secs
                );
                metrics::cycle::finished("ok", secs);
            }
            Err(e) if e.is_upstream() => {
                warn!(kind = e.kind(), "Scrape cycle aborted, upstream unavailable: {}", e);
                metrics::cycle::finished("upstream_error", secs);
            }
            Err(e) => {
                error!(kind = e.kind(), "Scrape cycle failed: {}", e);
                metrics::cycle::finished("error", secs);
            }
        }
        result
    }

    async fn run_steps(&self) -> Result<CycleReport> {
        let started_at = self.clock.now();

        // Step 1: fetch
        let body = self.source.fetch_document().await.map_err(|e| {
            metrics::source::fetch_error(e.kind());
            e
        })?;
        metrics::source::fetch_success();

        // Step 2: extract, validate, identify
        let batch = parse_page(&body, &self.validator, self.identity);
        metrics::extract::rows_seen(batch.rows_seen);
        metrics::extract::rows_malformed(batch.rows_malformed);
        if batch.rows_seen == 0 {
            warn!("Bulletin page had no event rows");
        }

        // Step 3: collapse repeated ids before they reach the store
        let (events, duplicates) = dedupe_by_id(batch.events);
        metrics::extract::duplicates_collapsed(duplicates);

        // Step 4: upsert the whole batch
        let outcome = self
            .storage
            .upsert_events(&events, self.clock.now())
            .await
            .map_err(|e| {
                metrics::store::error("upsert");
                e
            })?;
        metrics::store::upserted(outcome.inserted, outcome.updated);

        // Step 5: retire what has aged out
        let deleted = self.sweep().await?;

        Ok(CycleReport {
            rows_seen: batch.rows_seen,
            rows_malformed: batch.rows_malformed,
            rows_rejected: batch.rows_rejected,
            duplicates_collapsed: duplicates,
            inserted: outcome.inserted,
            updated: outcome.updated,
            deleted,
            started_at: Some(started_at),
            finished_at: Some(self.clock.now()),
        })
    }

    /// Runs only the retention step.
    pub async fn sweep(&self) -> Result<usize> {
        sweep_expired(self.storage.as_ref(), self.clock.now(), self.retention).await
    }
}
