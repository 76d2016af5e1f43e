//! Scan orchestration.
//!
//! `Pipeline::run` is the single entry point for downstream collaborators:
//! fetch every enabled source, parse and normalise what arrived, merge
//! duplicates, filter by field size, score and rank. Only invalid
//! configuration fails a scan; everything else degrades into the run
//! summary.

use chrono::{NaiveDate, Utc};
use std::sync::Arc;
use tracing::{info, warn};

use super::aggregator::aggregate;
use super::fallback::ManualFallback;
use super::scheduler::FetchScheduler;
use crate::config::FetchSettings;
use crate::normalize::Normalizer;
use crate::sources::SourceAdapter;
use crate::storage::{cache_key, CacheStore};
use crate::strategy::ScoringEngine;
use crate::types::{
    DateWindow, FilterHints, RaceEvent, RunSummary, ScanError, ScanReport, ScanRequest,
    SourceReport, SourceResult, SourceStatus,
};

pub struct Pipeline {
    scheduler: FetchScheduler,
    cache: Arc<dyn CacheStore>,
    adapters: Vec<Arc<dyn SourceAdapter>>,
    normalizer: Normalizer,
    scoring: ScoringEngine,
}

impl Pipeline {
    pub fn new(
        settings: FetchSettings,
        cache: Arc<dyn CacheStore>,
        adapters: Vec<Arc<dyn SourceAdapter>>,
    ) -> Self {
        Self {
            scheduler: FetchScheduler::new(Arc::clone(&cache), settings),
            cache,
            adapters,
            normalizer: Normalizer::default(),
            scoring: ScoringEngine::default(),
        }
    }

    pub fn with_fallback(mut self, fallback: Arc<dyn ManualFallback>) -> Self {
        self.scheduler = self.scheduler.with_fallback(fallback);
        self
    }

    pub fn with_normalizer(mut self, normalizer: Normalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn with_scoring(mut self, scoring: ScoringEngine) -> Self {
        self.scoring = scoring;
        self
    }

    pub fn with_jitter_seed(mut self, seed: u64) -> Self {
        self.scheduler = self.scheduler.with_jitter_seed(seed);
        self
    }

    /// Run a scan for a window anchored on today's UTC date.
    pub async fn run(&self, request: &ScanRequest) -> Result<ScanReport, ScanError> {
        self.run_for(request, Utc::now().date_naive()).await
    }

    /// Run a scan with the window anchored on `today`.
    pub async fn run_for(&self, request: &ScanRequest, today: NaiveDate) -> Result<ScanReport, ScanError> {
        request.validate()?;
        self.scheduler.settings().validate()?;
        if self.adapters.is_empty() {
            return Err(ScanError::ConfigInvalid("no sources enabled".into()));
        }

        let started = tokio::time::Instant::now();
        let window = request.window(today);
        let hints = request.hints();

        match self.cache.purge_expired(Utc::now()) {
            Ok(0) => {}
            Ok(n) => info!(removed = n, "Purged expired cache entries"),
            Err(e) => warn!(error = %e, "Cache purge failed, continuing without"),
        }

        // -- Fetch -----------------------------------------------------------

        let deadline = self
            .scheduler
            .settings()
            .scan_deadline
            .map(|d| tokio::time::Instant::now() + d);
        let results = self
            .scheduler
            .fetch_all(&self.adapters, window, &hints, request.interactive_fallback, deadline)
            .await;

        // -- Parse and normalise ---------------------------------------------

        let mut summary = RunSummary::default();
        let mut normalized: Vec<RaceEvent> = Vec::new();

        for (adapter, result) in self.adapters.iter().zip(results) {
            let report = self.ingest(adapter.as_ref(), result, &window, &hints, &mut normalized, &mut summary);
            match report.status {
                SourceStatus::Cached => {
                    summary.cache_hits += 1;
                    summary.sources_succeeded += 1;
                }
                SourceStatus::Degraded => {
                    summary.sources_degraded += 1;
                    summary.sources_succeeded += 1;
                }
                SourceStatus::Fresh | SourceStatus::Manual => summary.sources_succeeded += 1,
                SourceStatus::Failed | SourceStatus::ParseFailed | SourceStatus::Cancelled => {
                    summary.sources_failed += 1
                }
            }
            summary.sources.push(report);
        }
        summary.cache_hit_ratio = summary.cache_hits as f64 / self.adapters.len() as f64;

        // -- Merge, filter, rank ---------------------------------------------

        let merged = aggregate(normalized);
        summary.races_after_merge = merged.len();

        let (min, max) = (request.min_field_size as usize, request.max_field_size as usize);
        let (kept, outside): (Vec<RaceEvent>, Vec<RaceEvent>) = merged
            .into_iter()
            .partition(|r| (min..=max).contains(&r.field_size));
        summary.races_outside_field_filter = outside.len();

        let races = self.scoring.rank(kept);
        summary.races_ranked = races.len();
        summary.duration_ms = started.elapsed().as_millis() as u64;

        if summary.no_successful_sources() {
            warn!("No source returned data this scan");
        }
        info!(%summary, "Scan complete");

        Ok(ScanReport { races, summary })
    }

    /// Parse and normalise one source's result, appending its races.
    /// A payload that cannot be parsed is dropped from the cache so the next
    /// scan goes back to the network.
    fn ingest(
        &self,
        adapter: &dyn SourceAdapter,
        result: SourceResult,
        window: &DateWindow,
        hints: &FilterHints,
        normalized: &mut Vec<RaceEvent>,
        summary: &mut RunSummary,
    ) -> SourceReport {
        let mut report = SourceReport {
            source: result.source.clone(),
            status: result.status,
            attempts: result.attempts,
            races: 0,
            skipped_entries: 0,
            error: None,
        };

        let payload = match result.outcome {
            Ok(payload) => payload,
            Err(e) => {
                report.error = Some(e.to_string());
                return report;
            }
        };

        let parsed = match adapter.parse(&payload) {
            Ok(parsed) => parsed,
            Err(e) => {
                warn!(source = %result.source, error = %e, "Payload could not be parsed");
                report.status = SourceStatus::ParseFailed;
                report.error = Some(e.to_string());
                if let Err(e) = self.cache.invalidate(&cache_key(&result.source, window, hints)) {
                    warn!(source = %result.source, error = %e, "Failed to discard unparseable cache entry");
                }
                return report;
            }
        };

        let batch = self
            .normalizer
            .normalize_all(&parsed.races, &result.source, result.fetched_at);

        report.races = batch.races.len();
        report.skipped_entries = parsed.skipped + batch.rejected_races + payload.failed_pages;
        summary.races_found += parsed.races.len();
        summary.skipped_entries += report.skipped_entries;
        summary.dropped_runners += batch.dropped_runners;

        info!(
            source = %result.source,
            status = %report.status,
            races = report.races,
            skipped = report.skipped_entries,
            dropped_runners = batch.dropped_runners,
            "Source ingested"
        );

        normalized.extend(batch.races);
        report
    }
}
