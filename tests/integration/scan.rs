//! Full-pipeline scenarios.

use async_trait::async_trait;
use rust_decimal_macros::dec;
use std::sync::Arc;
use std::time::Duration;

use racescan::config::{FetchSettings, Profile};
use racescan::engine::{ManualFallback, Pipeline};
use racescan::sources::{PageRequest, SourceAdapter};
use racescan::storage::{FileCacheStore, MemoryCacheStore};
use racescan::types::*;

use crate::mock_source::{race, today, Gauge, MockSource, Step};

fn settings() -> FetchSettings {
    FetchSettings {
        max_jitter: Duration::ZERO,
        request_timeout: Duration::from_secs(10),
        ..FetchSettings::for_profile(Profile::Standard)
    }
}

fn request() -> ScanRequest {
    ScanRequest {
        days_back: 0,
        days_forward: 0,
        min_field_size: 3,
        max_field_size: 12,
        interactive_fallback: false,
    }
}

fn pipeline(settings: FetchSettings, sources: &[Arc<MockSource>]) -> Pipeline {
    let adapters: Vec<Arc<dyn SourceAdapter>> = sources
        .iter()
        .map(|s| Arc::clone(s) as Arc<dyn SourceAdapter>)
        .collect();
    Pipeline::new(settings, Arc::new(MemoryCacheStore::new()), adapters)
}

fn five_runner_race() -> PartialRaceEvent {
    race(
        "Kempton Park",
        (14, 30),
        Discipline::Thoroughbred,
        &[
            ("Alpha", Some(dec!(1.5))),
            ("Bravo", Some(dec!(2.0))),
            ("Charlie", Some(dec!(3.0))),
            ("Delta", Some(dec!(5.0))),
            ("Echo", Some(dec!(8.0))),
        ],
    )
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_scenario_a_weighted_sum_without_bonuses() {
    let source = Arc::new(MockSource::new("cards", vec![five_runner_race()]));
    let report = pipeline(settings(), &[source])
        .run_for(&request(), today())
        .await
        .unwrap();

    assert_eq!(report.races.len(), 1);
    let score = &report.races[0].score;
    assert_eq!(score.field_size_score, 100.0);
    assert_eq!(score.favorite_odds_score, 100.0);
    assert_eq!(score.spread_score, 40.0);
    assert!(score.bonuses.is_empty());
    assert!((score.final_score - 91.0).abs() < 1e-9);
    assert!((score.final_score - score.base_score).abs() < 1e-9);
}

#[tokio::test(start_paused = true)]
async fn test_scenario_b_two_timeouts_then_success_is_degraded() {
    let flaky = Arc::new(
        MockSource::new("flaky", vec![five_runner_race()]).scripted(vec![Step::Hang, Step::Hang]),
    );
    let report = pipeline(settings(), &[Arc::clone(&flaky)])
        .run_for(&request(), today())
        .await
        .unwrap();

    assert_eq!(flaky.calls(), 3);
    assert_eq!(report.races.len(), 1);
    assert!(report.races[0].race.sources.contains("flaky"));

    let summary = &report.summary;
    assert_eq!(summary.sources[0].status, SourceStatus::Degraded);
    assert_eq!(summary.sources[0].attempts, 3);
    assert_eq!(summary.sources_degraded, 1);
    assert_eq!(summary.sources_succeeded, 1);
    assert_eq!(summary.sources_failed, 0);
}

#[tokio::test(start_paused = true)]
async fn test_scenario_c_disjoint_odds_coverage_merges_richer_runners() {
    let first = Arc::new(MockSource::new(
        "first",
        vec![race(
            "Ascot",
            (15, 10),
            Discipline::Thoroughbred,
            &[("Alpha", Some(dec!(2.5))), ("Bravo", None), ("Charlie", Some(dec!(7.0)))],
        )],
    ));
    let second = Arc::new(MockSource::new(
        "second",
        vec![race(
            "ASCOT",
            (15, 10),
            Discipline::Thoroughbred,
            &[("alpha", None), ("Bravo", Some(dec!(4.0))), ("Delta", Some(dec!(9.0)))],
        )],
    ));

    let report = pipeline(settings(), &[first, second])
        .run_for(&request(), today())
        .await
        .unwrap();

    assert_eq!(report.summary.races_found, 2);
    assert_eq!(report.races.len(), 1);
    let merged = &report.races[0].race;
    assert_eq!(merged.sources.len(), 2);
    assert_eq!(merged.runners.len(), 4);
    assert_eq!(merged.field_size, 4);
    assert!(merged.runners.iter().all(|r| r.has_odds()));
    assert_eq!(merged.favorite().unwrap().name, "Alpha");
    assert_eq!(merged.second_favorite().unwrap().name, "Bravo");
}

#[tokio::test(start_paused = true)]
async fn test_scenario_d_all_sources_fail() {
    let sources: Vec<Arc<MockSource>> = ["one", "two", "three"]
        .iter()
        .map(|n| {
            Arc::new(
                MockSource::new(n, vec![five_runner_race()])
                    .failing(SourceError::unreachable(n, "connection refused")),
            )
        })
        .collect();

    let report = pipeline(settings(), &sources)
        .run_for(&request(), today())
        .await
        .unwrap();

    assert!(report.races.is_empty());
    assert!(report.summary.no_successful_sources());
    assert_eq!(report.summary.sources_failed, 3);
    for s in &sources {
        assert_eq!(s.calls(), settings().max_retries + 1);
    }
}

// ---------------------------------------------------------------------------
// Resource model
// ---------------------------------------------------------------------------

#[tokio::test(start_paused = true)]
async fn test_in_flight_fetches_never_exceed_limit() {
    let gauge = Arc::new(Gauge::default());
    let sources: Vec<Arc<MockSource>> = (0..8)
        .map(|i| {
            Arc::new(
                MockSource::new(&format!("src{i}"), vec![])
                    .with_work(Duration::from_millis(500), Arc::clone(&gauge)),
            )
        })
        .collect();
    let limited = FetchSettings { max_concurrent_requests: 3, ..settings() };

    let report = pipeline(limited, &sources)
        .run_for(&request(), today())
        .await
        .unwrap();

    assert_eq!(report.summary.sources_succeeded, 8);
    assert!(gauge.peak() <= 3);
    assert_eq!(gauge.peak(), 3);
}

#[tokio::test(start_paused = true)]
async fn test_deadline_keeps_completed_sources() {
    let stuck = Arc::new(MockSource::new("stuck", vec![]).hanging());
    let quick = Arc::new(MockSource::new("quick", vec![five_runner_race()]));
    let bounded = FetchSettings {
        request_timeout: Duration::from_secs(600),
        scan_deadline: Some(Duration::from_secs(20)),
        ..settings()
    };

    let report = pipeline(bounded, &[stuck, quick])
        .run_for(&request(), today())
        .await
        .unwrap();

    assert_eq!(report.summary.sources[0].status, SourceStatus::Cancelled);
    assert_eq!(report.summary.sources[1].status, SourceStatus::Fresh);
    assert_eq!(report.races.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_cache_survives_between_invocations() {
    let dir = std::env::temp_dir().join(format!("racescan_it_{}", uuid::Uuid::new_v4()));
    let source = Arc::new(MockSource::new("cards", vec![five_runner_race()]));

    for _ in 0..2 {
        let cache = Arc::new(FileCacheStore::open(dir.clone()).unwrap());
        let adapters: Vec<Arc<dyn SourceAdapter>> = vec![Arc::clone(&source) as Arc<dyn SourceAdapter>];
        let report = Pipeline::new(settings(), cache, adapters)
            .run_for(&request(), today())
            .await
            .unwrap();
        assert_eq!(report.races.len(), 1);
    }

    assert_eq!(source.calls(), 1);
    let _ = std::fs::remove_dir_all(&dir);
}

// ---------------------------------------------------------------------------
// Manual fallback
// ---------------------------------------------------------------------------

struct Paste(String);

#[async_trait]
impl ManualFallback for Paste {
    async fn page_body(&self, _source: &str, _request: &PageRequest) -> Option<String> {
        Some(self.0.clone())
    }
}

#[tokio::test(start_paused = true)]
async fn test_manual_fallback_supplies_blocked_source() {
    let blocked = Arc::new(
        MockSource::new("blocked", vec![five_runner_race()])
            .failing(SourceError::rate_limited("blocked", "challenge page")),
    );
    let pasted = blocked.body();
    let interactive = ScanRequest { interactive_fallback: true, ..request() };

    let report = pipeline(settings(), &[blocked])
        .with_fallback(Arc::new(Paste(pasted)))
        .run_for(&interactive, today())
        .await
        .unwrap();

    assert_eq!(report.summary.sources[0].status, SourceStatus::Manual);
    assert_eq!(report.summary.sources_succeeded, 1);
    assert_eq!(report.races.len(), 1);
}
