//! RACESCAN: multi-source race listing aggregator
//!
//! Entry point. Loads configuration, initialises structured logging,
//! wires the cache, HTTP fetcher and source adapters into a pipeline, and
//! runs one scan.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};

use racescan::config;
use racescan::engine::{Pipeline, StdinFallback};
use racescan::normalize::courses::CourseAliases;
use racescan::normalize::Normalizer;
use racescan::sources::{build_adapters, HttpFetcher};
use racescan::storage::FileCacheStore;
use racescan::types::ScanReport;

const BANNER: &str = r#"
 ____      _    ____ _____ ____   ____    _    _   _
|  _ \    / \  / ___| ____/ ___| / ___|  / \  | \ | |
| |_) |  / _ \| |   |  _| \___ \| |     / _ \ |  \| |
|  _ <  / ___ \ |___| |___ ___) | |___ / ___ \| |\  |
|_| \_\/_/   \_\____|_____|____/ \____/_/   \_\_| \_|

  Multi-source race scanner
  v0.1.0
"#;

/// Score from which a race is listed as high value.
const HIGH_VALUE_THRESHOLD: f64 = 70.0;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let cfg = config::AppConfig::load("config.toml")?;

    init_logging();

    println!("{BANNER}");

    let settings = cfg.settings().context("Invalid configuration")?;
    info!(
        profile = ?cfg.scan.profile,
        sources = settings.sources.len(),
        max_concurrent = settings.fetch.max_concurrent_requests,
        days_back = settings.request.days_back,
        days_forward = settings.request.days_forward,
        "RACESCAN starting up"
    );

    // -- Initialise components -------------------------------------------

    let cache = Arc::new(
        FileCacheStore::open(settings.cache_dir.clone())
            .with_context(|| format!("Failed to open cache dir: {}", settings.cache_dir.display()))?,
    );
    let http = Arc::new(HttpFetcher::new(settings.fetch.request_timeout)?);
    let adapters = build_adapters(&settings.sources, http);

    let mut aliases = CourseAliases::builtin();
    aliases.extend(&settings.aliases);

    let mut pipeline = Pipeline::new(settings.fetch.clone(), cache, adapters)
        .with_normalizer(Normalizer::new(aliases));
    if settings.request.interactive_fallback {
        info!("Interactive fallback enabled");
        pipeline = pipeline.with_fallback(Arc::new(StdinFallback::new()));
    }

    // -- Scan ------------------------------------------------------------

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    tokio::select! {
        report = pipeline.run(&settings.request) => {
            log_report(&report.context("Scan failed")?);
        }
        _ = &mut shutdown => {
            warn!("Shutdown signal received, scan abandoned.");
        }
    }

    Ok(())
}

/// Log the run summary and the high-value races.
fn log_report(report: &ScanReport) {
    let s = &report.summary;
    for src in &s.sources {
        info!(
            source = %src.source,
            status = %src.status,
            attempts = src.attempts,
            races = src.races,
            skipped = src.skipped_entries,
            error = src.error.as_deref().unwrap_or(""),
            "Source"
        );
    }

    if s.no_successful_sources() {
        warn!("No sources succeeded; nothing to rank.");
        return;
    }

    info!(
        ranked = s.races_ranked,
        outside_filter = s.races_outside_field_filter,
        dropped_runners = s.dropped_runners,
        cache_hit_ratio = format!("{:.0}%", s.cache_hit_ratio * 100.0),
        "Scan summary"
    );

    for (i, ranked) in report.high_value(HIGH_VALUE_THRESHOLD).enumerate() {
        let race = &ranked.race;
        info!(
            rank = i + 1,
            score = format!("{:.1}", ranked.score.final_score),
            race = %race,
            favorite = race.favorite().map(|r| r.name.as_str()).unwrap_or("-"),
            bonuses = ?ranked.score.bonuses,
            "High-value race"
        );
    }
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("racescan=info"));

    let json_logging = std::env::var("RACESCAN_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt()
            .with_env_filter(env_filter)
            .with_target(true)
            .init();
    }
}
