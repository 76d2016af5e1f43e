//! Mock source for integration testing.
//!
//! Provides a deterministic `SourceAdapter` that serves a fixed set of
//! races, following a per-attempt script (serve, fail, or hang), and
//! optionally reports how many fetches are in flight.

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
use rust_decimal::Decimal;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use racescan::sources::{PageRequest, SourceAdapter};
use racescan::types::*;

pub const TODAY: (i32, u32, u32) = (2026, 10, 18);

pub fn today() -> NaiveDate {
    NaiveDate::from_ymd_opt(TODAY.0, TODAY.1, TODAY.2).unwrap()
}

/// What one fetch attempt does.
#[derive(Clone)]
pub enum Step {
    Serve,
    Fail(SourceError),
    /// Never answers within any sane timeout.
    Hang,
}

/// Tracks concurrent fetches across several mock sources.
#[derive(Default)]
pub struct Gauge {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl Gauge {
    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

struct InFlight<'a>(&'a Gauge);

impl<'a> InFlight<'a> {
    fn enter(gauge: &'a Gauge) -> Self {
        let now = gauge.current.fetch_add(1, Ordering::SeqCst) + 1;
        gauge.peak.fetch_max(now, Ordering::SeqCst);
        Self(gauge)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.current.fetch_sub(1, Ordering::SeqCst);
    }
}

pub struct MockSource {
    name: String,
    races: Vec<PartialRaceEvent>,
    script: Mutex<VecDeque<Step>>,
    /// Used once the script runs out.
    default_step: Step,
    work: Duration,
    gauge: Option<Arc<Gauge>>,
    calls: AtomicU32,
}

impl MockSource {
    pub fn new(name: &str, races: Vec<PartialRaceEvent>) -> Self {
        Self {
            name: name.to_string(),
            races,
            script: Mutex::new(VecDeque::new()),
            default_step: Step::Serve,
            work: Duration::ZERO,
            gauge: None,
            calls: AtomicU32::new(0),
        }
    }

    /// Play these steps first, then serve.
    pub fn scripted(mut self, steps: Vec<Step>) -> Self {
        self.script = Mutex::new(steps.into());
        self
    }

    /// Fail every attempt with `error`.
    pub fn failing(mut self, error: SourceError) -> Self {
        self.default_step = Step::Fail(error);
        self
    }

    pub fn hanging(mut self) -> Self {
        self.default_step = Step::Hang;
        self
    }

    pub fn with_work(mut self, work: Duration, gauge: Arc<Gauge>) -> Self {
        self.work = work;
        self.gauge = Some(gauge);
        self
    }

    pub fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    /// The body this source serves; also what a human would paste.
    pub fn body(&self) -> String {
        serde_json::to_string(&self.races).unwrap()
    }
}

#[async_trait]
impl SourceAdapter for MockSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn page_requests(&self, window: &DateWindow, _hints: &FilterHints) -> Vec<PageRequest> {
        vec![PageRequest::new(format!("https://{}.test/cards", self.name), window.start)]
    }

    async fn fetch(&self, window: &DateWindow, _hints: &FilterHints) -> Result<RawPayload, SourceError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let _in_flight = self.gauge.as_deref().map(InFlight::enter);

        if !self.work.is_zero() {
            tokio::time::sleep(self.work).await;
        }

        let step = self
            .script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| self.default_step.clone());

        match step {
            Step::Serve => Ok(RawPayload {
                pages: vec![RawPage {
                    url: format!("https://{}.test/cards", self.name),
                    day: window.start,
                    region: None,
                    body: self.body(),
                }],
                failed_pages: 0,
            }),
            Step::Fail(e) => Err(e),
            Step::Hang => {
                tokio::time::sleep(Duration::from_secs(24 * 3600)).await;
                Err(SourceError::timeout(&self.name, "hung"))
            }
        }
    }

    fn parse(&self, payload: &RawPayload) -> Result<ParseOutcome, SourceError> {
        let mut outcome = ParseOutcome::default();
        for page in &payload.pages {
            let races: Vec<PartialRaceEvent> = serde_json::from_str(&page.body)
                .map_err(|e| SourceError::malformed(&self.name, e.to_string()))?;
            outcome.races.extend(races);
        }
        Ok(outcome)
    }
}

// ---------------------------------------------------------------------------
// Race builders
// ---------------------------------------------------------------------------

pub fn race(
    course: &str,
    hhmm: (u32, u32),
    discipline: Discipline,
    runners: &[(&str, Option<Decimal>)],
) -> PartialRaceEvent {
    let start = today().and_time(NaiveTime::from_hms_opt(hhmm.0, hhmm.1, 0).unwrap());
    PartialRaceEvent {
        course: course.to_string(),
        country: Some("GB".to_string()),
        discipline: Some(discipline),
        descriptor: None,
        start: StartTime::Utc(Utc.from_utc_datetime(&start)),
        runners: runners
            .iter()
            .map(|(name, odds)| PartialRunner::new(*name, odds.map(RawOdds::Decimal)))
            .collect(),
        live_odds: false,
        race_url: None,
    }
}
