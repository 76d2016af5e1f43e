//! Shared types for the RACESCAN pipeline.
//!
//! These types form the data model used across all modules.
//! Adapters produce `PartialRaceEvent`s, the normalizer turns them into
//! canonical `RaceEvent`s, the aggregator merges those, and the scoring
//! engine reads them without mutation.

use chrono::{DateTime, Duration, DurationRound, FixedOffset, NaiveDate, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Racing category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Discipline {
    Thoroughbred,
    Greyhound,
    Harness,
}

impl Discipline {
    pub const ALL: &'static [Discipline] = &[
        Discipline::Thoroughbred,
        Discipline::Greyhound,
        Discipline::Harness,
    ];

    /// Infer a discipline from free text such as a race title.
    pub fn infer(text: &str) -> Option<Self> {
        let t = text.to_lowercase();
        if t.contains("greyhound") || t.contains("dog") {
            Some(Discipline::Greyhound)
        } else if t.contains("harness") || t.contains("trot") || t.contains("pace") {
            Some(Discipline::Harness)
        } else {
            None
        }
    }
}

impl fmt::Display for Discipline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Discipline::Thoroughbred => write!(f, "thoroughbred"),
            Discipline::Greyhound => write!(f, "greyhound"),
            Discipline::Harness => write!(f, "harness"),
        }
    }
}

impl std::str::FromStr for Discipline {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "thoroughbred" | "flat" | "jumps" | "horse" | "horses" => Ok(Discipline::Thoroughbred),
            "greyhound" | "greyhounds" | "dogs" => Ok(Discipline::Greyhound),
            "harness" | "trotting" | "standardbred" => Ok(Discipline::Harness),
            other => anyhow::bail!("Unknown discipline: {other}"),
        }
    }
}

/// Whether a runner is expected to take part.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RunnerStatus {
    Confirmed,
    Withdrawn,
    Unknown,
}

impl RunnerStatus {
    /// Map a source's status token. A runner listed with no token is
    /// a declared runner.
    pub fn from_token(token: Option<&str>) -> Self {
        let Some(raw) = token else {
            return RunnerStatus::Confirmed;
        };
        match raw.trim().to_uppercase().as_str() {
            "" | "DECLARED" | "RUNNER" | "CONFIRMED" | "ACTIVE" | "A" => RunnerStatus::Confirmed,
            "NR" | "WD" | "W" | "WITHDRAWN" | "SCRATCHED" | "SCR" | "NON-RUNNER" | "VACANT" => {
                RunnerStatus::Withdrawn
            }
            _ => RunnerStatus::Unknown,
        }
    }
}

impl fmt::Display for RunnerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunnerStatus::Confirmed => write!(f, "confirmed"),
            RunnerStatus::Withdrawn => write!(f, "withdrawn"),
            RunnerStatus::Unknown => write!(f, "unknown"),
        }
    }
}

// ---------------------------------------------------------------------------
// Canonical race model
// ---------------------------------------------------------------------------

/// A runner in a canonical race.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Runner {
    pub name: String,
    /// Canonical decimal odds (e.g. 3.5 for 5/2).
    pub odds: Option<Decimal>,
    pub status: RunnerStatus,
    /// 1 = shortest odds. Only set for non-withdrawn runners with odds.
    pub favorite_rank: Option<u32>,
    /// Source that supplied this version of the runner.
    pub source: String,
    /// When that source's payload was fetched.
    pub observed_at: DateTime<Utc>,
}

impl Runner {
    pub fn has_odds(&self) -> bool {
        self.odds.is_some()
    }

    pub fn is_active(&self) -> bool {
        self.status != RunnerStatus::Withdrawn
    }
}

/// Identity of a race across sources.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RaceKey {
    /// Alias-resolved, normalised course name.
    pub course_key: String,
    /// UTC start time truncated to the minute.
    pub start_minute: DateTime<Utc>,
    pub discipline: Discipline,
}

impl RaceKey {
    pub fn new(course_key: impl Into<String>, start: DateTime<Utc>, discipline: Discipline) -> Self {
        Self {
            course_key: course_key.into(),
            start_minute: minute_bucket(start),
            discipline,
        }
    }
}

impl fmt::Display for RaceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{} ({})",
            self.course_key,
            self.start_minute.format("%Y-%m-%dT%H:%MZ"),
            self.discipline
        )
    }
}

/// Truncate a timestamp to the start of its minute.
pub fn minute_bucket(t: DateTime<Utc>) -> DateTime<Utc> {
    t.duration_trunc(Duration::minutes(1)).unwrap_or(t)
}

/// Attribute disagreements found while merging records of the same race.
/// Kept for diagnostics; they never block a merge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MergeConflict {
    StartTime {
        source: String,
        reported: DateTime<Utc>,
        kept: DateTime<Utc>,
    },
    Country {
        source: String,
        reported: String,
        kept: String,
    },
    RunnerOdds {
        runner: String,
        source: String,
        reported: Decimal,
        kept: Decimal,
    },
}

impl fmt::Display for MergeConflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MergeConflict::StartTime { source, reported, kept } => write!(
                f,
                "{source} reported start {} (kept {})",
                reported.format("%H:%M:%S"),
                kept.format("%H:%M:%S")
            ),
            MergeConflict::Country { source, reported, kept } => {
                write!(f, "{source} reported country {reported} (kept {kept})")
            }
            MergeConflict::RunnerOdds { runner, source, reported, kept } => {
                write!(f, "{source} quoted {runner} at {reported} (kept {kept})")
            }
        }
    }
}

/// A canonical race, built fresh each scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RaceEvent {
    pub key: RaceKey,
    /// Display name of the course.
    pub course: String,
    /// ISO country code.
    pub country: String,
    /// Start time in UTC (the reference timezone).
    pub start_time: DateTime<Utc>,
    pub discipline: Discipline,
    pub runners: Vec<Runner>,
    /// Contributing source names.
    pub sources: BTreeSet<String>,
    /// Contributing sources that supplied live (not static) odds.
    pub live_odds_sources: BTreeSet<String>,
    /// Count of confirmed runners.
    pub field_size: usize,
    pub race_url: Option<String>,
    pub conflicts: Vec<MergeConflict>,
}

impl RaceEvent {
    /// Recompute field size and favourite ranks from the runner list.
    pub fn refresh_derived(&mut self) {
        self.field_size = self
            .runners
            .iter()
            .filter(|r| r.status == RunnerStatus::Confirmed)
            .count();

        let mut priced: Vec<usize> = self
            .runners
            .iter()
            .enumerate()
            .filter(|(_, r)| r.is_active() && r.has_odds())
            .map(|(i, _)| i)
            .collect();
        priced.sort_by(|&a, &b| {
            let (ra, rb) = (&self.runners[a], &self.runners[b]);
            ra.odds.cmp(&rb.odds).then_with(|| ra.name.cmp(&rb.name))
        });

        for runner in &mut self.runners {
            runner.favorite_rank = None;
        }
        for (rank, idx) in priced.into_iter().enumerate() {
            self.runners[idx].favorite_rank = Some(rank as u32 + 1);
        }
    }

    fn runner_with_rank(&self, rank: u32) -> Option<&Runner> {
        self.runners.iter().find(|r| r.favorite_rank == Some(rank))
    }

    /// The runner with the shortest odds.
    pub fn favorite(&self) -> Option<&Runner> {
        self.runner_with_rank(1)
    }

    pub fn second_favorite(&self) -> Option<&Runner> {
        self.runner_with_rank(2)
    }

    /// Gap between second-favourite and favourite decimal odds.
    pub fn odds_spread(&self) -> Option<Decimal> {
        let fav = self.favorite()?.odds?;
        let second = self.second_favorite()?.odds?;
        Some(second - fav)
    }

    /// Runners that have not been withdrawn.
    pub fn active_runners(&self) -> impl Iterator<Item = &Runner> {
        self.runners.iter().filter(|r| r.is_active())
    }

    pub fn has_live_odds(&self) -> bool {
        !self.live_odds_sources.is_empty()
    }
}

impl fmt::Display for RaceEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} [{}] {} runners ({})",
            self.course,
            self.start_time.format("%Y-%m-%d %H:%MZ"),
            self.discipline,
            self.field_size,
            self.sources.iter().cloned().collect::<Vec<_>>().join(", "),
        )
    }
}

// ---------------------------------------------------------------------------
// Scan inputs
// ---------------------------------------------------------------------------

/// Inclusive range of race days to scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateWindow {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateWindow {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn single(day: NaiveDate) -> Self {
        Self { start: day, end: day }
    }

    /// Window from day offsets relative to `today` (e.g. -1 = yesterday).
    pub fn from_offsets(today: NaiveDate, days_back: i64, days_forward: i64) -> Self {
        Self {
            start: today + Duration::days(days_back),
            end: today + Duration::days(days_forward),
        }
    }

    /// Every day in the window, in order.
    pub fn days(&self) -> Vec<NaiveDate> {
        self.start
            .iter_days()
            .take_while(|d| *d <= self.end)
            .collect()
    }
}

impl fmt::Display for DateWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

/// Hints passed to adapters to narrow their requests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FilterHints {
    pub min_field_size: Option<u32>,
    pub max_field_size: Option<u32>,
}

impl FilterHints {
    /// Stable textual form used in cache keys.
    pub fn cache_fragment(&self) -> String {
        let fmt_bound = |b: Option<u32>| b.map(|v| v.to_string()).unwrap_or_else(|| "*".into());
        format!(
            "field={}-{}",
            fmt_bound(self.min_field_size),
            fmt_bound(self.max_field_size)
        )
    }
}

/// One scan invocation, as requested by an external collaborator.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanRequest {
    /// Day offset of the window start (e.g. -1 to include yesterday).
    pub days_back: i64,
    /// Day offset of the window end.
    pub days_forward: i64,
    pub min_field_size: u32,
    pub max_field_size: u32,
    pub interactive_fallback: bool,
}

impl ScanRequest {
    pub fn window(&self, today: NaiveDate) -> DateWindow {
        DateWindow::from_offsets(today, self.days_back, self.days_forward)
    }

    pub fn hints(&self) -> FilterHints {
        FilterHints {
            min_field_size: Some(self.min_field_size),
            max_field_size: Some(self.max_field_size),
        }
    }

    pub fn validate(&self) -> Result<(), ScanError> {
        if self.min_field_size > self.max_field_size {
            return Err(ScanError::ConfigInvalid(format!(
                "min_field_size ({}) cannot exceed max_field_size ({})",
                self.min_field_size, self.max_field_size
            )));
        }
        if self.days_back > self.days_forward {
            return Err(ScanError::ConfigInvalid(format!(
                "days_back ({}) cannot be after days_forward ({})",
                self.days_back, self.days_forward
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Raw payloads and partial records
// ---------------------------------------------------------------------------

/// One fetched page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawPage {
    pub url: String,
    pub day: NaiveDate,
    /// Region tag for sources that paginate by region.
    #[serde(default)]
    pub region: Option<String>,
    pub body: String,
}

/// Everything one adapter fetch returned. Serialisable so it can be cached.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawPayload {
    pub pages: Vec<RawPage>,
    /// Requested pages that could not be fetched and are absent from `pages`.
    #[serde(default)]
    pub failed_pages: usize,
}

impl RawPayload {
    pub fn new(pages: Vec<RawPage>) -> Self {
        Self { pages, failed_pages: 0 }
    }

    pub fn is_empty(&self) -> bool {
        self.pages.iter().all(|p| p.body.trim().is_empty())
    }
}

/// Odds as a source reports them, before conversion to decimal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RawOdds {
    /// Free text such as "5/2", "EVS", "3.50", "+150" or "SP".
    Text(String),
    Decimal(Decimal),
    Fractional { numerator: u32, denominator: u32 },
    Moneyline(i32),
}

/// A runner as parsed from one source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartialRunner {
    pub name: String,
    pub odds: Option<RawOdds>,
    /// Source status token ("NR", "scratched", ...). `None` = listed runner.
    pub status: Option<String>,
}

impl PartialRunner {
    pub fn new(name: impl Into<String>, odds: Option<RawOdds>) -> Self {
        Self {
            name: name.into(),
            odds,
            status: None,
        }
    }
}

/// Race start as a source reports it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StartTime {
    Utc(DateTime<Utc>),
    Offset(DateTime<FixedOffset>),
    /// Track-local wall clock time; the normalizer resolves the timezone.
    Local { date: NaiveDate, time: NaiveTime },
}

/// A race as parsed from one source, not yet normalised.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PartialRaceEvent {
    pub course: String,
    pub country: Option<String>,
    pub discipline: Option<Discipline>,
    /// Free text (race title, meeting type) used to infer discipline.
    pub descriptor: Option<String>,
    pub start: StartTime,
    pub runners: Vec<PartialRunner>,
    /// True when the odds are live market prices rather than static/forecast.
    pub live_odds: bool,
    pub race_url: Option<String>,
}

/// Result of parsing a payload: what parsed, plus how many entries didn't.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParseOutcome {
    pub races: Vec<PartialRaceEvent>,
    pub skipped: usize,
}

// ---------------------------------------------------------------------------
// Fetch results
// ---------------------------------------------------------------------------

/// How a source fared in one scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SourceStatus {
    /// Fetched from the network on the first attempt.
    Fresh,
    /// Served from a non-expired cache entry.
    Cached,
    /// Fetched only after one or more failed attempts.
    Degraded,
    /// Supplied through the manual fallback.
    Manual,
    /// Retries exhausted, no data.
    Failed,
    /// Payload obtained but unusable.
    ParseFailed,
    /// Cut off by the scan deadline.
    Cancelled,
}

impl SourceStatus {
    /// Whether the source contributed a payload.
    pub fn has_payload(&self) -> bool {
        matches!(
            self,
            SourceStatus::Fresh | SourceStatus::Cached | SourceStatus::Degraded | SourceStatus::Manual
        )
    }
}

impl fmt::Display for SourceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SourceStatus::Fresh => "fresh",
            SourceStatus::Cached => "cached",
            SourceStatus::Degraded => "degraded",
            SourceStatus::Manual => "manual",
            SourceStatus::Failed => "failed",
            SourceStatus::ParseFailed => "parse-failed",
            SourceStatus::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

/// One adapter's fetch result for a scan.
#[derive(Debug, Clone)]
pub struct SourceResult {
    pub source: String,
    pub fetched_at: DateTime<Utc>,
    pub outcome: Result<RawPayload, SourceError>,
    pub from_cache: bool,
    pub status: SourceStatus,
    /// Network attempts made (0 for a cache hit).
    pub attempts: u32,
}

// ---------------------------------------------------------------------------
// Scoring
// ---------------------------------------------------------------------------

/// Multiplicative bonus applied after the weighted sum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Bonus {
    LiveOdds,
    Greyhound,
    SweetSpot,
}

impl Bonus {
    pub fn multiplier(&self) -> f64 {
        match self {
            Bonus::LiveOdds => 1.20,
            Bonus::Greyhound => 1.10,
            Bonus::SweetSpot => 1.15,
        }
    }
}

/// Breakdown of a race's value score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreResult {
    pub key: RaceKey,
    pub field_size_score: f64,
    pub favorite_odds_score: f64,
    pub spread_score: f64,
    pub data_quality_score: f64,
    /// Weighted sum before bonuses.
    pub base_score: f64,
    pub bonuses: Vec<Bonus>,
    /// Clamped to [0, 100].
    pub final_score: f64,
}

/// A scored race in the final ranking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedRace {
    pub race: RaceEvent,
    pub score: ScoreResult,
}

// ---------------------------------------------------------------------------
// Run summary
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceReport {
    pub source: String,
    pub status: SourceStatus,
    pub attempts: u32,
    pub races: usize,
    pub skipped_entries: usize,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSummary {
    /// Partial races parsed across all sources, before merging.
    pub races_found: usize,
    pub races_after_merge: usize,
    pub races_ranked: usize,
    pub races_outside_field_filter: usize,
    pub sources: Vec<SourceReport>,
    pub sources_succeeded: usize,
    pub sources_degraded: usize,
    pub sources_failed: usize,
    pub cache_hits: usize,
    pub cache_hit_ratio: f64,
    pub dropped_runners: usize,
    pub skipped_entries: usize,
    pub duration_ms: u64,
}

impl RunSummary {
    pub fn no_successful_sources(&self) -> bool {
        self.sources_succeeded == 0
    }
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "races={} merged={} ranked={} sources ok={} degraded={} failed={} cache={:.0}% ({:.1}s)",
            self.races_found,
            self.races_after_merge,
            self.races_ranked,
            self.sources_succeeded,
            self.sources_degraded,
            self.sources_failed,
            self.cache_hit_ratio * 100.0,
            self.duration_ms as f64 / 1000.0,
        )
    }
}

/// The single output handed to report/notification/export collaborators.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScanReport {
    pub races: Vec<RankedRace>,
    pub summary: RunSummary,
}

impl ScanReport {
    /// Races scoring at or above `threshold`, still in rank order.
    pub fn high_value(&self, threshold: f64) -> impl Iterator<Item = &RankedRace> {
        self.races
            .iter()
            .filter(move |r| r.score.final_score >= threshold)
    }
}

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Per-source failures. All are recovered inside the scheduler.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum SourceError {
    #[error("{source_name} unreachable: {message}")]
    Unreachable { source_name: String, message: String },

    #[error("{source_name} rate limited: {message}")]
    RateLimited { source_name: String, message: String },

    #[error("{source_name} timed out: {message}")]
    Timeout { source_name: String, message: String },

    #[error("{source_name} payload malformed: {message}")]
    MalformedPayload { source_name: String, message: String },

    #[error("cache entry {key} corrupt: {message}")]
    CacheCorruption { key: String, message: String },
}

impl SourceError {
    /// Transient errors are eligible for retry.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            SourceError::Unreachable { .. }
                | SourceError::RateLimited { .. }
                | SourceError::Timeout { .. }
        )
    }

    pub fn unreachable(source: &str, message: impl Into<String>) -> Self {
        SourceError::Unreachable { source_name: source.to_string(), message: message.into() }
    }

    pub fn rate_limited(source: &str, message: impl Into<String>) -> Self {
        SourceError::RateLimited { source_name: source.to_string(), message: message.into() }
    }

    pub fn timeout(source: &str, message: impl Into<String>) -> Self {
        SourceError::Timeout { source_name: source.to_string(), message: message.into() }
    }

    pub fn malformed(source: &str, message: impl Into<String>) -> Self {
        SourceError::MalformedPayload { source_name: source.to_string(), message: message.into() }
    }
}

/// Errors surfaced to the invoking collaborator. Only configuration
/// problems abort a scan, and they do so before any fetch begins.
#[derive(Debug, thiserror::Error)]
pub enum ScanError {
    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use rust_decimal_macros::dec;

    fn runner(name: &str, odds: Option<Decimal>, status: RunnerStatus) -> Runner {
        Runner {
            name: name.to_string(),
            odds,
            status,
            favorite_rank: None,
            source: "test".to_string(),
            observed_at: Utc.with_ymd_and_hms(2026, 10, 18, 9, 0, 0).unwrap(),
        }
    }

    fn race(runners: Vec<Runner>) -> RaceEvent {
        let start = Utc.with_ymd_and_hms(2026, 10, 18, 14, 30, 0).unwrap();
        let mut race = RaceEvent {
            key: RaceKey::new("ascot", start, Discipline::Thoroughbred),
            course: "Ascot".to_string(),
            country: "GB".to_string(),
            start_time: start,
            discipline: Discipline::Thoroughbred,
            runners,
            sources: BTreeSet::from(["test".to_string()]),
            live_odds_sources: BTreeSet::new(),
            field_size: 0,
            race_url: None,
            conflicts: Vec::new(),
        };
        race.refresh_derived();
        race
    }

    // -- Enum tests --

    #[test]
    fn test_discipline_from_str() {
        assert_eq!("Greyhounds".parse::<Discipline>().unwrap(), Discipline::Greyhound);
        assert_eq!("standardbred".parse::<Discipline>().unwrap(), Discipline::Harness);
        assert_eq!("flat".parse::<Discipline>().unwrap(), Discipline::Thoroughbred);
        assert!("camel".parse::<Discipline>().is_err());
    }

    #[test]
    fn test_discipline_infer() {
        assert_eq!(Discipline::infer("Romford Greyhound Stadium A5"), Some(Discipline::Greyhound));
        assert_eq!(Discipline::infer("Trotters Mile"), Some(Discipline::Harness));
        assert_eq!(Discipline::infer("Maiden Stakes"), None);
    }

    #[test]
    fn test_runner_status_tokens() {
        assert_eq!(RunnerStatus::from_token(None), RunnerStatus::Confirmed);
        assert_eq!(RunnerStatus::from_token(Some("NR")), RunnerStatus::Withdrawn);
        assert_eq!(RunnerStatus::from_token(Some("Scratched")), RunnerStatus::Withdrawn);
        assert_eq!(RunnerStatus::from_token(Some("reserve")), RunnerStatus::Unknown);
    }

    // -- RaceEvent derived fields --

    #[test]
    fn test_field_size_counts_confirmed_only() {
        let r = race(vec![
            runner("A", Some(dec!(2.0)), RunnerStatus::Confirmed),
            runner("B", Some(dec!(3.0)), RunnerStatus::Withdrawn),
            runner("C", None, RunnerStatus::Unknown),
            runner("D", None, RunnerStatus::Confirmed),
        ]);
        assert_eq!(r.field_size, 2);
    }

    #[test]
    fn test_favorite_ranks_skip_withdrawn_and_unpriced() {
        let r = race(vec![
            runner("Slow", Some(dec!(9.0)), RunnerStatus::Confirmed),
            runner("Gone", Some(dec!(1.2)), RunnerStatus::Withdrawn),
            runner("Quick", Some(dec!(1.8)), RunnerStatus::Confirmed),
            runner("Blank", None, RunnerStatus::Confirmed),
        ]);
        assert_eq!(r.favorite().unwrap().name, "Quick");
        assert_eq!(r.second_favorite().unwrap().name, "Slow");
        assert_eq!(r.odds_spread(), Some(dec!(7.2)));
        assert!(r.runners.iter().find(|x| x.name == "Gone").unwrap().favorite_rank.is_none());
        assert!(r.runners.iter().find(|x| x.name == "Blank").unwrap().favorite_rank.is_none());
    }

    #[test]
    fn test_favorite_rank_tie_breaks_by_name() {
        let r = race(vec![
            runner("Zed", Some(dec!(3.0)), RunnerStatus::Confirmed),
            runner("Amy", Some(dec!(3.0)), RunnerStatus::Confirmed),
        ]);
        assert_eq!(r.favorite().unwrap().name, "Amy");
    }

    #[test]
    fn test_race_key_truncates_to_minute() {
        let a = Utc.with_ymd_and_hms(2026, 10, 18, 14, 30, 5).unwrap();
        let b = Utc.with_ymd_and_hms(2026, 10, 18, 14, 30, 55).unwrap();
        assert_eq!(
            RaceKey::new("ascot", a, Discipline::Thoroughbred),
            RaceKey::new("ascot", b, Discipline::Thoroughbred)
        );
    }

    // -- Scan inputs --

    #[test]
    fn test_date_window_days() {
        let today = NaiveDate::from_ymd_opt(2026, 10, 18).unwrap();
        let w = DateWindow::from_offsets(today, -1, 1);
        let days = w.days();
        assert_eq!(days.len(), 3);
        assert_eq!(days[0], NaiveDate::from_ymd_opt(2026, 10, 17).unwrap());
        assert_eq!(days[2], NaiveDate::from_ymd_opt(2026, 10, 19).unwrap());
    }

    #[test]
    fn test_scan_request_validation() {
        let mut req = ScanRequest {
            days_back: 0,
            days_forward: 1,
            min_field_size: 4,
            max_field_size: 8,
            interactive_fallback: false,
        };
        assert!(req.validate().is_ok());
        req.min_field_size = 9;
        assert!(matches!(req.validate(), Err(ScanError::ConfigInvalid(_))));
        req.min_field_size = 4;
        req.days_back = 2;
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_hints_cache_fragment() {
        let hints = FilterHints { min_field_size: Some(4), max_field_size: None };
        assert_eq!(hints.cache_fragment(), "field=4-*");
    }

    // -- Errors --

    #[test]
    fn test_error_transience() {
        assert!(SourceError::timeout("atr", "slow").is_transient());
        assert!(SourceError::rate_limited("atr", "429").is_transient());
        assert!(SourceError::unreachable("atr", "dns").is_transient());
        assert!(!SourceError::malformed("atr", "bad json").is_transient());
        let corrupt = SourceError::CacheCorruption { key: "k".into(), message: "eof".into() };
        assert!(!corrupt.is_transient());
    }

    #[test]
    fn test_source_status_payload() {
        assert!(SourceStatus::Degraded.has_payload());
        assert!(SourceStatus::Cached.has_payload());
        assert!(!SourceStatus::Failed.has_payload());
        assert!(!SourceStatus::ParseFailed.has_payload());
    }
}
