//! Normalizer: partial source records -> canonical `RaceEvent`s.
//!
//! Converts odds to decimal, resolves start times to UTC, assigns the
//! discipline and derives the course key through the alias table.
//! Malformed runners are dropped and counted; a race is only rejected when
//! it cannot be identified (no course, or a local time that never occurs).

pub mod courses;
pub mod odds;
pub mod timezones;

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use std::collections::{BTreeSet, HashMap};
use tracing::debug;

use crate::types::{
    Discipline, PartialRaceEvent, PartialRunner, RaceEvent, RaceKey, Runner, RunnerStatus,
    StartTime,
};
use courses::{display_name, CourseAliases};
use odds::Quote;

/// Placeholder country code when neither the source nor the track table knows.
pub const UNKNOWN_COUNTRY: &str = "ZZ";

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum NormalizeError {
    #[error("race has no course name")]
    MissingCourse,

    #[error("{course}: local time {date} {time} does not exist in {zone}")]
    NonexistentLocalTime {
        course: String,
        date: NaiveDate,
        time: NaiveTime,
        zone: String,
    },
}

/// A normalised race plus the count of runners that were unusable.
#[derive(Debug, Clone)]
pub struct Normalized {
    pub race: RaceEvent,
    pub dropped_runners: usize,
}

/// Everything normalised from one source's parse outcome.
#[derive(Debug, Clone, Default)]
pub struct NormalizedBatch {
    pub races: Vec<RaceEvent>,
    pub dropped_runners: usize,
    pub rejected_races: usize,
}

/// Matching key for runner names across sources: case, punctuation and
/// bred-in suffixes such as "(IRE)" are ignored.
pub fn runner_key(name: &str) -> String {
    let base = name.split('(').next().unwrap_or(name);
    base.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

fn clean_runner_name(name: &str) -> String {
    name.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[derive(Debug, Clone, Default)]
pub struct Normalizer {
    aliases: CourseAliases,
}

impl Normalizer {
    pub fn new(aliases: CourseAliases) -> Self {
        Self { aliases }
    }

    pub fn aliases(&self) -> &CourseAliases {
        &self.aliases
    }

    /// Normalise every partial record from one source.
    pub fn normalize_all(
        &self,
        partials: &[PartialRaceEvent],
        source: &str,
        observed_at: DateTime<Utc>,
    ) -> NormalizedBatch {
        let mut batch = NormalizedBatch::default();
        for partial in partials {
            match self.normalize(partial, source, observed_at) {
                Ok(n) => {
                    batch.dropped_runners += n.dropped_runners;
                    batch.races.push(n.race);
                }
                Err(e) => {
                    debug!(source, error = %e, "Race rejected during normalisation");
                    batch.rejected_races += 1;
                }
            }
        }
        batch
    }

    pub fn normalize(
        &self,
        partial: &PartialRaceEvent,
        source: &str,
        observed_at: DateTime<Utc>,
    ) -> Result<Normalized, NormalizeError> {
        let course_key = self.aliases.course_key(&partial.course);
        if course_key.is_empty() {
            return Err(NormalizeError::MissingCourse);
        }

        let country = partial
            .country
            .as_deref()
            .map(|c| c.trim().to_uppercase())
            .filter(|c| !c.is_empty())
            .or_else(|| timezones::country_for(&course_key).map(str::to_string))
            .unwrap_or_else(|| UNKNOWN_COUNTRY.to_string());

        let start_time = match &partial.start {
            StartTime::Utc(t) => *t,
            StartTime::Offset(t) => t.with_timezone(&Utc),
            StartTime::Local { date, time } => {
                let zone = timezones::zone_for(&course_key, Some(&country));
                timezones::local_to_utc(*date, *time, zone).ok_or_else(|| {
                    NormalizeError::NonexistentLocalTime {
                        course: partial.course.clone(),
                        date: *date,
                        time: *time,
                        zone: zone.name().to_string(),
                    }
                })?
            }
        };

        let discipline = partial
            .discipline
            .or_else(|| partial.descriptor.as_deref().and_then(Discipline::infer))
            .or_else(|| Discipline::infer(&partial.course))
            .unwrap_or(Discipline::Thoroughbred);

        let (runners, dropped_runners) = self.normalize_runners(&partial.runners, source, observed_at);

        let mut live_odds_sources = BTreeSet::new();
        if partial.live_odds && runners.iter().any(Runner::has_odds) {
            live_odds_sources.insert(source.to_string());
        }

        let mut race = RaceEvent {
            key: RaceKey::new(course_key, start_time, discipline),
            course: display_name(&partial.course),
            country,
            start_time,
            discipline,
            runners,
            sources: BTreeSet::from([source.to_string()]),
            live_odds_sources,
            field_size: 0,
            race_url: partial.race_url.clone(),
            conflicts: Vec::new(),
        };
        race.refresh_derived();

        Ok(Normalized { race, dropped_runners })
    }

    fn normalize_runners(
        &self,
        partials: &[PartialRunner],
        source: &str,
        observed_at: DateTime<Utc>,
    ) -> (Vec<Runner>, usize) {
        let mut runners: Vec<Runner> = Vec::with_capacity(partials.len());
        let mut index: HashMap<String, usize> = HashMap::new();
        let mut dropped = 0;

        for p in partials {
            let name = clean_runner_name(&p.name);
            let key = runner_key(&name);
            if key.is_empty() {
                dropped += 1;
                continue;
            }

            let mut status = RunnerStatus::from_token(p.status.as_deref());
            let odds = match p.odds.as_ref().map(odds::convert) {
                None => None,
                Some(Ok(Quote::Price(d))) => Some(d),
                Some(Ok(Quote::Unpriced)) => None,
                Some(Ok(Quote::Withdrawn)) => {
                    status = RunnerStatus::Withdrawn;
                    None
                }
                Some(Err(e)) => {
                    debug!(source, runner = %name, error = %e, "Dropping runner with bad odds");
                    dropped += 1;
                    continue;
                }
            };

            let runner = Runner {
                name,
                odds,
                status,
                favorite_rank: None,
                source: source.to_string(),
                observed_at,
            };

            match index.get(&key) {
                // Same runner listed twice by one source: keep the priced copy.
                Some(&i) => {
                    if !runners[i].has_odds() && runner.has_odds() {
                        runners[i] = runner;
                    }
                }
                None => {
                    index.insert(key, runners.len());
                    runners.push(runner);
                }
            }
        }

        (runners, dropped)
    }
}
