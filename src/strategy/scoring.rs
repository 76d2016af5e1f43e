//! Race value scoring.
//!
//! A pure function of a canonical race: four banded sub-scores combined by
//! weight, then multiplied by any bonuses that apply, clamped to [0, 100].
//! All odds comparisons use canonical decimal odds. A value sitting exactly
//! on a band boundary belongs to the more favourable band.

use rust_decimal::prelude::*;
use rust_decimal_macros::dec;
use std::cmp::Ordering;
use tracing::debug;

use crate::types::{Bonus, Discipline, RaceEvent, RankedRace, ScoreResult};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Sub-score weights. They sum to 1.0.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringWeights {
    pub field_size: f64,
    pub favorite_odds: f64,
    pub spread: f64,
    pub data_quality: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            field_size: 0.35,
            favorite_odds: 0.45,
            spread: 0.15,
            data_quality: 0.05,
        }
    }
}

/// Field sizes that earn the sweet-spot bonus (inclusive).
pub const SWEET_SPOT_FIELD: (usize, usize) = (3, 5);

/// Spread at or above which the top spread band (and sweet-spot bonus) applies.
pub const TOP_SPREAD: Decimal = dec!(2.0);

/// Upper-inclusive favourite odds bands: (max decimal odds, score).
const FAVORITE_BANDS: &[(Decimal, f64)] = &[
    (dec!(1.5), 100.0),
    (dec!(2.5), 90.0),
    (dec!(4.0), 75.0),
];
const FAVORITE_LONG: f64 = 40.0;
const FAVORITE_UNPRICED: f64 = 30.0;

/// Lower-inclusive spread bands: (min spread, score).
const SPREAD_BANDS: &[(Decimal, f64)] = &[
    (TOP_SPREAD, 100.0),
    (dec!(1.5), 90.0),
    (dec!(1.0), 80.0),
];
const SPREAD_NARROW: f64 = 40.0;
const SPREAD_UNKNOWN: f64 = 50.0;

// ---------------------------------------------------------------------------
// Sub-scores
// ---------------------------------------------------------------------------

pub fn field_size_score(field_size: usize) -> f64 {
    match field_size {
        3..=5 => 100.0,
        6..=8 => 85.0,
        9..=12 => 60.0,
        0..=2 => 30.0,
        _ => 20.0,
    }
}

pub fn favorite_odds_score(race: &RaceEvent) -> f64 {
    if race.active_runners().next().is_none() {
        return 0.0;
    }
    let Some(odds) = race.favorite().and_then(|r| r.odds) else {
        return FAVORITE_UNPRICED;
    };
    FAVORITE_BANDS
        .iter()
        .find(|(max, _)| odds <= *max)
        .map(|(_, score)| *score)
        .unwrap_or(FAVORITE_LONG)
}

pub fn spread_score(race: &RaceEvent) -> f64 {
    let Some(spread) = race.odds_spread() else {
        return SPREAD_UNKNOWN;
    };
    SPREAD_BANDS
        .iter()
        .find(|(min, _)| spread >= *min)
        .map(|(_, score)| *score)
        .unwrap_or(SPREAD_NARROW)
}

/// Percentage of non-withdrawn runners with a known price.
pub fn data_quality_score(race: &RaceEvent) -> f64 {
    let (total, priced) = race
        .active_runners()
        .fold((0usize, 0usize), |(t, p), r| (t + 1, p + usize::from(r.has_odds())));
    if total == 0 {
        return 0.0;
    }
    100.0 * priced as f64 / total as f64
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct ScoringEngine {
    weights: ScoringWeights,
}

impl ScoringEngine {
    pub fn new(weights: ScoringWeights) -> Self {
        Self { weights }
    }

    /// Bonuses that apply to a race, in a fixed order.
    pub fn bonuses(race: &RaceEvent) -> Vec<Bonus> {
        let mut bonuses = Vec::new();
        if race.has_live_odds() {
            bonuses.push(Bonus::LiveOdds);
        }
        if race.discipline == Discipline::Greyhound {
            bonuses.push(Bonus::Greyhound);
        }
        let (lo, hi) = SWEET_SPOT_FIELD;
        let top_spread = race.odds_spread().is_some_and(|s| s >= TOP_SPREAD);
        if (lo..=hi).contains(&race.field_size) && top_spread {
            bonuses.push(Bonus::SweetSpot);
        }
        bonuses
    }

    pub fn score(&self, race: &RaceEvent) -> ScoreResult {
        let w = &self.weights;
        let field_size_score = field_size_score(race.field_size);
        let favorite_odds_score = favorite_odds_score(race);
        let spread_score = spread_score(race);
        let data_quality_score = data_quality_score(race);

        let base_score = w.field_size * field_size_score
            + w.favorite_odds * favorite_odds_score
            + w.spread * spread_score
            + w.data_quality * data_quality_score;

        let bonuses = Self::bonuses(race);
        let multiplied = bonuses.iter().fold(base_score, |acc, b| acc * b.multiplier());
        let final_score = multiplied.clamp(0.0, 100.0);

        ScoreResult {
            key: race.key.clone(),
            field_size_score,
            favorite_odds_score,
            spread_score,
            data_quality_score,
            base_score,
            bonuses,
            final_score,
        }
    }

    /// Score and sort: final score descending, then field size ascending,
    /// then course name, then start time.
    pub fn rank(&self, races: Vec<RaceEvent>) -> Vec<RankedRace> {
        let mut ranked: Vec<RankedRace> = races
            .into_iter()
            .map(|race| {
                let score = self.score(&race);
                RankedRace { race, score }
            })
            .collect();
        ranked.sort_by(compare_ranked);
        debug!(count = ranked.len(), "Races ranked");
        ranked
    }
}

fn compare_ranked(a: &RankedRace, b: &RankedRace) -> Ordering {
    b.score
        .final_score
        .total_cmp(&a.score.final_score)
        .then_with(|| a.race.field_size.cmp(&b.race.field_size))
        .then_with(|| a.race.course.cmp(&b.race.course))
        .then_with(|| a.race.start_time.cmp(&b.race.start_time))
}
