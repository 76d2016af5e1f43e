//! Cross-source deduplication.
//!
//! Records sharing a `RaceKey` are merged into one canonical race. Runner
//! lists are unioned by name; priced data always beats unpriced data, and
//! between two prices the later observation wins. Disagreements are kept
//! on the race as `MergeConflict`s and never block the merge.

use std::collections::{BTreeMap, HashMap};
use tracing::debug;

use crate::normalize::{runner_key, UNKNOWN_COUNTRY};
use crate::types::{MergeConflict, RaceEvent, RaceKey, Runner, RunnerStatus};

/// Merge every record sharing an identity. Output is ordered by key, so the
/// result does not depend on the order sources finished in.
pub fn aggregate(races: Vec<RaceEvent>) -> Vec<RaceEvent> {
    let input = races.len();
    let mut merged: BTreeMap<RaceKey, RaceEvent> = BTreeMap::new();

    for race in races {
        match merged.get_mut(&race.key) {
            Some(existing) => merge_race(existing, race),
            None => {
                merged.insert(race.key.clone(), race);
            }
        }
    }

    let out: Vec<RaceEvent> = merged
        .into_values()
        .map(|mut race| {
            race.refresh_derived();
            race
        })
        .collect();

    debug!(input, merged = out.len(), "Aggregated race records");
    out
}

/// Fold `incoming` into `base`. Both must share a key.
pub fn merge_race(base: &mut RaceEvent, incoming: RaceEvent) {
    let reporter = incoming
        .sources
        .iter()
        .next()
        .cloned()
        .unwrap_or_default();

    // -- Race attributes -------------------------------------------------

    if incoming.start_time != base.start_time {
        base.conflicts.push(MergeConflict::StartTime {
            source: reporter.clone(),
            reported: incoming.start_time,
            kept: base.start_time,
        });
    }

    if base.country == UNKNOWN_COUNTRY {
        base.country = incoming.country;
    } else if incoming.country != UNKNOWN_COUNTRY && incoming.country != base.country {
        base.conflicts.push(MergeConflict::Country {
            source: reporter,
            reported: incoming.country,
            kept: base.country.clone(),
        });
    }

    if base.race_url.is_none() {
        base.race_url = incoming.race_url;
    }

    base.sources.extend(incoming.sources);
    base.live_odds_sources.extend(incoming.live_odds_sources);
    base.conflicts.extend(incoming.conflicts);

    // -- Runners ---------------------------------------------------------

    let mut index: HashMap<String, usize> = base
        .runners
        .iter()
        .enumerate()
        .map(|(i, r)| (runner_key(&r.name), i))
        .collect();

    for runner in incoming.runners {
        let key = runner_key(&runner.name);
        match index.get(&key) {
            Some(&i) => {
                if let Some(conflict) = merge_runner(&mut base.runners[i], runner) {
                    base.conflicts.push(conflict);
                }
            }
            None => {
                index.insert(key, base.runners.len());
                base.runners.push(runner);
            }
        }
    }

    base.refresh_derived();
}

fn merged_status(a: RunnerStatus, b: RunnerStatus) -> RunnerStatus {
    use RunnerStatus::*;
    match (a, b) {
        (Withdrawn, _) | (_, Withdrawn) => Withdrawn,
        (Confirmed, _) | (_, Confirmed) => Confirmed,
        _ => Unknown,
    }
}

/// Merge two sightings of the same runner. Returns a conflict when both
/// carried different prices.
fn merge_runner(existing: &mut Runner, incoming: Runner) -> Option<MergeConflict> {
    existing.status = merged_status(existing.status, incoming.status);

    match (existing.odds, incoming.odds) {
        (None, Some(_)) => {
            existing.odds = incoming.odds;
            existing.source = incoming.source;
            existing.observed_at = incoming.observed_at;
            None
        }
        (Some(kept), Some(reported)) if kept != reported => {
            if incoming.observed_at > existing.observed_at {
                let conflict = MergeConflict::RunnerOdds {
                    runner: existing.name.clone(),
                    source: existing.source.clone(),
                    reported: kept,
                    kept: reported,
                };
                existing.odds = Some(reported);
                existing.source = incoming.source;
                existing.observed_at = incoming.observed_at;
                Some(conflict)
            } else {
                Some(MergeConflict::RunnerOdds {
                    runner: existing.name.clone(),
                    source: incoming.source,
                    reported,
                    kept,
                })
            }
        }
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Discipline;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;
    use std::collections::BTreeSet;

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 10, 18, h, m, s).unwrap()
    }

    fn runner(name: &str, odds: Option<Decimal>, source: &str, seen: DateTime<Utc>) -> Runner {
        Runner {
            name: name.into(),
            odds,
            status: RunnerStatus::Confirmed,
            favorite_rank: None,
            source: source.into(),
            observed_at: seen,
        }
    }

    fn race(course_key: &str, start: DateTime<Utc>, source: &str, runners: Vec<Runner>) -> RaceEvent {
        let mut r = RaceEvent {
            key: RaceKey::new(course_key, start, Discipline::Thoroughbred),
            course: course_key.into(),
            country: "GB".into(),
            start_time: start,
            discipline: Discipline::Thoroughbred,
            runners,
            sources: BTreeSet::from([source.to_string()]),
            live_odds_sources: BTreeSet::new(),
            field_size: 0,
            race_url: None,
            conflicts: Vec::new(),
        };
        r.refresh_derived();
        r
    }

    #[test]
    fn test_same_race_from_two_sources_merges() {
        let t = at(14, 30, 0);
        let a = race(
            "ascot",
            t,
            "skysports",
            vec![
                runner("Alpha", None, "skysports", t),
                runner("Bravo", None, "skysports", t),
                runner("Charlie", None, "skysports", t),
            ],
        );
        let b = race(
            "ascot",
            t,
            "attheraces",
            vec![
                runner("ALPHA", Some(dec!(2.5)), "attheraces", t),
                runner("Bravo", Some(dec!(4.0)), "attheraces", t),
                runner("Charlie", Some(dec!(6.0)), "attheraces", t),
            ],
        );

        let out = aggregate(vec![a, b]);
        assert_eq!(out.len(), 1);
        let merged = &out[0];
        assert_eq!(merged.sources.len(), 2);
        assert_eq!(merged.field_size, 3);
        assert!(merged.runners.iter().all(|r| r.has_odds()));
        assert_eq!(merged.favorite().unwrap().name, "Alpha");
        assert!(merged.conflicts.is_empty());
    }

    #[test]
    fn test_priced_runner_never_replaced_by_unpriced() {
        let t = at(14, 30, 0);
        let priced = race("ascot", t, "a", vec![runner("Alpha", Some(dec!(3.0)), "a", t)]);
        let later_unpriced = race(
            "ascot",
            t,
            "b",
            vec![runner("Alpha", None, "b", t + Duration::minutes(5))],
        );
        let out = aggregate(vec![priced, later_unpriced]);
        assert_eq!(out[0].runners[0].odds, Some(dec!(3.0)));
        assert_eq!(out[0].runners[0].source, "a");
    }

    #[test]
    fn test_newer_price_wins_and_conflict_recorded() {
        let t = at(14, 30, 0);
        let old = race("ascot", t, "a", vec![runner("Alpha", Some(dec!(3.0)), "a", t)]);
        let new = race(
            "ascot",
            t,
            "b",
            vec![runner("Alpha", Some(dec!(2.5)), "b", t + Duration::minutes(2))],
        );

        let out = aggregate(vec![old, new]);
        let alpha = &out[0].runners[0];
        assert_eq!(alpha.odds, Some(dec!(2.5)));
        assert_eq!(alpha.source, "b");
        assert_eq!(
            out[0].conflicts,
            vec![MergeConflict::RunnerOdds {
                runner: "Alpha".into(),
                source: "a".into(),
                reported: dec!(3.0),
                kept: dec!(2.5),
            }]
        );
    }

    #[test]
    fn test_field_size_not_summed() {
        let t = at(19, 2, 0);
        let names = ["One", "Two", "Three", "Four"];
        let mk = |src: &str| {
            race("romford", t, src, names.iter().map(|n| runner(n, None, src, t)).collect())
        };
        let out = aggregate(vec![mk("a"), mk("b"), mk("c")]);
        assert_eq!(out[0].field_size, 4);
        assert_eq!(out[0].runners.len(), 4);
    }

    #[test]
    fn test_withdrawal_is_sticky() {
        let t = at(19, 2, 0);
        let mut scratched = runner("Alpha", None, "a", t);
        scratched.status = RunnerStatus::Withdrawn;
        let a = race("romford", t, "a", vec![scratched, runner("Bravo", None, "a", t)]);
        let b = race(
            "romford",
            t,
            "b",
            vec![runner("Alpha", Some(dec!(2.0)), "b", t), runner("Bravo", None, "b", t)],
        );
        let out = aggregate(vec![a, b]);
        assert_eq!(out[0].runners[0].status, RunnerStatus::Withdrawn);
        assert_eq!(out[0].field_size, 1);
        assert!(out[0].favorite().is_none());
    }

    #[test]
    fn test_start_seconds_disagreement_kept_as_conflict() {
        let a = race("ascot", at(14, 30, 0), "a", vec![]);
        let b = race("ascot", at(14, 30, 40), "b", vec![]);
        assert_eq!(a.key, b.key);

        let out = aggregate(vec![a, b]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].start_time, at(14, 30, 0));
        assert!(matches!(out[0].conflicts[0], MergeConflict::StartTime { .. }));
    }

    #[test]
    fn test_unknown_country_filled_without_conflict() {
        let t = at(14, 30, 0);
        let mut a = race("ascot", t, "a", vec![]);
        a.country = UNKNOWN_COUNTRY.into();
        let b = race("ascot", t, "b", vec![]);
        let mut c = race("ascot", t, "c", vec![]);
        c.country = "IE".into();

        let out = aggregate(vec![a, b, c]);
        assert_eq!(out[0].country, "GB");
        assert_eq!(out[0].conflicts.len(), 1);
    }

    #[test]
    fn test_unmatched_races_pass_through() {
        let t = at(14, 30, 0);
        let a = race("ascot", t, "a", vec![runner("Alpha", Some(dec!(2.0)), "a", t)]);
        let b = race("ascot", t + Duration::minutes(35), "a", vec![]);
        let c = race("york", t, "b", vec![]);
        let out = aggregate(vec![c, b, a]);
        assert_eq!(out.len(), 3);
        assert!(out.iter().all(|r| r.sources.len() == 1));
        assert_eq!(out[0].key.course_key, "ascot");
        assert_eq!(out[0].start_time, t);
    }
}
