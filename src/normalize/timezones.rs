//! Track-local time resolution.
//!
//! Sources print start times in the track's local clock. The timezone is
//! looked up by course key, then by country, and falls back to UTC.

use chrono::{DateTime, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;

/// Course key -> (country, IANA zone). Keys are normalised course names.
const TRACK_ZONES: &[(&str, &str, Tz)] = &[
    // UK and Ireland
    ("ayr", "GB", Tz::Europe__London),
    ("kempton", "GB", Tz::Europe__London),
    ("windsor", "GB", Tz::Europe__London),
    ("ascot", "GB", Tz::Europe__London),
    ("cheltenham", "GB", Tz::Europe__London),
    ("newmarket", "GB", Tz::Europe__London),
    ("romford", "GB", Tz::Europe__London),
    ("crayford", "GB", Tz::Europe__London),
    ("belle vue", "GB", Tz::Europe__London),
    ("leopardstown", "IE", Tz::Europe__Dublin),
    ("curragh", "IE", Tz::Europe__Dublin),
    ("ballinrobe", "IE", Tz::Europe__Dublin),
    // North America
    ("finger lakes", "US", Tz::America__New_York),
    ("presque isle downs", "US", Tz::America__New_York),
    ("thistledown", "US", Tz::America__New_York),
    ("mountaineer", "US", Tz::America__New_York),
    ("churchill", "US", Tz::America__New_York),
    ("belmont", "US", Tz::America__New_York),
    ("saratoga", "US", Tz::America__New_York),
    ("meadowlands", "US", Tz::America__New_York),
    ("ellis", "US", Tz::America__Chicago),
    ("santa anita", "US", Tz::America__Los_Angeles),
    ("del mar", "US", Tz::America__Los_Angeles),
    ("fort erie", "CA", Tz::America__Toronto),
    ("mohawk", "CA", Tz::America__Toronto),
    // France
    ("la teste de buch", "FR", Tz::Europe__Paris),
    ("clairefontaine", "FR", Tz::Europe__Paris),
    ("cagnes sur mer", "FR", Tz::Europe__Paris),
    ("divonne les bains", "FR", Tz::Europe__Paris),
    ("longchamp", "FR", Tz::Europe__Paris),
    ("saint malo", "FR", Tz::Europe__Paris),
    // Australia
    ("flemington", "AU", Tz::Australia__Melbourne),
    ("randwick", "AU", Tz::Australia__Sydney),
    ("menangle", "AU", Tz::Australia__Sydney),
    ("wentworth", "AU", Tz::Australia__Sydney),
    ("eagle farm", "AU", Tz::Australia__Brisbane),
    ("albion", "AU", Tz::Australia__Brisbane),
    ("redcliffe", "AU", Tz::Australia__Brisbane),
    ("gloucester", "AU", Tz::Australia__Perth),
    // Elsewhere
    ("fairview", "ZA", Tz::Africa__Johannesburg),
    ("gavea", "BR", Tz::America__Sao_Paulo),
    ("sha tin", "HK", Tz::Asia__Hong_Kong),
    ("tokyo", "JP", Tz::Asia__Tokyo),
];

const COUNTRY_ZONES: &[(&str, Tz)] = &[
    ("GB", Tz::Europe__London),
    ("IE", Tz::Europe__Dublin),
    ("US", Tz::America__New_York),
    ("FR", Tz::Europe__Paris),
    ("AU", Tz::Australia__Sydney),
    ("NZ", Tz::Pacific__Auckland),
    ("HK", Tz::Asia__Hong_Kong),
    ("JP", Tz::Asia__Tokyo),
    ("ZA", Tz::Africa__Johannesburg),
    ("CA", Tz::America__Toronto),
    ("BR", Tz::America__Sao_Paulo),
];

/// Zone for a course, by track first, then country, else UTC.
pub fn zone_for(course_key: &str, country: Option<&str>) -> Tz {
    if let Some((_, _, tz)) = TRACK_ZONES.iter().find(|(k, _, _)| *k == course_key) {
        return *tz;
    }
    country
        .and_then(|c| {
            let c = c.trim().to_uppercase();
            COUNTRY_ZONES.iter().find(|(k, _)| *k == c).map(|(_, tz)| *tz)
        })
        .unwrap_or(Tz::UTC)
}

/// Default country for a course when a source omits it.
pub fn country_for(course_key: &str) -> Option<&'static str> {
    TRACK_ZONES
        .iter()
        .find(|(k, _, _)| *k == course_key)
        .map(|(_, country, _)| *country)
}

/// Convert a local wall-clock time to UTC. Returns `None` when the local
/// time does not exist (spring-forward gap). Ambiguous times resolve to the
/// earlier instant.
pub fn local_to_utc(date: NaiveDate, time: NaiveTime, tz: Tz) -> Option<DateTime<Utc>> {
    tz.from_local_datetime(&date.and_time(time))
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_zone_lookup_order() {
        assert_eq!(zone_for("santa anita", Some("GB")), Tz::America__Los_Angeles);
        assert_eq!(zone_for("unknown course", Some("ie")), Tz::Europe__Dublin);
        assert_eq!(zone_for("unknown course", None), Tz::UTC);
    }

    #[test]
    fn test_country_for_known_track() {
        assert_eq!(country_for("curragh"), Some("IE"));
        assert_eq!(country_for("flemington"), Some("AU"));
        assert_eq!(country_for("ellis"), Some("US"));
        assert_eq!(country_for("nowhere"), None);
    }

    #[test]
    fn test_london_summer_time() {
        let utc = local_to_utc(d(2026, 7, 1), t(14, 30), Tz::Europe__London).unwrap();
        assert_eq!(utc.format("%H:%M").to_string(), "13:30");
        let winter = local_to_utc(d(2026, 12, 1), t(14, 30), Tz::Europe__London).unwrap();
        assert_eq!(winter.format("%H:%M").to_string(), "14:30");
    }

    #[test]
    fn test_spring_forward_gap_is_none() {
        // Clocks go 01:00 -> 02:00 in London on 2026-03-29.
        assert!(local_to_utc(d(2026, 3, 29), t(1, 30), Tz::Europe__London).is_none());
    }

    #[test]
    fn test_fall_back_takes_earlier() {
        // 01:30 occurs twice in London on 2026-10-25; BST instance is 00:30 UTC.
        let utc = local_to_utc(d(2026, 10, 25), t(1, 30), Tz::Europe__London).unwrap();
        assert_eq!(utc.format("%H:%M").to_string(), "00:30");
    }
}
