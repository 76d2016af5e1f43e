//! Harness Racing Australia fields (JSON API, one document per day).
//!
//! Start times carry a UTC offset and prices are live fixed-odds in
//! decimal form. The API accepts starter-count bounds, so field-size
//! hints are passed through.

use async_trait::async_trait;
use chrono::DateTime;
use rust_decimal::Decimal;
use serde::Deserialize;
use std::sync::Arc;

use super::{fetch_pages, parse_pages, HttpFetcher, PageRequest, SourceAdapter};
use crate::types::{
    DateWindow, Discipline, FilterHints, ParseOutcome, PartialRaceEvent, PartialRunner, RawOdds,
    RawPage, RawPayload, SourceError, StartTime,
};

const SOURCE_NAME: &str = "harness_au";
const BASE_URL: &str = "https://www.harness.org.au/api/fields";

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HraDay {
    #[serde(default)]
    meetings: Vec<HraMeeting>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HraMeeting {
    venue: String,
    #[serde(default)]
    races: Vec<HraRace>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HraRace {
    #[serde(default)]
    start_time: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    horses: Vec<HraHorse>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HraHorse {
    #[serde(default)]
    name: String,
    #[serde(default)]
    fixed_odds: Option<Decimal>,
    #[serde(default)]
    scratched: bool,
}

pub struct HarnessAu {
    http: Arc<HttpFetcher>,
}

impl HarnessAu {
    pub fn new(http: Arc<HttpFetcher>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl SourceAdapter for HarnessAu {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    fn page_requests(&self, window: &DateWindow, hints: &FilterHints) -> Vec<PageRequest> {
        let mut filter = String::new();
        if let Some(min) = hints.min_field_size {
            filter.push_str(&format!("&minStarters={min}"));
        }
        if let Some(max) = hints.max_field_size {
            filter.push_str(&format!("&maxStarters={max}"));
        }
        window
            .days()
            .into_iter()
            .map(|day| {
                PageRequest::new(format!("{BASE_URL}?date={}{filter}", day.format("%Y-%m-%d")), day)
            })
            .collect()
    }

    async fn fetch(&self, window: &DateWindow, hints: &FilterHints) -> Result<RawPayload, SourceError> {
        fetch_pages(&self.http, SOURCE_NAME, self.page_requests(window, hints)).await
    }

    fn parse(&self, payload: &RawPayload) -> Result<ParseOutcome, SourceError> {
        parse_pages(SOURCE_NAME, payload, parse_page)
    }
}

fn parse_page(page: &RawPage) -> Result<ParseOutcome, String> {
    let doc: HraDay = serde_json::from_str(&page.body).map_err(|e| e.to_string())?;
    let mut outcome = ParseOutcome::default();

    for meeting in doc.meetings {
        for race in meeting.races {
            let Some(start) = race
                .start_time
                .as_deref()
                .and_then(|t| DateTime::parse_from_rfc3339(t).ok())
            else {
                outcome.skipped += 1;
                continue;
            };

            let runners = race
                .horses
                .into_iter()
                .map(|h| PartialRunner {
                    name: h.name,
                    odds: h.fixed_odds.map(RawOdds::Decimal),
                    status: h.scratched.then(|| "scratched".to_string()),
                })
                .collect();

            outcome.races.push(PartialRaceEvent {
                course: meeting.venue.clone(),
                country: Some("AU".to_string()),
                discipline: Some(Discipline::Harness),
                descriptor: race.name,
                start: StartTime::Offset(start),
                runners,
                live_odds: true,
                race_url: race.url,
            });
        }
    }

    Ok(outcome)
}
