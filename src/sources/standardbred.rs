//! Standardbred Canada entries (JSON API, one document per day).
//!
//! Post times are track-local; morning lines arrive either as a moneyline
//! number or as a text quote.

use async_trait::async_trait;
use chrono::NaiveTime;
use serde::Deserialize;
use serde_json::Value;
use std::sync::Arc;

use super::{fetch_pages, parse_pages, HttpFetcher, PageRequest, SourceAdapter};
use crate::types::{
    DateWindow, Discipline, FilterHints, ParseOutcome, PartialRaceEvent, PartialRunner, RawOdds,
    RawPage, RawPayload, SourceError, StartTime,
};

const SOURCE_NAME: &str = "standardbred_ca";
const BASE_URL: &str = "https://standardbredcanada.ca/api/entries";

#[derive(Debug, Deserialize)]
struct ScDay {
    #[serde(default)]
    cards: Vec<ScCard>,
}

#[derive(Debug, Deserialize)]
struct ScCard {
    track: String,
    #[serde(default)]
    country: Option<String>,
    #[serde(default)]
    races: Vec<ScRace>,
}

#[derive(Debug, Deserialize)]
struct ScRace {
    #[serde(default)]
    post_time: Option<String>,
    #[serde(default)]
    gait: Option<String>,
    #[serde(default)]
    entries: Vec<ScEntry>,
}

#[derive(Debug, Deserialize)]
struct ScEntry {
    #[serde(default)]
    horse: String,
    #[serde(default)]
    morning_line: Option<Value>,
    #[serde(default)]
    scratched: bool,
}

fn morning_line(v: Value) -> Option<RawOdds> {
    match v {
        Value::Number(n) => n.as_i64().and_then(|m| i32::try_from(m).ok()).map(RawOdds::Moneyline),
        Value::String(s) => Some(RawOdds::Text(s)),
        _ => None,
    }
}

pub struct StandardbredCa {
    http: Arc<HttpFetcher>,
}

impl StandardbredCa {
    pub fn new(http: Arc<HttpFetcher>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl SourceAdapter for StandardbredCa {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    fn page_requests(&self, window: &DateWindow, _hints: &FilterHints) -> Vec<PageRequest> {
        window
            .days()
            .into_iter()
            .map(|day| PageRequest::new(format!("{BASE_URL}/{}", day.format("%Y-%m-%d")), day))
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
    let doc: ScDay = serde_json::from_str(&page.body).map_err(|e| e.to_string())?;
    let mut outcome = ParseOutcome::default();

    for card in doc.cards {
        for race in card.races {
            let Some(time) = race
                .post_time
                .as_deref()
                .and_then(|t| NaiveTime::parse_from_str(t.trim(), "%H:%M").ok())
            else {
                outcome.skipped += 1;
                continue;
            };

            let runners = race
                .entries
                .into_iter()
                .map(|e| PartialRunner {
                    name: e.horse,
                    odds: e.morning_line.and_then(morning_line),
                    status: e.scratched.then(|| "scratched".to_string()),
                })
                .collect();

            outcome.races.push(PartialRaceEvent {
                course: card.track.clone(),
                country: card.country.clone().or_else(|| Some("CA".to_string())),
                discipline: Some(Discipline::Harness),
                descriptor: race.gait,
                start: StartTime::Local { date: page.day, time },
                runners,
                live_odds: false,
                race_url: None,
            });
        }
    }

    Ok(outcome)
}
