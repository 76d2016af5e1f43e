//! Sporting Life greyhound racecards (JSON API, one document per day).

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use serde::Deserialize;
use std::sync::Arc;

use super::{fetch_pages, parse_pages, HttpFetcher, PageRequest, SourceAdapter};
use crate::types::{
    DateWindow, Discipline, FilterHints, ParseOutcome, PartialRaceEvent, PartialRunner, RawOdds,
    RawPage, RawPayload, SourceError, StartTime,
};

const SOURCE_NAME: &str = "sportinglife";
const BASE_URL: &str = "https://www.sportinglife.com/api/greyhounds/racecards";

// ---------------------------------------------------------------------------
// API response types
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct SlDay {
    #[serde(default)]
    meetings: Vec<SlMeeting>,
}

#[derive(Debug, Deserialize)]
struct SlMeeting {
    track: String,
    #[serde(default)]
    country: Option<String>,
    #[serde(default)]
    races: Vec<SlRace>,
}

#[derive(Debug, Deserialize)]
struct SlRace {
    #[serde(default)]
    time: Option<String>,
    #[serde(default)]
    date: Option<NaiveDate>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    runners: Vec<SlRunner>,
}

#[derive(Debug, Deserialize)]
struct SlRunner {
    #[serde(default)]
    name: String,
    #[serde(default)]
    odds: Option<String>,
    #[serde(default)]
    status: Option<String>,
}

// ---------------------------------------------------------------------------
// Adapter
// ---------------------------------------------------------------------------

pub struct SportingLife {
    http: Arc<HttpFetcher>,
}

impl SportingLife {
    pub fn new(http: Arc<HttpFetcher>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl SourceAdapter for SportingLife {
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
    let doc: SlDay = serde_json::from_str(&page.body).map_err(|e| e.to_string())?;
    let mut outcome = ParseOutcome::default();

    for meeting in doc.meetings {
        for race in meeting.races {
            let Some(time) = race
                .time
                .as_deref()
                .and_then(|t| NaiveTime::parse_from_str(t.trim(), "%H:%M").ok())
            else {
                outcome.skipped += 1;
                continue;
            };

            let runners = race
                .runners
                .into_iter()
                .map(|r| PartialRunner {
                    name: r.name,
                    odds: r.odds.map(RawOdds::Text),
                    status: r.status,
                })
                .collect();

            outcome.races.push(PartialRaceEvent {
                course: meeting.track.clone(),
                country: meeting.country.clone().or_else(|| Some("GB".to_string())),
                discipline: Some(Discipline::Greyhound),
                descriptor: race.title,
                start: StartTime::Local { date: race.date.unwrap_or(page.day), time },
                runners,
                live_odds: false,
                race_url: race.url,
            });
        }
    }

    Ok(outcome)
}
