//! At The Races market movers.
//!
//! One HTML fragment per region per day. Each meeting is a `div.panel`
//! with the course in an `h2`; each race is a `table` whose `caption`
//! starts with the local off time, one runner per row (name, price).
//! Prices are live exchange-style market prices.

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use scraper::Html;
use std::sync::Arc;

use super::{element_text, fetch_pages, parse_pages, selector, HttpFetcher, PageRequest, SourceAdapter};
use crate::types::{
    DateWindow, Discipline, FilterHints, ParseOutcome, PartialRaceEvent, PartialRunner, RawOdds,
    RawPage, RawPayload, SourceError, StartTime,
};

const SOURCE_NAME: &str = "attheraces";
const BASE_URL: &str = "https://www.attheraces.com";

/// Region slug -> ISO country.
pub const REGIONS: &[(&str, &str)] = &[
    ("uk", "GB"),
    ("ireland", "IE"),
    ("usa", "US"),
    ("france", "FR"),
    ("saf", "ZA"),
    ("aus", "AU"),
];

pub fn region_country(region: &str) -> Option<&'static str> {
    REGIONS.iter().find(|(r, _)| *r == region).map(|(_, c)| *c)
}

pub struct AtTheRaces {
    http: Arc<HttpFetcher>,
}

impl AtTheRaces {
    pub fn new(http: Arc<HttpFetcher>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl SourceAdapter for AtTheRaces {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    fn page_requests(&self, window: &DateWindow, _hints: &FilterHints) -> Vec<PageRequest> {
        window
            .days()
            .into_iter()
            .flat_map(|day| {
                REGIONS.iter().map(move |(region, _)| {
                    let url = format!(
                        "{BASE_URL}/ajax/marketmovers/tabs/{region}/{}",
                        day.format("%Y%m%d")
                    );
                    PageRequest::new(url, day).with_region(region)
                })
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

/// Leading `HH:MM` of a caption such as "14:30 Maiden Stakes".
fn caption_time(text: &str) -> Option<NaiveTime> {
    let first = text.split_whitespace().next()?;
    NaiveTime::parse_from_str(first, "%H:%M").ok()
}

fn race_url(course: &str, day: NaiveDate, time: NaiveTime) -> String {
    let slug = course
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-");
    format!(
        "{BASE_URL}/racecard/{}/{}/{}",
        urlencoding::encode(&slug),
        day.format("%Y-%m-%d"),
        time.format("%H%M")
    )
}

pub(crate) fn parse_page(page: &RawPage) -> Result<ParseOutcome, String> {
    let doc = Html::parse_document(&page.body);
    let panel_sel = selector("div.panel")?;
    let heading_sel = selector("h2")?;
    let table_sel = selector("table")?;
    let caption_sel = selector("caption")?;
    let row_sel = selector("tr")?;
    let cell_sel = selector("td, th")?;

    let country = page.region.as_deref().and_then(region_country).map(str::to_string);
    let mut outcome = ParseOutcome::default();
    let mut panels = 0;

    for panel in doc.select(&panel_sel) {
        panels += 1;
        let Some(course) = panel.select(&heading_sel).next().map(|h| element_text(&h)) else {
            outcome.skipped += 1;
            continue;
        };

        for table in panel.select(&table_sel) {
            let Some(time) = table
                .select(&caption_sel)
                .next()
                .and_then(|c| caption_time(&element_text(&c)))
            else {
                outcome.skipped += 1;
                continue;
            };

            let runners: Vec<PartialRunner> = table
                .select(&row_sel)
                .filter_map(|row| {
                    let cells: Vec<String> = row.select(&cell_sel).map(|c| element_text(&c)).collect();
                    let name = cells.first().filter(|n| !n.is_empty())?;
                    let odds = cells.get(1).map(|o| RawOdds::Text(o.clone()));
                    Some(PartialRunner::new(name.clone(), odds))
                })
                .collect();

            if runners.is_empty() {
                outcome.skipped += 1;
                continue;
            }

            outcome.races.push(PartialRaceEvent {
                course: course.clone(),
                country: country.clone(),
                discipline: Some(Discipline::Thoroughbred),
                descriptor: None,
                start: StartTime::Local { date: page.day, time },
                runners,
                live_odds: true,
                race_url: Some(race_url(&course, page.day, time)),
            });
        }
    }

    if panels == 0 && !page.body.contains("marketmovers") && !page.body.contains("<table") {
        return Err("no market mover panels".into());
    }
    Ok(outcome)
}
