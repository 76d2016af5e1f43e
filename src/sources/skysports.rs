//! Sky Sports racecards.
//!
//! One HTML page per day. Each race is a `div.sdc-site-racing-meetings__event`
//! holding a racecard link (course slug in the path), a details line with
//! the off time and optional country in brackets, and runner entries with
//! forecast prices.

use async_trait::async_trait;
use chrono::NaiveTime;
use reqwest::Url;
use scraper::Html;
use std::sync::Arc;

use super::{element_text, fetch_pages, parse_pages, selector, HttpFetcher, PageRequest, SourceAdapter};
use crate::types::{
    DateWindow, Discipline, FilterHints, ParseOutcome, PartialRaceEvent, PartialRunner, RawOdds,
    RawPage, RawPayload, SourceError, StartTime,
};

const SOURCE_NAME: &str = "skysports";
const BASE_URL: &str = "https://www.skysports.com/racing/racecards";

pub struct SkySports {
    http: Arc<HttpFetcher>,
}

impl SkySports {
    pub fn new(http: Arc<HttpFetcher>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl SourceAdapter for SkySports {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    fn page_requests(&self, window: &DateWindow, _hints: &FilterHints) -> Vec<PageRequest> {
        window
            .days()
            .into_iter()
            .map(|day| PageRequest::new(format!("{BASE_URL}/{}", day.format("%d-%m-%Y")), day))
            .collect()
    }

    async fn fetch(&self, window: &DateWindow, hints: &FilterHints) -> Result<RawPayload, SourceError> {
        fetch_pages(&self.http, SOURCE_NAME, self.page_requests(window, hints)).await
    }

    fn parse(&self, payload: &RawPayload) -> Result<ParseOutcome, SourceError> {
        parse_pages(SOURCE_NAME, payload, parse_page)
    }
}

/// First `HH:MM` token in free text.
pub(crate) fn find_hhmm(text: &str) -> Option<NaiveTime> {
    text.split(|c: char| c.is_whitespace() || c == ',' || c == '(' || c == ')')
        .find_map(|tok| NaiveTime::parse_from_str(tok, "%H:%M").ok())
}

/// Country code in brackets, e.g. "14:30 (IRE) 8 runners" -> "IE".
fn bracket_country(text: &str) -> Option<String> {
    let start = text.find('(')?;
    let end = text[start..].find(')')? + start;
    let code = text[start + 1..end].trim().to_uppercase();
    let iso = match code.as_str() {
        "IRE" => "IE",
        "FR" | "FRA" => "FR",
        "USA" => "US",
        "SAF" => "ZA",
        "AUS" => "AU",
        "GB" | "UK" => "GB",
        _ => return None,
    };
    Some(iso.to_string())
}

/// Course name from `/racing/racecards/{course}/{date}/{id}`.
fn course_from_link(url: &Url) -> Option<String> {
    let mut parts = url.path_segments()?;
    parts.find(|p| *p == "racecards")?;
    let slug = parts.next().filter(|s| !s.is_empty())?;
    Some(slug.replace('-', " "))
}

pub(crate) fn parse_page(page: &RawPage) -> Result<ParseOutcome, String> {
    let doc = Html::parse_document(&page.body);
    let event_sel = selector("div.sdc-site-racing-meetings__event")?;
    let link_sel = selector("a.sdc-site-racing-meetings__event-link")?;
    let details_sel = selector("span.sdc-site-racing-meetings__event-details")?;
    let runner_sel = selector(".sdc-site-racing-meetings__runner")?;
    let name_sel = selector(".sdc-site-racing-meetings__runner-name")?;
    let odds_sel = selector(".sdc-site-racing-meetings__runner-odds")?;
    let status_sel = selector(".sdc-site-racing-meetings__runner-status")?;

    let base = Url::parse(&page.url).map_err(|e| format!("bad page url: {e}"))?;
    let mut outcome = ParseOutcome::default();
    let mut events = 0;

    for event in doc.select(&event_sel) {
        events += 1;
        let link = event
            .select(&link_sel)
            .next()
            .and_then(|a| a.value().attr("href"))
            .and_then(|href| base.join(href).ok());
        let details = event.select(&details_sel).next().map(|d| element_text(&d));

        let (Some(link), Some(details)) = (link, details) else {
            outcome.skipped += 1;
            continue;
        };
        let (Some(course), Some(time)) = (course_from_link(&link), find_hhmm(&details)) else {
            outcome.skipped += 1;
            continue;
        };

        let runners: Vec<PartialRunner> = event
            .select(&runner_sel)
            .filter_map(|r| {
                let name = r.select(&name_sel).next().map(|n| element_text(&n))?;
                let odds = r.select(&odds_sel).next().map(|o| RawOdds::Text(element_text(&o)));
                let status = r.select(&status_sel).next().map(|s| element_text(&s));
                Some(PartialRunner { name, odds, status })
            })
            .collect();

        outcome.races.push(PartialRaceEvent {
            course,
            country: bracket_country(&details).or_else(|| Some("GB".to_string())),
            discipline: Some(Discipline::Thoroughbred),
            descriptor: Some(details),
            start: StartTime::Local { date: page.day, time },
            runners,
            live_odds: false,
            race_url: Some(link.to_string()),
        });
    }

    if events == 0 && !page.body.contains("sdc-site-racing") {
        return Err("no racing meetings markup".into());
    }
    Ok(outcome)
}
