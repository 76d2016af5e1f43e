//! Racing Post racecards.
//!
//! One HTML page per day covering every code it carries, so the discipline
//! is left to the normaliser to infer from the race title.

use async_trait::async_trait;
use scraper::Html;
use std::sync::Arc;

use super::skysports::find_hhmm;
use super::{element_text, fetch_pages, parse_pages, selector, HttpFetcher, PageRequest, SourceAdapter};
use crate::types::{
    DateWindow, FilterHints, ParseOutcome, PartialRaceEvent, PartialRunner, RawOdds, RawPage,
    RawPayload, SourceError, StartTime,
};

const SOURCE_NAME: &str = "racingpost";
const BASE_URL: &str = "https://www.racingpost.com";

pub struct RacingPost {
    http: Arc<HttpFetcher>,
}

impl RacingPost {
    pub fn new(http: Arc<HttpFetcher>) -> Self {
        Self { http }
    }
}

#[async_trait]
impl SourceAdapter for RacingPost {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    fn page_requests(&self, window: &DateWindow, _hints: &FilterHints) -> Vec<PageRequest> {
        window
            .days()
            .into_iter()
            .map(|day| PageRequest::new(format!("{BASE_URL}/racecards/{}", day.format("%Y-%m-%d")), day))
            .collect()
    }

    async fn fetch(&self, window: &DateWindow, hints: &FilterHints) -> Result<RawPayload, SourceError> {
        fetch_pages(&self.http, SOURCE_NAME, self.page_requests(window, hints)).await
    }

    fn parse(&self, payload: &RawPayload) -> Result<ParseOutcome, SourceError> {
        parse_pages(SOURCE_NAME, payload, parse_page)
    }
}

pub(crate) fn parse_page(page: &RawPage) -> Result<ParseOutcome, String> {
    let doc = Html::parse_document(&page.body);
    let meeting_sel = selector("div.rp-meeting")?;
    let course_sel = selector(".rp-meeting__course")?;
    let country_sel = selector(".rp-meeting__country")?;
    let race_sel = selector("div.rp-race")?;
    let time_sel = selector(".rp-race__time")?;
    let title_sel = selector(".rp-race__title")?;
    let link_sel = selector("a.rp-race__link")?;
    let runner_sel = selector("tr.rp-runner")?;
    let name_sel = selector(".rp-runner__name")?;
    let odds_sel = selector(".rp-runner__odds")?;
    let status_sel = selector(".rp-runner__status")?;

    let mut outcome = ParseOutcome::default();
    let mut meetings = 0;

    for meeting in doc.select(&meeting_sel) {
        meetings += 1;
        let Some(course) = meeting.select(&course_sel).next().map(|c| element_text(&c)) else {
            outcome.skipped += 1;
            continue;
        };
        let country = meeting
            .select(&country_sel)
            .next()
            .map(|c| element_text(&c))
            .filter(|c| !c.is_empty());

        for race in meeting.select(&race_sel) {
            let Some(time) = race
                .select(&time_sel)
                .next()
                .and_then(|t| find_hhmm(&element_text(&t)))
            else {
                outcome.skipped += 1;
                continue;
            };
            let title = race.select(&title_sel).next().map(|t| element_text(&t));
            let link = race
                .select(&link_sel)
                .next()
                .and_then(|a| a.value().attr("href"))
                .map(|href| {
                    if href.starts_with("http") {
                        href.to_string()
                    } else {
                        format!("{BASE_URL}{href}")
                    }
                });

            let runners: Vec<PartialRunner> = race
                .select(&runner_sel)
                .filter_map(|r| {
                    let name = r.select(&name_sel).next().map(|n| element_text(&n))?;
                    let odds = r.select(&odds_sel).next().map(|o| RawOdds::Text(element_text(&o)));
                    let status = r
                        .select(&status_sel)
                        .next()
                        .map(|s| element_text(&s))
                        .filter(|s| !s.is_empty());
                    Some(PartialRunner { name, odds, status })
                })
                .collect();

            outcome.races.push(PartialRaceEvent {
                course: course.clone(),
                country: country.clone(),
                discipline: None,
                descriptor: title,
                start: StartTime::Local { date: page.day, time },
                runners,
                live_odds: false,
                race_url: link,
            });
        }
    }

    if meetings == 0 && !page.body.contains("rp-") {
        return Err("no racecard meetings".into());
    }
    Ok(outcome)
}
