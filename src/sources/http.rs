//! Shared HTTP fetcher for all site adapters.
//!
//! Maps transport failures and HTTP statuses onto the `SourceError`
//! taxonomy, detects bot-challenge pages, and follows a single
//! `<meta http-equiv="refresh">` redirect.

use anyhow::{Context, Result};
use rand::seq::SliceRandom;
use reqwest::{Client, StatusCode, Url};
use scraper::{Html, Selector};
use std::time::Duration;
use tracing::{debug, warn};

use crate::types::SourceError;

const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/126.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 14_5) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.5 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64; rv:127.0) Gecko/20100101 Firefox/127.0",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:127.0) Gecko/20100101 Firefox/127.0",
];

/// Phrases that only appear on bot-challenge or block pages.
const BLOCK_MARKERS: &[&str] = &[
    "just a moment...",
    "verify you are a human",
    "checking your browser",
    "access denied",
    "attention required! | cloudflare",
    "enable javascript and cookies to continue",
];

pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Build a fetcher. `timeout` bounds each HTTP request; the scheduler
    /// applies its own per-call timeout on top.
    pub fn new(timeout: Duration) -> Result<Self> {
        let ua = USER_AGENTS
            .choose(&mut rand::thread_rng())
            .copied()
            .unwrap_or(USER_AGENTS[0]);

        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::ACCEPT,
            "text/html,application/xhtml+xml,application/json;q=0.9,*/*;q=0.8"
                .parse()
                .context("Invalid Accept header")?,
        );
        headers.insert(
            reqwest::header::ACCEPT_LANGUAGE,
            "en-GB,en;q=0.9".parse().context("Invalid Accept-Language header")?,
        );

        let client = Client::builder()
            .timeout(timeout)
            .user_agent(ua)
            .default_headers(headers)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { client })
    }

    /// GET a page as text. A 404 means the site has nothing for that
    /// request and yields an empty body.
    pub async fn get_text(&self, source: &str, url: &str) -> Result<String, SourceError> {
        let body = self.get_once(source, url).await?;
        match meta_refresh_target(url, &body) {
            Some(target) if target != url => {
                debug!(source, from = url, to = %target, "Following meta refresh");
                self.get_once(source, &target).await
            }
            _ => Ok(body),
        }
    }

    async fn get_once(&self, source: &str, url: &str) -> Result<String, SourceError> {
        let resp = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| classify_transport(source, url, &e))?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            debug!(source, url, "404, treating as no listings");
            return Ok(String::new());
        }
        if let Some(err) = classify_status(source, url, status) {
            return Err(err);
        }

        let body = resp
            .text()
            .await
            .map_err(|e| classify_transport(source, url, &e))?;

        if is_block_page(&body) {
            warn!(source, url, "Bot challenge page served");
            return Err(SourceError::rate_limited(source, format!("challenge page at {url}")));
        }
        Ok(body)
    }
}

fn classify_transport(source: &str, url: &str, e: &reqwest::Error) -> SourceError {
    if e.is_timeout() {
        SourceError::timeout(source, format!("{url}: {e}"))
    } else {
        SourceError::unreachable(source, format!("{url}: {e}"))
    }
}

/// Error for a non-success status, `None` when the status is fine.
pub fn classify_status(source: &str, url: &str, status: StatusCode) -> Option<SourceError> {
    if status.is_success() {
        None
    } else if status == StatusCode::TOO_MANY_REQUESTS {
        Some(SourceError::rate_limited(source, format!("{url}: HTTP {status}")))
    } else if status == StatusCode::REQUEST_TIMEOUT || status == StatusCode::GATEWAY_TIMEOUT {
        Some(SourceError::timeout(source, format!("{url}: HTTP {status}")))
    } else {
        Some(SourceError::unreachable(source, format!("{url}: HTTP {status}")))
    }
}

pub fn is_block_page(body: &str) -> bool {
    let head: String = body.chars().take(4096).collect::<String>().to_lowercase();
    BLOCK_MARKERS.iter().any(|m| head.contains(m))
}

/// Absolute URL from a `<meta http-equiv="refresh" content="0; url=...">`.
pub fn meta_refresh_target(base: &str, body: &str) -> Option<String> {
    if !body.contains("http-equiv") && !body.contains("HTTP-EQUIV") {
        return None;
    }
    let doc = Html::parse_document(body);
    let sel = Selector::parse("meta[http-equiv]").ok()?;
    let content = doc
        .select(&sel)
        .find(|m| {
            m.value()
                .attr("http-equiv")
                .is_some_and(|v| v.eq_ignore_ascii_case("refresh"))
        })?
        .value()
        .attr("content")?;

    let lower = content.to_ascii_lowercase();
    let idx = lower.find("url=")?;
    let target = content[idx + 4..].trim().trim_matches(|c| c == '\'' || c == '"');
    if target.is_empty() {
        return None;
    }
    Url::parse(base).ok()?.join(target).ok().map(|u| u.to_string())
}
