//! Race listing sources.
//!
//! Each site is one `SourceAdapter` variant. The scheduler only sees the
//! trait: it asks an adapter to `fetch` a raw payload for a date window,
//! caches that payload, and later hands it back to `parse`. Adding a site
//! means adding a module and a `SourceKind` variant.

pub mod attheraces;
pub mod harness_au;
pub mod http;
pub mod racingpost;
pub mod skysports;
pub mod sportinglife;
pub mod standardbred;

pub use http::HttpFetcher;

use async_trait::async_trait;
use chrono::NaiveDate;
use scraper::Selector;
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::types::{DateWindow, FilterHints, ParseOutcome, RawPage, RawPayload, SourceError};

// ---------------------------------------------------------------------------
// Adapter interface
// ---------------------------------------------------------------------------

/// One page an adapter needs for a window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub url: String,
    pub day: NaiveDate,
    pub region: Option<String>,
}

impl PageRequest {
    pub fn new(url: impl Into<String>, day: NaiveDate) -> Self {
        Self { url: url.into(), day, region: None }
    }

    pub fn with_region(mut self, region: &str) -> Self {
        self.region = Some(region.to_string());
        self
    }
}

/// Common interface for all race listing sources.
#[async_trait]
pub trait SourceAdapter: Send + Sync {
    /// Stable identifier, used in cache keys and reports.
    fn name(&self) -> &str;

    /// Pages to request for a window. Also offered to the manual fallback.
    fn page_requests(&self, window: &DateWindow, hints: &FilterHints) -> Vec<PageRequest>;

    /// Fetch everything needed for the window as one payload.
    /// Fails only with transient errors.
    async fn fetch(&self, window: &DateWindow, hints: &FilterHints) -> Result<RawPayload, SourceError>;

    /// Parse a payload. Entries that fail are counted in `skipped`; the
    /// call only fails when nothing in the payload is recognisable.
    fn parse(&self, payload: &RawPayload) -> Result<ParseOutcome, SourceError>;
}

/// Fetch each requested page in order, building one payload.
/// Pages that fail are left out and counted in `failed_pages`; the call only
/// fails when no requested page could be fetched.
pub async fn fetch_pages(
    http: &HttpFetcher,
    source: &str,
    requests: Vec<PageRequest>,
) -> Result<RawPayload, SourceError> {
    gather_pages(source, requests, move |url: String| async move {
        http.get_text(source, &url).await
    })
    .await
}

async fn gather_pages<F, Fut>(
    source: &str,
    requests: Vec<PageRequest>,
    mut fetch: F,
) -> Result<RawPayload, SourceError>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<String, SourceError>>,
{
    let mut payload = RawPayload::new(Vec::with_capacity(requests.len()));
    let mut last_error = None;

    for req in requests {
        match fetch(req.url.clone()).await {
            Ok(body) => {
                debug!(source, url = %req.url, bytes = body.len(), "Page fetched");
                payload.pages.push(RawPage {
                    url: req.url,
                    day: req.day,
                    region: req.region,
                    body,
                });
            }
            Err(e) => {
                warn!(source, url = %req.url, error = %e, "Page fetch failed, continuing without");
                payload.failed_pages += 1;
                last_error = Some(e);
            }
        }
    }

    match last_error {
        Some(e) if payload.pages.is_empty() => Err(e),
        _ => Ok(payload),
    }
}

/// Parse every non-empty page with `parse_page`, merging the outcomes.
/// Fails only when every non-empty page was unrecognisable.
pub(crate) fn parse_pages<F>(
    source: &str,
    payload: &RawPayload,
    mut parse_page: F,
) -> Result<ParseOutcome, SourceError>
where
    F: FnMut(&RawPage) -> Result<ParseOutcome, String>,
{
    let mut outcome = ParseOutcome::default();
    let mut attempted = 0usize;
    let mut failures = Vec::new();

    for page in payload.pages.iter().filter(|p| !p.body.trim().is_empty()) {
        attempted += 1;
        match parse_page(page) {
            Ok(parsed) => {
                outcome.races.extend(parsed.races);
                outcome.skipped += parsed.skipped;
            }
            Err(e) => {
                debug!(source, url = %page.url, error = %e, "Page unparseable");
                failures.push(e);
            }
        }
    }

    if attempted > 0 && failures.len() == attempted {
        return Err(SourceError::malformed(source, failures.join("; ")));
    }
    outcome.skipped += failures.len();
    Ok(outcome)
}

/// Compile a CSS selector, mapping the error into a parse failure.
pub(crate) fn selector(css: &str) -> Result<Selector, String> {
    Selector::parse(css).map_err(|e| format!("bad selector {css:?}: {e}"))
}

/// Whitespace-collapsed text content of an element.
pub(crate) fn element_text(el: &scraper::ElementRef<'_>) -> String {
    el.text().collect::<Vec<_>>().join(" ").split_whitespace().collect::<Vec<_>>().join(" ")
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    AtTheRaces,
    SkySports,
    RacingPost,
    SportingLife,
    HarnessAu,
    StandardbredCa,
}

impl SourceKind {
    pub const ALL: &'static [SourceKind] = &[
        SourceKind::AtTheRaces,
        SourceKind::SkySports,
        SourceKind::RacingPost,
        SourceKind::SportingLife,
        SourceKind::HarnessAu,
        SourceKind::StandardbredCa,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            SourceKind::AtTheRaces => "attheraces",
            SourceKind::SkySports => "skysports",
            SourceKind::RacingPost => "racingpost",
            SourceKind::SportingLife => "sportinglife",
            SourceKind::HarnessAu => "harness_au",
            SourceKind::StandardbredCa => "standardbred_ca",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id())
    }
}

impl std::str::FromStr for SourceKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        SourceKind::ALL
            .iter()
            .find(|k| k.id() == wanted)
            .copied()
            .ok_or_else(|| anyhow::anyhow!("Unknown source: {s}"))
    }
}

/// Build adapters for the enabled kinds, sharing one HTTP fetcher.
pub fn build_adapters(kinds: &[SourceKind], http: Arc<HttpFetcher>) -> Vec<Arc<dyn SourceAdapter>> {
    kinds
        .iter()
        .map(|kind| -> Arc<dyn SourceAdapter> {
            let http = Arc::clone(&http);
            match kind {
                SourceKind::AtTheRaces => Arc::new(attheraces::AtTheRaces::new(http)),
                SourceKind::SkySports => Arc::new(skysports::SkySports::new(http)),
                SourceKind::RacingPost => Arc::new(racingpost::RacingPost::new(http)),
                SourceKind::SportingLife => Arc::new(sportinglife::SportingLife::new(http)),
                SourceKind::HarnessAu => Arc::new(harness_au::HarnessAu::new(http)),
                SourceKind::StandardbredCa => Arc::new(standardbred::StandardbredCa::new(http)),
            }
        })
        .collect()
}
