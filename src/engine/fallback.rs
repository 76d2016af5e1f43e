//! Manual fallback for sources that exhaust their retries.
//!
//! When interactive fallback is enabled, the scheduler offers each page an
//! adapter would have fetched to a `ManualFallback`, which may supply the
//! page body by other means (typically a human pasting page source).

use async_trait::async_trait;
use std::io::Read;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::sources::PageRequest;
use crate::types::{RawPage, RawPayload};

#[async_trait]
pub trait ManualFallback: Send + Sync {
    /// Body for one page, or `None` to skip it.
    async fn page_body(&self, source: &str, request: &PageRequest) -> Option<String>;
}

/// Offer every page to the fallback. `None` when nothing was supplied.
pub async fn collect_manual_payload(
    fallback: &dyn ManualFallback,
    source: &str,
    requests: &[PageRequest],
) -> Option<RawPayload> {
    let mut pages = Vec::new();
    for req in requests {
        match fallback.page_body(source, req).await {
            Some(body) if !body.trim().is_empty() => {
                debug!(source, url = %req.url, bytes = body.len(), "Manual page supplied");
                pages.push(RawPage {
                    url: req.url.clone(),
                    day: req.day,
                    region: req.region.clone(),
                    body,
                });
            }
            _ => debug!(source, url = %req.url, "Manual page skipped"),
        }
    }
    if pages.is_empty() {
        None
    } else {
        Some(RawPayload::new(pages))
    }
}

/// Prompts on stderr and reads page source from stdin until EOF.
/// Prompts are serialised so concurrent sources don't interleave.
#[derive(Default)]
pub struct StdinFallback {
    lock: Mutex<()>,
}

impl StdinFallback {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ManualFallback for StdinFallback {
    async fn page_body(&self, source: &str, request: &PageRequest) -> Option<String> {
        let _guard = self.lock.lock().await;
        info!(source, url = %request.url, "Waiting for manual page source");

        let url = request.url.clone();
        let source = source.to_string();
        tokio::task::spawn_blocking(move || {
            eprintln!();
            eprintln!("[{source}] automated fetch failed for:");
            eprintln!("  {url}");
            eprintln!("Open it in a browser, paste the page source, then press Ctrl-D.");
            eprintln!("Press Ctrl-D on an empty line to skip.");

            let mut buf = String::new();
            std::io::stdin().lock().read_to_string(&mut buf).ok()?;
            let trimmed = buf.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        })
        .await
        .ok()
        .flatten()
    }
}
