//! Fetch scheduler.
//!
//! Runs one fetch per adapter under a single shared concurrency limit,
//! consulting the cache first and retrying transient failures with
//! jittered backoff. Every adapter gets exactly one `SourceResult`; no
//! adapter outcome can abort the scan.

use chrono::Utc;
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, info, info_span, warn, Instrument};

use super::fallback::{collect_manual_payload, ManualFallback};
use super::retry::{AttemptOutcome, RetryMachine, RetryPolicy, RetryState};
use crate::config::FetchSettings;
use crate::sources::SourceAdapter;
use crate::storage::{cache_key, CacheEntry, CacheStore};
use crate::types::{DateWindow, FilterHints, RawPayload, SourceError, SourceResult, SourceStatus};

#[derive(Clone)]
pub struct FetchScheduler {
    cache: Arc<dyn CacheStore>,
    settings: FetchSettings,
    limiter: Arc<Semaphore>,
    fallback: Option<Arc<dyn ManualFallback>>,
    jitter_seed: Option<u64>,
}

impl FetchScheduler {
    pub fn new(cache: Arc<dyn CacheStore>, settings: FetchSettings) -> Self {
        let limiter = Arc::new(Semaphore::new(settings.max_concurrent_requests.max(1)));
        Self {
            cache,
            settings,
            limiter,
            fallback: None,
            jitter_seed: None,
        }
    }

    pub fn with_fallback(mut self, fallback: Arc<dyn ManualFallback>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    /// Seed the jitter RNG so backoff timing is reproducible.
    pub fn with_jitter_seed(mut self, seed: u64) -> Self {
        self.jitter_seed = Some(seed);
        self
    }

    pub fn settings(&self) -> &FetchSettings {
        &self.settings
    }

    /// Fetch every adapter. Results come back in adapter order.
    ///
    /// When `deadline` passes, fetches still in flight are cancelled and
    /// reported as `Cancelled`; completed results are kept.
    pub async fn fetch_all(
        &self,
        adapters: &[Arc<dyn SourceAdapter>],
        window: DateWindow,
        hints: &FilterHints,
        interactive: bool,
        deadline: Option<Instant>,
    ) -> Vec<SourceResult> {
        info!(
            sources = adapters.len(),
            window = %window,
            max_concurrent = self.settings.max_concurrent_requests,
            "Fetching sources"
        );

        let mut tasks = JoinSet::new();
        for (idx, adapter) in adapters.iter().enumerate() {
            let this = self.clone();
            let adapter = Arc::clone(adapter);
            let hints = hints.clone();
            let span = info_span!("fetch", source = %adapter.name());

            tasks.spawn(
                async move {
                    let attempts = Arc::new(AtomicU32::new(0));
                    let work = this.fetch_one(Arc::clone(&adapter), window, hints, interactive, Arc::clone(&attempts));
                    let result = match deadline {
                        Some(at) => match tokio::time::timeout_at(at, work).await {
                            Ok(r) => r,
                            Err(_) => {
                                warn!("Scan deadline reached, fetch cancelled");
                                SourceResult {
                                    source: adapter.name().to_string(),
                                    fetched_at: Utc::now(),
                                    outcome: Err(SourceError::timeout(adapter.name(), "scan deadline reached")),
                                    from_cache: false,
                                    status: SourceStatus::Cancelled,
                                    attempts: attempts.load(Ordering::SeqCst),
                                }
                            }
                        },
                        None => work.await,
                    };
                    (idx, result)
                }
                .instrument(span),
            );
        }

        let mut results: Vec<Option<SourceResult>> = (0..adapters.len()).map(|_| None).collect();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((idx, result)) => results[idx] = Some(result),
                Err(e) => warn!(error = %e, "Fetch task aborted"),
            }
        }

        results
            .into_iter()
            .zip(adapters)
            .map(|(maybe, adapter)| {
                maybe.unwrap_or_else(|| SourceResult {
                    source: adapter.name().to_string(),
                    fetched_at: Utc::now(),
                    outcome: Err(SourceError::unreachable(adapter.name(), "fetch task aborted")),
                    from_cache: false,
                    status: SourceStatus::Failed,
                    attempts: 0,
                })
            })
            .collect()
    }

    async fn fetch_one(
        &self,
        adapter: Arc<dyn SourceAdapter>,
        window: DateWindow,
        hints: FilterHints,
        interactive: bool,
        attempts: Arc<AtomicU32>,
    ) -> SourceResult {
        let name = adapter.name().to_string();
        let key = cache_key(&name, &window, &hints);

        // -- Cache -----------------------------------------------------------

        match self.cache.get(&key, Utc::now()) {
            Ok(Some(entry)) => {
                info!(key = %key, written_at = %entry.written_at, manual = entry.manual, "Cache hit");
                return SourceResult {
                    source: name,
                    fetched_at: entry.written_at,
                    outcome: Ok(entry.payload),
                    from_cache: true,
                    status: SourceStatus::Cached,
                    attempts: 0,
                };
            }
            Ok(None) => debug!(key = %key, "Cache miss"),
            Err(e) => {
                warn!(error = %e, "Discarding corrupt cache entry");
                if let Err(e) = self.cache.invalidate(&key) {
                    warn!(error = %e, "Failed to discard cache entry");
                }
            }
        }

        // -- Network with retry ----------------------------------------------

        let policy = RetryPolicy::from_settings(&self.settings);
        let rng = match self.jitter_seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        let mut machine = RetryMachine::new(policy, rng);
        let mut payload: Option<RawPayload> = None;
        let mut last_error: Option<SourceError> = None;

        let final_attempts = loop {
            match machine.state() {
                RetryState::Attempt(n) => {
                    attempts.store(n, Ordering::SeqCst);
                    let outcome = match self.attempt(adapter.as_ref(), &window, &hints).await {
                        Ok(p) => {
                            payload = Some(p);
                            AttemptOutcome::Succeeded
                        }
                        Err(e) => {
                            let transient = e.is_transient();
                            warn!(attempt = n, transient, error = %e, "Fetch attempt failed");
                            last_error = Some(e);
                            if transient {
                                AttemptOutcome::Transient
                            } else {
                                AttemptOutcome::Permanent
                            }
                        }
                    };
                    machine.record(outcome);
                }
                RetryState::Backoff { attempt, delay } => {
                    debug!(attempt, delay_ms = delay.as_millis() as u64, "Backing off before retry");
                    tokio::time::sleep(delay).await;
                    machine.resume();
                }
                RetryState::Succeeded { attempts: n } | RetryState::Failed { attempts: n } => break n,
            }
        };

        if let Some(payload) = payload {
            let fetched_at = Utc::now();
            let entry = CacheEntry::new(key.as_str(), payload.clone(), fetched_at, self.settings.cache_ttl);
            if let Err(e) = self.cache.put(entry) {
                warn!(error = %e, "Failed to cache payload");
            }
            let status = if final_attempts > 1 {
                SourceStatus::Degraded
            } else {
                SourceStatus::Fresh
            };
            info!(attempts = final_attempts, status = %status, pages = payload.pages.len(), "Source fetched");
            return SourceResult {
                source: name,
                fetched_at,
                outcome: Ok(payload),
                from_cache: false,
                status,
                attempts: final_attempts,
            };
        }

        let error = last_error.unwrap_or_else(|| SourceError::unreachable(&name, "no attempt completed"));

        // -- Manual fallback -------------------------------------------------

        if interactive {
            if let Some(fallback) = &self.fallback {
                let requests = adapter.page_requests(&window, &hints);
                if let Some(payload) = collect_manual_payload(fallback.as_ref(), &name, &requests).await {
                    let fetched_at = Utc::now();
                    let entry = CacheEntry::new(
                        key.as_str(),
                        payload.clone(),
                        fetched_at,
                        self.settings.manual_fetch_ttl,
                    )
                    .manual();
                    if let Err(e) = self.cache.put(entry) {
                        warn!(error = %e, "Failed to cache manual payload");
                    }
                    info!(pages = payload.pages.len(), "Source supplied manually");
                    return SourceResult {
                        source: name,
                        fetched_at,
                        outcome: Ok(payload),
                        from_cache: false,
                        status: SourceStatus::Manual,
                        attempts: final_attempts,
                    };
                }
            }
        }

        warn!(attempts = final_attempts, error = %error, "Source failed for this scan");
        SourceResult {
            source: name,
            fetched_at: Utc::now(),
            outcome: Err(error),
            from_cache: false,
            status: SourceStatus::Failed,
            attempts: final_attempts,
        }
    }

    /// One network attempt: holds a limiter permit for its duration and is
    /// bounded by the per-call timeout.
    async fn attempt(
        &self,
        adapter: &dyn SourceAdapter,
        window: &DateWindow,
        hints: &FilterHints,
    ) -> Result<RawPayload, SourceError> {
        let name = adapter.name();
        let _permit = self
            .limiter
            .acquire()
            .await
            .map_err(|_| SourceError::malformed(name, "fetch limiter closed"))?;

        match tokio::time::timeout(self.settings.request_timeout, adapter.fetch(window, hints)).await {
            Ok(result) => result,
            Err(_) => Err(SourceError::timeout(
                name,
                format!("no response within {}s", self.settings.request_timeout.as_secs()),
            )),
        }
    }
}
