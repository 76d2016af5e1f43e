//! Cache persistence layer.
//!
//! Raw source payloads are cached between scans under a TTL. The cache is
//! the only state carried from one invocation to the next. `CacheStore` is
//! the seam: the scheduler only needs get/put/invalidate, plus a purge of
//! expired entries at scan start.

pub mod file;
pub mod memory;

pub use file::FileCacheStore;
pub use memory::MemoryCacheStore;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::types::{DateWindow, FilterHints, RawPayload, SourceError};

/// A cached payload with its validity window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub payload: RawPayload,
    pub written_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    /// Payload came from the manual fallback rather than a network fetch.
    #[serde(default)]
    pub manual: bool,
}

impl CacheEntry {
    /// Build an entry expiring `ttl` after `written_at`. The TTL is clamped
    /// to at least one second so expiry is always after the write.
    pub fn new(key: impl Into<String>, payload: RawPayload, written_at: DateTime<Utc>, ttl: Duration) -> Self {
        let ttl = chrono::Duration::from_std(ttl.max(Duration::from_secs(1)))
            .unwrap_or_else(|_| chrono::Duration::days(365));
        Self {
            key: key.into(),
            payload,
            written_at,
            expires_at: written_at + ttl,
            manual: false,
        }
    }

    pub fn manual(mut self) -> Self {
        self.manual = true;
        self
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Structural check applied to entries read back from storage.
    pub fn is_well_formed(&self) -> bool {
        self.expires_at > self.written_at
    }
}

/// Key for one adapter's fetch over a window with given hints.
pub fn cache_key(source: &str, window: &DateWindow, hints: &FilterHints) -> String {
    format!("{source}|{window}|{}", hints.cache_fragment())
}

/// Keyed TTL storage for raw payloads. Last writer wins per key.
#[cfg_attr(test, mockall::automock)]
pub trait CacheStore: Send + Sync {
    /// Return the entry for `key` if present and not expired at `now`.
    /// Expired entries are removed and reported as a miss. Unreadable
    /// entries are removed and reported as `CacheCorruption`.
    fn get(&self, key: &str, now: DateTime<Utc>) -> Result<Option<CacheEntry>, SourceError>;

    fn put(&self, entry: CacheEntry) -> Result<()>;

    fn invalidate(&self, key: &str) -> Result<()>;

    /// Remove every entry expired at `now`. Returns how many were removed.
    fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize>;
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
