//! Directory-backed cache: one JSON file per entry.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::{CacheEntry, CacheStore};
use crate::types::{ScanError, SourceError};

pub struct FileCacheStore {
    dir: PathBuf,
}

impl FileCacheStore {
    /// Open (creating if needed) a cache directory.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, ScanError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)?;
        debug!(dir = %dir.display(), "Cache directory ready");
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File name is a name-based UUID of the key, so any key is filesystem-safe.
    fn path_for(&self, key: &str) -> PathBuf {
        let id = Uuid::new_v5(&Uuid::NAMESPACE_URL, key.as_bytes());
        self.dir.join(format!("{id}.json"))
    }

    fn remove_quietly(path: &Path) {
        if let Err(e) = std::fs::remove_file(path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %path.display(), error = %e, "Failed to remove cache file");
            }
        }
    }

    fn read_entry(path: &Path) -> std::result::Result<CacheEntry, String> {
        let json = std::fs::read_to_string(path).map_err(|e| e.to_string())?;
        serde_json::from_str(&json).map_err(|e| e.to_string())
    }
}

impl CacheStore for FileCacheStore {
    fn get(&self, key: &str, now: DateTime<Utc>) -> Result<Option<CacheEntry>, SourceError> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }

        let entry = match Self::read_entry(&path) {
            Ok(e) => e,
            Err(message) => {
                Self::remove_quietly(&path);
                return Err(SourceError::CacheCorruption { key: key.to_string(), message });
            }
        };

        if !entry.is_well_formed() || entry.key != key {
            Self::remove_quietly(&path);
            return Err(SourceError::CacheCorruption {
                key: key.to_string(),
                message: "entry metadata inconsistent".into(),
            });
        }

        if entry.is_expired(now) {
            debug!(key, "Cache entry expired, removing");
            Self::remove_quietly(&path);
            return Ok(None);
        }

        Ok(Some(entry))
    }

    fn put(&self, entry: CacheEntry) -> Result<()> {
        let path = self.path_for(&entry.key);
        let json = serde_json::to_string(&entry).context("Failed to serialise cache entry")?;

        // Write-then-rename so a reader never sees a half-written file.
        let tmp = path.with_extension(format!("{}.tmp", Uuid::new_v4()));
        std::fs::write(&tmp, json)
            .with_context(|| format!("Failed to write cache file {}", tmp.display()))?;
        if let Err(e) = std::fs::rename(&tmp, &path) {
            Self::remove_quietly(&tmp);
            return Err(e)
                .with_context(|| format!("Failed to move cache file into {}", path.display()));
        }

        debug!(key = %entry.key, expires_at = %entry.expires_at, "Cache entry written");
        Ok(())
    }

    fn invalidate(&self, key: &str) -> Result<()> {
        let path = self.path_for(key);
        if path.exists() {
            std::fs::remove_file(&path)
                .with_context(|| format!("Failed to delete cache file {}", path.display()))?;
        }
        Ok(())
    }

    fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut removed = 0;
        let dir = std::fs::read_dir(&self.dir)
            .with_context(|| format!("Failed to list cache dir {}", self.dir.display()))?;

        for item in dir {
            let path = item?.path();
            match path.extension().and_then(|e| e.to_str()) {
                Some("json") => {}
                // Left behind by a write that never completed.
                Some("tmp") => {
                    Self::remove_quietly(&path);
                    removed += 1;
                    continue;
                }
                _ => continue,
            }
            let stale = match Self::read_entry(&path) {
                Ok(entry) => entry.is_expired(now) || !entry.is_well_formed(),
                Err(_) => true,
            };
            if stale {
                Self::remove_quietly(&path);
                removed += 1;
            }
        }

        if removed > 0 {
            info!(removed, "Purged stale cache entries");
        }
        Ok(removed)
    }
}
