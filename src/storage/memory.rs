//! In-process cache store. Nothing survives the process; used for tests
//! and for runs with caching disabled on disk.

use anyhow::Result;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use super::{CacheEntry, CacheStore};
use crate::types::SourceError;

#[derive(Default)]
pub struct MemoryCacheStore {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.read().unwrap_or_else(|p| p.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, CacheEntry>> {
        self.entries.write().unwrap_or_else(|p| p.into_inner())
    }
}

impl CacheStore for MemoryCacheStore {
    fn get(&self, key: &str, now: DateTime<Utc>) -> Result<Option<CacheEntry>, SourceError> {
        let found = self.read().get(key).cloned();
        match found {
            Some(entry) if entry.is_expired(now) => {
                self.write().remove(key);
                Ok(None)
            }
            other => Ok(other),
        }
    }

    fn put(&self, entry: CacheEntry) -> Result<()> {
        self.write().insert(entry.key.clone(), entry);
        Ok(())
    }

    fn invalidate(&self, key: &str) -> Result<()> {
        self.write().remove(key);
        Ok(())
    }

    fn purge_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut entries = self.write();
        let before = entries.len();
        entries.retain(|_, e| !e.is_expired(now));
        Ok(before - entries.len())
    }
}
