//! Cache storage.
//!
//! `StatsStore` is the seam to whatever backs the cache. `MemoryStore` is the
//! bundled in-process implementation: an LRU-bounded map whose entries carry
//! an absolute expiry checked against an injected clock.

use std::sync::{Arc, RwLock};
use std::time::Duration;

use lru::LruCache;
use thiserror::Error;
use time::OffsetDateTime;

use crate::util::clock::{Clock, SystemClock};

use super::config::StatsCacheConfig;
use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::store";

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("cache store unavailable: {0}")]
    Unavailable(String),
}

/// A cached statistic and the moment it stops being served.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheEntry {
    pub value: u64,
    pub expires_at: OffsetDateTime,
}

impl CacheEntry {
    pub fn is_live_at(&self, now: OffsetDateTime) -> bool {
        now < self.expires_at
    }
}

pub trait StatsStore: Send + Sync {
    /// Live value under `key`. Expired entries read as absent.
    fn get(&self, key: &str) -> Result<Option<u64>, StoreError>;

    /// Replace the entry under `key`.
    fn set(&self, key: &str, value: u64, ttl: Duration) -> Result<(), StoreError>;

    /// Remove every entry whose key starts with `prefix`, returning how many
    /// were removed. Best-effort bulk clear, not a transaction.
    fn delete_by_prefix(&self, prefix: &str) -> Result<usize, StoreError>;

    /// Number of live entries.
    fn len(&self) -> Result<usize, StoreError>;

    fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }
}

pub struct MemoryStore {
    entries: RwLock<LruCache<String, CacheEntry>>,
    clock: Arc<dyn Clock>,
}

impl MemoryStore {
    pub fn new(config: &StatsCacheConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    pub fn with_clock(config: &StatsCacheConfig, clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(LruCache::new(config.store_capacity_non_zero())),
            clock,
        }
    }

    /// Raw entry under `key`, expired or not.
    pub fn entry(&self, key: &str) -> Option<CacheEntry> {
        rw_read(&self.entries, SOURCE, "entry").peek(key).copied()
    }

    /// Keys currently held, most recently used first.
    pub fn keys(&self) -> Vec<String> {
        rw_read(&self.entries, SOURCE, "keys")
            .iter()
            .map(|(key, _)| key.clone())
            .collect()
    }
}

impl StatsStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<u64>, StoreError> {
        let now = self.clock.now();
        let mut entries = rw_write(&self.entries, SOURCE, "get");
        match entries.get(key) {
            Some(entry) if entry.is_live_at(now) => Ok(Some(entry.value)),
            Some(_) => {
                entries.pop(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    fn set(&self, key: &str, value: u64, ttl: Duration) -> Result<(), StoreError> {
        let entry = CacheEntry {
            value,
            expires_at: self.clock.now() + ttl,
        };
        rw_write(&self.entries, SOURCE, "set").put(key.to_string(), entry);
        Ok(())
    }

    fn delete_by_prefix(&self, prefix: &str) -> Result<usize, StoreError> {
        let mut entries = rw_write(&self.entries, SOURCE, "delete_by_prefix");
        let doomed: Vec<String> = entries
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &doomed {
            entries.pop(key);
        }
        Ok(doomed.len())
    }

    fn len(&self) -> Result<usize, StoreError> {
        let now = self.clock.now();
        Ok(rw_read(&self.entries, SOURCE, "len")
            .iter()
            .filter(|(_, entry)| entry.is_live_at(now))
            .count())
    }
}
