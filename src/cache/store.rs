//! Cache Store Module
//!
//! A single cache generation: normalized request URL to captured response,
//! with a quota and lifetime-based expiry.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::cache::{CacheStats, CachedResponse, MAX_KEY_LENGTH};
use crate::error::{CacheError, Result};
use crate::fetch::AssetResponse;

/// Outcome of a read-only lookup.
#[derive(Debug)]
pub enum Lookup {
    Hit(AssetResponse),
    /// Present but past its lifetime; the caller should remove it
    Expired,
    Miss,
}

// == Cache Store ==
/// Entries belonging to one named generation.
///
/// Lookups only need `&self`, so a generation can serve concurrent readers;
/// hit and miss counters are atomic for that reason.
#[derive(Debug)]
pub struct CacheStore {
    /// Normalized URL to response
    entries: HashMap<String, CachedResponse>,
    /// Write-side statistics
    stats: CacheStats,
    hits: AtomicU64,
    misses: AtomicU64,
    /// Maximum number of entries allowed
    max_entries: usize,
    /// Maximum body size of one entry
    max_entry_bytes: usize,
    /// Lifetime in seconds applied to new entries, None = never expire
    ttl: Option<u64>,
}

impl CacheStore {
    // == Constructor ==
    /// Creates an empty generation.
    ///
    /// # Arguments
    /// * `max_entries` - Maximum number of entries the generation can hold
    /// * `max_entry_bytes` - Maximum body size of a single entry
    /// * `ttl` - Lifetime in seconds for new entries
    pub fn new(max_entries: usize, max_entry_bytes: usize, ttl: Option<u64>) -> Self {
        Self {
            entries: HashMap::new(),
            stats: CacheStats::new(),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            max_entries,
            max_entry_bytes,
            ttl,
        }
    }

    // == Put ==
    /// Stores a response under `key`, replacing any previous entry whole.
    ///
    /// Fails with `QuotaExceeded` when the body is too large or when a new
    /// key would exceed the entry limit. Overwrites never fail on count.
    pub fn put(&mut self, key: String, response: AssetResponse) -> Result<()> {
        let entry = CachedResponse::new(response, self.ttl);
        self.insert(key, entry)?;
        self.stats.record_write();
        Ok(())
    }

    /// Puts back an entry loaded from persistent storage, keeping its
    /// original timestamps. Subject to the same quota as `put`.
    pub fn restore(&mut self, key: String, entry: CachedResponse) -> Result<()> {
        self.insert(key, entry)
    }

    fn insert(&mut self, key: String, entry: CachedResponse) -> Result<()> {
        if key.len() > MAX_KEY_LENGTH {
            return Err(CacheError::QuotaExceeded(format!(
                "Key exceeds maximum length of {} bytes",
                MAX_KEY_LENGTH
            )));
        }

        if entry.body_len() > self.max_entry_bytes {
            return Err(CacheError::QuotaExceeded(format!(
                "Body of {} bytes exceeds maximum of {} bytes",
                entry.body_len(),
                self.max_entry_bytes
            )));
        }

        let is_overwrite = self.entries.contains_key(&key);
        if !is_overwrite && self.entries.len() >= self.max_entries {
            // Reclaim expired slots before refusing the write
            self.cleanup_expired();
            if self.entries.len() >= self.max_entries {
                return Err(CacheError::QuotaExceeded(format!(
                    "Generation is full ({} entries)",
                    self.max_entries
                )));
            }
        }

        self.entries.insert(key, entry);
        self.stats.set_total_entries(self.entries.len());
        Ok(())
    }

    // == Match ==
    /// Looks up the entry for `key` without modifying the generation.
    ///
    /// Both `Expired` and `Miss` count as a miss.
    pub fn lookup(&self, key: &str) -> Lookup {
        match self.entries.get(key) {
            Some(entry) if !entry.is_expired() => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Lookup::Hit(entry.response.clone())
            }
            Some(_) => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                Lookup::Expired
            }
            None => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                Lookup::Miss
            }
        }
    }

    /// Looks up the entry for `key`, removing it when expired.
    pub fn get(&mut self, key: &str) -> Option<AssetResponse> {
        match self.lookup(key) {
            Lookup::Hit(response) => Some(response),
            Lookup::Expired => {
                self.remove_if_expired(key);
                None
            }
            Lookup::Miss => None,
        }
    }

    /// Removes `key` if it is still present and expired.
    pub fn remove_if_expired(&mut self, key: &str) -> bool {
        let expired = self.entries.get(key).is_some_and(|e| e.is_expired());
        if expired {
            self.entries.remove(key);
            self.stats.record_expirations(1);
            self.stats.set_total_entries(self.entries.len());
        }
        expired
    }

    /// The stored entry for `key`, expired or not.
    pub fn entry(&self, key: &str) -> Option<&CachedResponse> {
        self.entries.get(key)
    }

    // == Delete ==
    /// Removes an entry by key. Returns whether it existed.
    pub fn delete(&mut self, key: &str) -> bool {
        let existed = self.entries.remove(key).is_some();
        self.stats.set_total_entries(self.entries.len());
        existed
    }

    // == Keys ==
    /// Returns every stored key, in no particular order.
    pub fn keys(&self) -> Vec<String> {
        self.entries.keys().cloned().collect()
    }

    // == Stats ==
    /// Returns current statistics.
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.hits = self.hits.load(Ordering::Relaxed);
        stats.misses = self.misses.load(Ordering::Relaxed);
        stats.set_total_entries(self.entries.len());
        stats
    }

    // == Cleanup Expired ==
    /// Removes all expired entries.
    ///
    /// Returns the number of entries removed.
    pub fn cleanup_expired(&mut self) -> usize {
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired());
        let removed = before - self.entries.len();

        self.stats.record_expirations(removed);
        self.stats.set_total_entries(self.entries.len());
        removed
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
