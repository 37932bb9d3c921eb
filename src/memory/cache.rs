//! Retrieval cache: fingerprint-keyed context storage with LRU eviction.
//!
//! Entries are immutable once created; a miss always creates a new entry.
//! Eviction removes exactly one entry per trigger so memory stays bounded
//! without large pauses. Hit/miss counters are monotonic and shared with
//! the telemetry aggregator through [`CacheCounters`].

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tracing::debug;

/// Monotonic hit/miss counters, shared read-only with telemetry.
#[derive(Debug, Default)]
pub struct CacheCounters {
    hits: AtomicU64,
    misses: AtomicU64,
}

impl CacheCounters {
    /// Create zeroed counters.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a cache hit.
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a cache miss.
    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    /// Total hits since the last reset.
    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    /// Total misses since the last reset.
    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// Zero both counters. Called by the telemetry aggregator's session
    /// reset; the cache itself never resets them.
    pub fn reset(&self) {
        self.hits.store(0, Ordering::Relaxed);
        self.misses.store(0, Ordering::Relaxed);
    }
}

/// One cached retrieval result.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Normalized fingerprint key.
    pub key: String,
    /// Retrieved context payload. May be empty when the lookup found
    /// nothing; the empty result is still cached.
    pub value: String,
    /// Creation time, used to break eviction ties.
    pub created_at: DateTime<Utc>,
    /// Last access time, drives LRU ordering.
    pub last_accessed_at: DateTime<Utc>,
}

/// Fingerprint-keyed store with LRU eviction and hit/miss bookkeeping.
pub struct RetrievalCache {
    capacity: usize,
    counters: Arc<CacheCounters>,
    entries: Mutex<HashMap<String, CacheEntry>>,
}

impl RetrievalCache {
    /// Create a cache bounded to `capacity` entries.
    pub fn new(capacity: usize, counters: Arc<CacheCounters>) -> Self {
        Self {
            capacity: capacity.max(1),
            counters,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Look up a key. A hit refreshes `last_accessed_at` and bumps the hit
    /// counter; a miss bumps the miss counter.
    pub fn get(&self, key: &str) -> Option<String> {
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        match entries.get_mut(key) {
            Some(entry) => {
                entry.last_accessed_at = Utc::now();
                self.counters.record_hit();
                Some(entry.value.clone())
            }
            None => {
                self.counters.record_miss();
                None
            }
        }
    }

    /// Insert a new entry. Entries are immutable: if the key is already
    /// live (e.g. two concurrent misses for the same query), the existing
    /// entry wins and the new value is dropped.
    pub fn put(&self, key: &str, value: &str) {
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        if entries.contains_key(key) {
            return;
        }

        let now = Utc::now();
        entries.insert(
            key.to_string(),
            CacheEntry {
                key: key.to_string(),
                value: value.to_string(),
                created_at: now,
                last_accessed_at: now,
            },
        );

        if entries.len() > self.capacity {
            Self::evict_one(&mut entries);
        }
    }

    /// Evict the least-recently-used entry, ties broken by earliest
    /// `created_at`. Removes at most one entry.
    pub fn evict(&self) {
        let mut entries = self.entries.lock().expect("cache lock poisoned");
        Self::evict_one(&mut entries);
    }

    fn evict_one(entries: &mut HashMap<String, CacheEntry>) {
        let victim = entries
            .values()
            .min_by_key(|e| (e.last_accessed_at, e.created_at))
            .map(|e| e.key.clone());
        if let Some(key) = victim {
            debug!(key = %key, "Evicting cache entry");
            entries.remove(&key);
        }
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.entries.lock().expect("cache lock poisoned").len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The shared hit/miss counters.
    pub fn counters(&self) -> &Arc<CacheCounters> {
        &self.counters
    }
}
