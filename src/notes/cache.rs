//! Derived-stats cache
//!
//! A bounded, strongly-typed memo for views derived from the whole
//! collection: the distinct tag list and the aggregate statistics. Keys carry
//! the fingerprint of the state they were computed from, so a lookup with a
//! stale fingerprint simply misses.
//!
//! Eviction policy: entries idle for more than five minutes are purged, and
//! when the map grows past 50 entries the oldest ones (by insertion order)
//! are evicted down to 30.

use super::models::NoteStats;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

/// Idle time after which an entry is purged
const IDLE_TTL_SECS: i64 = 300;

/// Entry count that triggers the size-based eviction
const MAX_ENTRIES: usize = 50;

/// Entry count the size-based eviction reduces to
const EVICT_TARGET: usize = 30;

/// Cache key, one variant per derived view
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    /// Distinct tag list across non-archived notes, keyed by collection size
    TagList { size: usize },
    /// Aggregate statistics, keyed by collection size and the most recent
    /// modification timestamp
    Stats {
        size: usize,
        modified: Option<DateTime<Utc>>,
    },
}

/// Cache value, matching the key variant
#[derive(Debug, Clone, PartialEq)]
pub enum CacheValue {
    Tags(Vec<String>),
    Stats(NoteStats),
}

#[derive(Debug, Clone)]
struct CacheEntry {
    value: CacheValue,
    inserted_seq: u64,
    last_access: DateTime<Utc>,
}

/// Bounded key-value memo for derived views
#[derive(Debug, Default)]
pub struct StatsCache {
    entries: HashMap<CacheKey, CacheEntry>,
    seq: u64,
}

impl StatsCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Insert or replace an entry
    pub fn insert(&mut self, key: CacheKey, value: CacheValue, now: DateTime<Utc>) {
        self.seq += 1;
        self.entries.insert(
            key,
            CacheEntry {
                value,
                inserted_seq: self.seq,
                last_access: now,
            },
        );
    }

    /// Look up an entry, refreshing its access time on hit
    pub fn get(&mut self, key: &CacheKey, now: DateTime<Utc>) -> Option<CacheValue> {
        let entry = self.entries.get_mut(key)?;
        entry.last_access = now;
        Some(entry.value.clone())
    }

    /// Run the eviction policy: purge idle entries, then shrink an oversized
    /// map down to the target by dropping the oldest insertions.
    /// Returns the number of evicted entries.
    pub fn evict(&mut self, now: DateTime<Utc>) -> usize {
        let before = self.entries.len();

        let ttl = Duration::seconds(IDLE_TTL_SECS);
        self.entries.retain(|_, e| now - e.last_access <= ttl);

        if self.entries.len() > MAX_ENTRIES {
            let mut seqs: Vec<u64> = self.entries.values().map(|e| e.inserted_seq).collect();
            seqs.sort_unstable();
            // Keep the newest EVICT_TARGET insertions
            let cutoff = seqs[seqs.len() - EVICT_TARGET - 1];
            self.entries.retain(|_, e| e.inserted_seq > cutoff);
        }

        before - self.entries.len()
    }

    /// Drop every entry
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Release backing allocations after a clear (memory-pressure response)
    pub fn shrink(&mut self) {
        self.entries.shrink_to_fit();
    }
}
