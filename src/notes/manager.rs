//! Note manager - CRUD operations and cache ownership
//!
//! `NoteManager` is the single owner of the note collection. All mutations go
//! through it; each one invalidates the query memo and the derived-stats
//! cache together, bumps the cache epoch, and schedules a detached save with
//! the post-mutation snapshot. Reads are served from the caches when the
//! fingerprints match.
//!
//! Background precompute tasks never touch the manager: they receive a cloned
//! snapshot and send their results back over a completion channel tagged with
//! the epoch they were computed at. The owner drains the channel before cache
//! reads and discards results whose epoch no longer matches.

use super::cache::{CacheKey, CacheValue, StatsCache};
use super::export;
use super::models::{FilterState, Note, NoteStats, StoreError};
use super::query::QueryEngine;
use crate::storage::{Persister, StorageBackend, DARK_MODE_KEY};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

/// Result of a background tag/stats precompute, tagged with the cache epoch
/// it was computed at
#[derive(Debug)]
struct PrefetchResult {
    epoch: u64,
    size: usize,
    modified: Option<DateTime<Utc>>,
    tags: Vec<String>,
    stats: NoteStats,
}

/// Owner of the note collection and its caches
pub struct NoteManager {
    notes: Vec<Note>,
    query: QueryEngine,
    cache: StatsCache,
    /// Bumped on every invalidation; guards application of prefetch results
    epoch: u64,
    persister: Persister,
    dark_mode: bool,
    completion_tx: mpsc::UnboundedSender<PrefetchResult>,
    completion_rx: mpsc::UnboundedReceiver<PrefetchResult>,
}

impl NoteManager {
    /// Create an empty manager over the given backend
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self::with_persister(Persister::new(backend))
    }

    /// Create an empty manager with a pre-configured persister
    pub fn with_persister(persister: Persister) -> Self {
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();
        Self {
            notes: Vec::new(),
            query: QueryEngine::new(),
            cache: StatsCache::new(),
            epoch: 0,
            persister,
            dark_mode: false,
            completion_tx,
            completion_rx,
        }
    }

    /// Load the persisted collection (primary → backup → empty) and the
    /// display preference, then return a ready manager
    pub async fn load(backend: Arc<dyn StorageBackend>) -> Self {
        Self::load_with(Persister::new(backend)).await
    }

    /// Load with a pre-configured persister
    pub async fn load_with(persister: Persister) -> Self {
        let notes = persister.load().await;
        let dark_mode = persister.load_flag(DARK_MODE_KEY).await.unwrap_or(false);
        let mut manager = Self::with_persister(persister);
        manager.notes = notes;
        manager.dark_mode = dark_mode;
        manager
    }

    // ========================================================================
    // Mutations
    // ========================================================================

    /// Append a note to the collection
    pub fn add(&mut self, note: Note) {
        self.notes.push(note);
        self.after_mutation();
    }

    /// Replace a note by id, refreshing its modification timestamp
    pub fn update(&mut self, mut note: Note) -> Result<(), StoreError> {
        let Some(slot) = self.notes.iter_mut().find(|n| n.id == note.id) else {
            tracing::warn!(note_id = %note.id, "update: note not found");
            return Err(StoreError::NotFound(note.id));
        };
        note.repair(Utc::now());
        note.touch();
        *slot = note;
        self.after_mutation();
        Ok(())
    }

    /// Remove a note by id
    pub fn delete(&mut self, id: Uuid) -> Result<(), StoreError> {
        let before = self.notes.len();
        self.notes.retain(|n| n.id != id);
        if self.notes.len() == before {
            tracing::warn!(note_id = %id, "delete: note not found");
            return Err(StoreError::NotFound(id));
        }
        self.after_mutation();
        Ok(())
    }

    /// Flip the favorite flag
    pub fn toggle_favorite(&mut self, id: Uuid) -> Result<(), StoreError> {
        let Some(note) = self.notes.iter_mut().find(|n| n.id == id) else {
            tracing::warn!(note_id = %id, "toggle_favorite: note not found");
            return Err(StoreError::NotFound(id));
        };
        note.favorite = !note.favorite;
        note.touch();
        self.after_mutation();
        Ok(())
    }

    /// Flip the archived flag
    pub fn toggle_archive(&mut self, id: Uuid) -> Result<(), StoreError> {
        let Some(note) = self.notes.iter_mut().find(|n| n.id == id) else {
            tracing::warn!(note_id = %id, "toggle_archive: note not found");
            return Err(StoreError::NotFound(id));
        };
        note.archived = !note.archived;
        note.touch();
        self.after_mutation();
        Ok(())
    }

    /// Remove every note
    pub fn clear_all(&mut self) {
        self.notes.clear();
        self.after_mutation();
    }

    /// Scan every note and apply the invariant repairs.
    ///
    /// Returns the number of notes that needed repair; schedules a save when
    /// any did.
    pub fn validate_and_repair(&mut self) -> usize {
        let now = Utc::now();
        let mut repaired = 0;
        for note in &mut self.notes {
            if note.repair(now) {
                repaired += 1;
            }
        }
        if repaired > 0 {
            tracing::info!(repaired, "validate_and_repair corrected notes");
            self.after_mutation();
        }
        repaired
    }

    /// Invalidate caches first, then enqueue the save with the new snapshot
    fn after_mutation(&mut self) {
        self.invalidate_caches();
        self.persister.save_detached(self.notes.clone());
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Filtered, sorted view of the collection. Memoized per filter state.
    pub fn filtered_notes(&mut self, state: &FilterState) -> Vec<Note> {
        self.query.filtered(&self.notes, state)
    }

    /// Sorted distinct tags across non-archived notes. Cached by collection
    /// size.
    pub fn all_tags(&mut self) -> Vec<String> {
        self.drain_completions();
        let now = Utc::now();
        let key = CacheKey::TagList {
            size: self.notes.len(),
        };
        if let Some(CacheValue::Tags(tags)) = self.cache.get(&key, now) {
            return tags;
        }
        let tags = compute_tag_list(&self.notes);
        self.cache.insert(key, CacheValue::Tags(tags.clone()), now);
        tags
    }

    /// Aggregate statistics. Cached by collection size and the most recent
    /// modification timestamp.
    pub fn statistics(&mut self) -> NoteStats {
        self.drain_completions();
        let now = Utc::now();
        let key = CacheKey::Stats {
            size: self.notes.len(),
            modified: self.latest_modified(),
        };
        if let Some(CacheValue::Stats(stats)) = self.cache.get(&key, now) {
            return stats;
        }
        let stats = compute_stats(&self.notes);
        self.cache.insert(key, CacheValue::Stats(stats), now);
        stats
    }

    /// Non-archived notes whose reminder timestamp has passed
    pub fn reminders_due(&self, now: DateTime<Utc>) -> Vec<Note> {
        self.notes
            .iter()
            .filter(|n| !n.archived && n.reminder.is_some_and(|r| r <= now))
            .cloned()
            .collect()
    }

    /// Plain-text rendering of the whole collection for the share surface
    pub fn export_text(&self) -> String {
        export::render(&self.notes, Utc::now())
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn get(&self, id: Uuid) -> Option<&Note> {
        self.notes.iter().find(|n| n.id == id)
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    /// Current cache epoch (prefetch results from older epochs are discarded)
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    // ========================================================================
    // Display preference
    // ========================================================================

    pub fn dark_mode(&self) -> bool {
        self.dark_mode
    }

    /// Update the display preference and persist it off the interactive path
    pub fn set_dark_mode(&mut self, enabled: bool) {
        self.dark_mode = enabled;
        self.persister.save_flag_detached(DARK_MODE_KEY, enabled);
    }

    // ========================================================================
    // Persistence
    // ========================================================================

    /// Awaitable save (background transition, process shutdown). Outcome is
    /// logged, never raised.
    pub async fn save_now(&self) {
        if let Err(e) = self.persister.save(&self.notes).await {
            tracing::warn!(error = %e, count = self.notes.len(), "save failed");
        }
    }

    // ========================================================================
    // Cache maintenance
    // ========================================================================

    /// Clear the query memo and the derived-stats cache together and bump the
    /// epoch, so in-flight precompute results become stale
    pub fn invalidate_caches(&mut self) {
        self.query.invalidate();
        self.cache.clear();
        self.epoch += 1;
    }

    /// Run the derived-stats cache eviction policy. Returns evicted count.
    pub fn evict_caches(&mut self) -> usize {
        self.cache.evict(Utc::now())
    }

    /// Full clear plus release of scratch allocations (memory-pressure path)
    pub fn release_memory(&mut self) {
        self.invalidate_caches();
        self.cache.shrink();
        self.query.release();
        self.notes.shrink_to_fit();
    }

    /// Number of live derived-stats cache entries
    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    // ========================================================================
    // Background precompute
    // ========================================================================

    /// Spawn a detached task that recomputes the tag list and statistics from
    /// a snapshot and hands them back over the completion channel
    pub fn spawn_prefetch(&self) {
        let notes = self.notes.clone();
        let epoch = self.epoch;
        let tx = self.completion_tx.clone();
        tokio::spawn(async move {
            let result = PrefetchResult {
                epoch,
                size: notes.len(),
                modified: notes.iter().map(|n| n.modified_at).max(),
                tags: compute_tag_list(&notes),
                stats: compute_stats(&notes),
            };
            if tx.send(result).is_err() {
                tracing::debug!("prefetch receiver dropped, discarding result");
            }
        });
    }

    /// Apply completed precompute results whose epoch still matches; discard
    /// the rest
    pub fn drain_completions(&mut self) {
        while let Ok(result) = self.completion_rx.try_recv() {
            if result.epoch != self.epoch {
                tracing::debug!(
                    result_epoch = result.epoch,
                    current_epoch = self.epoch,
                    "discarding stale prefetch result"
                );
                continue;
            }
            let now = Utc::now();
            self.cache.insert(
                CacheKey::TagList { size: result.size },
                CacheValue::Tags(result.tags),
                now,
            );
            self.cache.insert(
                CacheKey::Stats {
                    size: result.size,
                    modified: result.modified,
                },
                CacheValue::Stats(result.stats),
                now,
            );
        }
    }

    fn latest_modified(&self) -> Option<DateTime<Utc>> {
        self.notes.iter().map(|n| n.modified_at).max()
    }
}

/// Sorted distinct non-empty tags across non-archived notes,
/// case-insensitively deduplicated (first casing wins)
fn compute_tag_list(notes: &[Note]) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    let mut tags: Vec<String> = Vec::new();
    for note in notes.iter().filter(|n| !n.archived) {
        for tag in &note.tags {
            if tag.is_empty() {
                continue;
            }
            let key = tag.to_lowercase();
            if !seen.contains(&key) {
                seen.push(key);
                tags.push(tag.clone());
            }
        }
    }
    tags.sort_by_key(|t| t.to_lowercase());
    tags
}

fn compute_stats(notes: &[Note]) -> NoteStats {
    NoteStats {
        active: notes.iter().filter(|n| !n.archived).count(),
        favorites: notes.iter().filter(|n| n.favorite).count(),
        archived: notes.iter().filter(|n| n.archived).count(),
        total_words: notes.iter().map(|n| n.word_count()).sum(),
    }
}
