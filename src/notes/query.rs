//! Query engine - filter chain, sort, and memoized result
//!
//! `filtered()` runs a fixed pipeline (cheap filters first) and memoizes the
//! result under a fingerprint of the filter state plus the collection size.
//! The fingerprint is only a fast-path guard: every Note Store mutation
//! resets it to a never-matching sentinel, so in-place edits that keep the
//! collection size constant can never serve a stale result.

use super::models::{FilterState, Note, Priority, SortOption};

/// Fingerprint of one `filtered()` computation
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct QueryKey {
    archived: bool,
    search: String,
    priority: Option<Priority>,
    favorites_only: bool,
    tag: Option<String>,
    sort: SortOption,
    collection_size: usize,
}

impl QueryKey {
    fn for_state(state: &FilterState, collection_size: usize) -> Self {
        Self {
            archived: state.archived,
            search: state.search.clone(),
            priority: state.priority,
            favorites_only: state.favorites_only,
            tag: state.tag.clone(),
            sort: state.sort,
            collection_size,
        }
    }
}

/// Memoizing query engine over the note collection
#[derive(Debug, Default)]
pub struct QueryEngine {
    fingerprint: Option<QueryKey>,
    cached: Vec<Note>,
}

impl QueryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset the fingerprint to the sentinel, forcing recomputation on the
    /// next read. Called by every Note Store mutation.
    pub fn invalidate(&mut self) {
        self.fingerprint = None;
        self.cached.clear();
    }

    /// Release the cached result's backing allocation (memory-pressure path)
    pub fn release(&mut self) {
        self.fingerprint = None;
        self.cached = Vec::new();
    }

    /// Filter and sort the collection for the given state.
    ///
    /// Returns the memoized ordering when the fingerprint matches the last
    /// computation.
    pub fn filtered(&mut self, notes: &[Note], state: &FilterState) -> Vec<Note> {
        let key = QueryKey::for_state(state, notes.len());
        if self.fingerprint.as_ref() == Some(&key) {
            return self.cached.clone();
        }

        let result = run_pipeline(notes, state);
        self.fingerprint = Some(key);
        self.cached = result.clone();
        result
    }
}

/// The filter pipeline, in fixed cheap-first order:
/// archived flag → priority → favorites-only → tag → full-text search → sort.
fn run_pipeline(notes: &[Note], state: &FilterState) -> Vec<Note> {
    let needle = state.search.trim().to_lowercase();

    let mut out: Vec<Note> = notes
        .iter()
        .filter(|n| n.archived == state.archived)
        .filter(|n| state.priority.is_none_or(|p| n.priority == p))
        .filter(|n| !state.favorites_only || n.favorite)
        .filter(|n| {
            state
                .tag
                .as_ref()
                .is_none_or(|tag| n.tags.iter().any(|t| t == tag))
        })
        .filter(|n| needle.is_empty() || matches_search(n, &needle))
        .cloned()
        .collect();

    sort_notes(&mut out, state.sort);
    out
}

/// Case-insensitive substring match across title, content, and tags
fn matches_search(note: &Note, needle: &str) -> bool {
    note.title.to_lowercase().contains(needle)
        || note.content.to_lowercase().contains(needle)
        || note.tags.iter().any(|t| t.to_lowercase().contains(needle))
}

fn sort_notes(notes: &mut [Note], sort: SortOption) {
    use std::cmp::Reverse;

    match sort {
        SortOption::DateModified => notes.sort_by(|a, b| b.modified_at.cmp(&a.modified_at)),
        SortOption::DateCreated => notes.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
        // Cached keys: lowercasing and word counting are computed once per
        // note, not once per comparison
        SortOption::Title => notes.sort_by_cached_key(|n| n.title.to_lowercase()),
        // Stable sort: equal priorities keep their relative order
        SortOption::Priority => notes.sort_by_key(|n| Reverse(n.priority.rank())),
        SortOption::WordCount => notes.sort_by_cached_key(|n| Reverse(n.word_count())),
    }
}
