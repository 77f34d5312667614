//! Note models and filter state
//!
//! The `Note` entity is the unit of everything the engine manages. Invariants
//! (non-empty title/content, timestamp ordering, tag hygiene) are repaired
//! rather than rejected: a malformed note is corrected in place so the
//! collection never fails to load.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

/// Maximum number of tags a single note may carry.
pub const MAX_TAGS_PER_NOTE: usize = 10;

/// Maximum length of a single tag, in characters.
pub const MAX_TAG_LEN: usize = 20;

const UNTITLED_PLACEHOLDER: &str = "untitled";
const EMPTY_CONTENT_PLACEHOLDER: &str = "(no content)";

// ============================================================================
// Errors
// ============================================================================

/// Errors raised by Note Store mutations.
///
/// None of these surface as user-facing failures: callers log them and the
/// operation becomes a no-op.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    /// A mutation referenced an id that is not in the collection
    #[error("note {0} not found")]
    NotFound(Uuid),
    /// Tag was empty or contained `#`, whitespace, or control characters,
    /// or exceeded the length bound
    #[error("invalid tag: {0:?}")]
    InvalidTag(String),
    /// Tag already present on the note (case-insensitive comparison)
    #[error("duplicate tag: {0:?}")]
    DuplicateTag(String),
    /// Note already carries the maximum number of tags
    #[error("tag limit reached ({MAX_TAGS_PER_NOTE} per note)")]
    TagLimit,
}

// ============================================================================
// Core Enums
// ============================================================================

/// Priority level of a note
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
}

impl Priority {
    /// Numeric rank used by the priority sort (high=3, normal=2, low=1)
    pub fn rank(&self) -> u8 {
        match self {
            Self::Low => 1,
            Self::Normal => 2,
            Self::High => 3,
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Low => write!(f, "low"),
            Self::Normal => write!(f, "normal"),
            Self::High => write!(f, "high"),
        }
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "normal" => Ok(Self::Normal),
            "high" => Ok(Self::High),
            _ => Err(format!("Unknown priority: {}", s)),
        }
    }
}

/// Sort order applied at the end of the query pipeline
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SortOption {
    /// Most recently modified first
    #[default]
    DateModified,
    /// Most recently created first
    DateCreated,
    /// Title ascending, case-insensitive
    Title,
    /// Highest priority first; stable for equal priorities
    Priority,
    /// Longest content first
    WordCount,
}

impl fmt::Display for SortOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::DateModified => write!(f, "date_modified"),
            Self::DateCreated => write!(f, "date_created"),
            Self::Title => write!(f, "title"),
            Self::Priority => write!(f, "priority"),
            Self::WordCount => write!(f, "word_count"),
        }
    }
}

impl FromStr for SortOption {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "date_modified" | "modified" => Ok(Self::DateModified),
            "date_created" | "created" => Ok(Self::DateCreated),
            "title" => Ok(Self::Title),
            "priority" => Ok(Self::Priority),
            "word_count" | "words" => Ok(Self::WordCount),
            _ => Err(format!("Unknown sort option: {}", s)),
        }
    }
}

// ============================================================================
// Note
// ============================================================================

/// A single note in the collection
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Note {
    /// Unique identifier, immutable after creation
    pub id: Uuid,
    /// Display title, trimmed; never empty after repair
    pub title: String,
    /// Body text, trimmed; never empty after repair
    pub content: String,
    /// When the note was created
    pub created_at: DateTime<Utc>,
    /// When the note was last modified; always >= `created_at`
    pub modified_at: DateTime<Utc>,
    /// Priority level
    #[serde(default)]
    pub priority: Priority,
    /// Favorite flag
    #[serde(default)]
    pub favorite: bool,
    /// Archived flag; archived notes are hidden from the default views
    #[serde(default)]
    pub archived: bool,
    /// Ordered tag set; unique case-insensitively, each tag validated
    #[serde(default)]
    pub tags: Vec<String>,
    /// Optional reminder timestamp
    pub reminder: Option<DateTime<Utc>>,
}

impl Note {
    /// Create a new note with the given content and default priority.
    ///
    /// All other fields get defaults; the placeholder title is applied so the
    /// invariants hold from the start.
    pub fn new(content: impl Into<String>) -> Self {
        Self::new_full(String::new(), content, Priority::default(), Vec::new())
    }

    /// Create a new note with full configuration
    pub fn new_full(
        title: impl Into<String>,
        content: impl Into<String>,
        priority: Priority,
        tags: Vec<String>,
    ) -> Self {
        let now = Utc::now();
        let mut note = Self {
            id: Uuid::new_v4(),
            title: title.into(),
            content: content.into(),
            created_at: now,
            modified_at: now,
            priority,
            favorite: false,
            archived: false,
            tags,
            reminder: None,
        };
        note.repair(now);
        note
    }

    /// Number of whitespace-delimited tokens in the content.
    /// Computed on demand, never persisted.
    pub fn word_count(&self) -> usize {
        self.content.split_whitespace().count()
    }

    /// Refresh the modification timestamp
    pub fn touch(&mut self) {
        self.modified_at = Utc::now();
    }

    /// Add a tag, rejecting invalid tags and case-insensitive duplicates
    pub fn add_tag(&mut self, raw: &str) -> Result<(), StoreError> {
        let tag = sanitize_tag(raw).ok_or_else(|| StoreError::InvalidTag(raw.to_string()))?;
        let key = tag.to_lowercase();
        if self.tags.iter().any(|t| t.to_lowercase() == key) {
            return Err(StoreError::DuplicateTag(tag));
        }
        if self.tags.len() >= MAX_TAGS_PER_NOTE {
            return Err(StoreError::TagLimit);
        }
        self.tags.push(tag);
        self.touch();
        Ok(())
    }

    /// Remove a tag by exact match. Returns true if it was present.
    pub fn remove_tag(&mut self, tag: &str) -> bool {
        let before = self.tags.len();
        self.tags.retain(|t| t != tag);
        let removed = self.tags.len() != before;
        if removed {
            self.touch();
        }
        removed
    }

    /// Apply the invariant repairs in place. Returns true if anything changed.
    ///
    /// Repairs: trim title/content and substitute placeholders when empty,
    /// clamp a future `created_at` to `now`, lift `modified_at` up to
    /// `created_at`, and re-sanitize the tag set (trim, drop invalid, dedup
    /// case-insensitively, cap at [`MAX_TAGS_PER_NOTE`]).
    pub fn repair(&mut self, now: DateTime<Utc>) -> bool {
        let mut changed = false;

        let title = self.title.trim();
        if title != self.title {
            self.title = title.to_string();
            changed = true;
        }
        if self.title.is_empty() {
            self.title = UNTITLED_PLACEHOLDER.to_string();
            changed = true;
        }

        let content = self.content.trim();
        if content != self.content {
            self.content = content.to_string();
            changed = true;
        }
        if self.content.is_empty() {
            self.content = EMPTY_CONTENT_PLACEHOLDER.to_string();
            changed = true;
        }

        if self.created_at > now {
            self.created_at = now;
            changed = true;
        }
        if self.modified_at < self.created_at {
            self.modified_at = self.created_at;
            changed = true;
        }

        let repaired_tags = sanitize_tags(&self.tags);
        if repaired_tags != self.tags {
            self.tags = repaired_tags;
            changed = true;
        }

        changed
    }
}

/// Normalize a raw tag: trim, strip a leading `#`, then validate.
///
/// Returns `None` when the result is empty, longer than [`MAX_TAG_LEN`]
/// characters, or contains `#`, whitespace, or control characters.
pub fn sanitize_tag(raw: &str) -> Option<String> {
    let tag = raw.trim().trim_start_matches('#');
    if tag.is_empty() || tag.chars().count() > MAX_TAG_LEN {
        return None;
    }
    if tag
        .chars()
        .any(|c| c == '#' || c.is_whitespace() || c.is_control())
    {
        return None;
    }
    Some(tag.to_string())
}

/// Sanitize a whole tag list: validate each entry, deduplicate
/// case-insensitively (first occurrence wins), cap at the per-note limit.
pub fn sanitize_tags(raw: &[String]) -> Vec<String> {
    let mut seen: Vec<String> = Vec::new();
    let mut out: Vec<String> = Vec::new();
    for tag in raw {
        let Some(tag) = sanitize_tag(tag) else {
            continue;
        };
        let key = tag.to_lowercase();
        if seen.contains(&key) {
            continue;
        }
        seen.push(key);
        out.push(tag);
        if out.len() == MAX_TAGS_PER_NOTE {
            break;
        }
    }
    out
}

// ============================================================================
// Filter State
// ============================================================================

/// Transient view filter state. Never persisted.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FilterState {
    /// Show archived notes instead of active ones
    pub archived: bool,
    /// Full-text search string; empty means no search
    pub search: String,
    /// Restrict to a single priority
    pub priority: Option<Priority>,
    /// Only favorites
    pub favorites_only: bool,
    /// Restrict to notes carrying this exact tag
    pub tag: Option<String>,
    /// Sort applied after filtering
    pub sort: SortOption,
}

// ============================================================================
// Aggregate statistics
// ============================================================================

/// Aggregate statistics over the whole collection
#[derive(Debug, Clone, Copy, Default, Serialize, PartialEq, Eq)]
pub struct NoteStats {
    /// Non-archived notes
    pub active: usize,
    /// Notes flagged favorite
    pub favorites: usize,
    /// Archived notes
    pub archived: usize,
    /// Sum of word counts across all notes
    pub total_words: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_priority_display_and_parse() {
        for (priority, expected) in [
            (Priority::Low, "low"),
            (Priority::Normal, "normal"),
            (Priority::High, "high"),
        ] {
            assert_eq!(priority.to_string(), expected);
            assert_eq!(Priority::from_str(expected).unwrap(), priority);
        }
        assert!(Priority::from_str("urgent").is_err());
    }

    #[test]
    fn test_priority_ranks() {
        assert!(Priority::High.rank() > Priority::Normal.rank());
        assert!(Priority::Normal.rank() > Priority::Low.rank());
    }

    #[test]
    fn test_sort_option_parse_aliases() {
        assert_eq!(SortOption::from_str("modified").unwrap(), SortOption::DateModified);
        assert_eq!(SortOption::from_str("word-count").unwrap(), SortOption::WordCount);
        assert!(SortOption::from_str("color").is_err());
    }

    #[test]
    fn test_note_creation_defaults() {
        let note = Note::new("Buy milk and eggs");
        assert_eq!(note.title, "untitled");
        assert_eq!(note.content, "Buy milk and eggs");
        assert_eq!(note.priority, Priority::Normal);
        assert!(!note.favorite);
        assert!(!note.archived);
        assert!(note.tags.is_empty());
        assert_eq!(note.created_at, note.modified_at);
    }

    #[test]
    fn test_word_count() {
        let note = Note::new("  one two   three\nfour ");
        assert_eq!(note.word_count(), 4);

        let empty = Note::new("");
        // Placeholder content still counts its own tokens
        assert_eq!(empty.content, "(no content)");
    }

    #[test]
    fn test_add_tag_rejects_case_insensitive_duplicate() {
        let mut note = Note::new("tagged");
        note.add_tag("work").unwrap();
        assert_eq!(note.add_tag("Work"), Err(StoreError::DuplicateTag("Work".into())));
        assert_eq!(note.tags, vec!["work"]);
    }

    #[test]
    fn test_add_tag_validation() {
        let mut note = Note::new("tagged");
        assert!(matches!(note.add_tag("  #projects "), Ok(())));
        assert_eq!(note.tags, vec!["projects"]);
        assert!(matches!(note.add_tag("has space"), Err(StoreError::InvalidTag(_))));
        assert!(matches!(
            note.add_tag("a-very-long-tag-name-way-over-the-limit"),
            Err(StoreError::InvalidTag(_))
        ));
        assert!(matches!(note.add_tag(""), Err(StoreError::InvalidTag(_))));
    }

    #[test]
    fn test_add_tag_limit() {
        let mut note = Note::new("tagged");
        for i in 0..MAX_TAGS_PER_NOTE {
            note.add_tag(&format!("tag{}", i)).unwrap();
        }
        assert_eq!(note.add_tag("overflow"), Err(StoreError::TagLimit));
    }

    #[test]
    fn test_repair_placeholders() {
        let mut note = Note::new("body");
        note.title = "   ".into();
        note.content = "".into();
        assert!(note.repair(Utc::now()));
        assert_eq!(note.title, "untitled");
        assert_eq!(note.content, "(no content)");
    }

    #[test]
    fn test_repair_timestamps() {
        let now = Utc::now();
        let mut note = Note::new("body");
        note.created_at = now + Duration::days(2);
        note.modified_at = now - Duration::days(5);
        assert!(note.repair(now));
        assert_eq!(note.created_at, now);
        assert!(note.modified_at >= note.created_at);
    }

    #[test]
    fn test_repair_tags() {
        let mut note = Note::new("body");
        note.tags = vec![
            " work ".into(),
            "Work".into(),
            "bad tag".into(),
            "".into(),
            "ok".into(),
        ];
        assert!(note.repair(Utc::now()));
        assert_eq!(note.tags, vec!["work", "ok"]);
    }

    #[test]
    fn test_repair_valid_note_is_untouched() {
        let original = Note::new_full("Title", "Content here", Priority::High, vec!["a".into()]);
        let mut copy = original.clone();
        assert!(!copy.repair(Utc::now()));
        assert_eq!(copy, original);
    }

    #[test]
    fn test_note_serialization_round_trip() {
        let mut note = Note::new_full("Title", "Some content", Priority::Low, vec!["t".into()]);
        note.reminder = Some(Utc::now());

        let json = serde_json::to_string(&note).unwrap();
        let back: Note = serde_json::from_str(&json).unwrap();
        assert_eq!(note, back);
    }
}
