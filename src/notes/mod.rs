//! Note management engine
//!
//! The in-memory core: the note collection and its mutations, the memoized
//! filter/sort pipeline, the bounded derived-stats cache, and the lifecycle
//! coordinator that sweeps caches and reacts to foreground/background
//! transitions and memory pressure.

pub mod cache;
pub mod export;
pub mod lifecycle;
pub mod manager;
pub mod models;
pub mod query;

pub use cache::{CacheKey, CacheValue, StatsCache};
pub use lifecycle::{LifecycleConfig, LifecycleCoordinator};
pub use manager::NoteManager;
pub use models::{
    FilterState, Note, NoteStats, Priority, SortOption, StoreError, MAX_TAGS_PER_NOTE,
    MAX_TAG_LEN,
};
pub use query::QueryEngine;
