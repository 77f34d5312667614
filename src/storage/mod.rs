//! Persistence layer
//!
//! Notes are stored as opaque byte blobs under two keys: a primary and a
//! backup mirror. Saving encodes the whole collection, compresses large
//! payloads, writes the primary, then mirrors the same bytes to the backup.
//! Loading reads the primary and falls back to the backup, then to the empty
//! collection. Storage failures degrade silently and are reported through
//! logs only, never to the caller.

pub mod codec;
pub mod file;
pub mod memory;

use crate::notes::Note;
use async_trait::async_trait;
use std::sync::Arc;
use thiserror::Error;

pub use file::FileBackend;
pub use memory::MemoryBackend;

/// Primary storage key for the encoded note collection
pub const PRIMARY_KEY: &str = "SavedNotes";

/// Backup mirror of the primary key
pub const BACKUP_KEY: &str = "SavedNotesBackup";

/// Persisted display-preference flag
pub const DARK_MODE_KEY: &str = "isDarkMode";

/// Encoded size above which the payload is gzip-compressed (1 MiB)
pub const DEFAULT_COMPRESSION_THRESHOLD: usize = 1024 * 1024;

/// Errors raised inside the persistence layer.
///
/// These never propagate to the engine's consumers; each has a defined
/// fallback (backup-only write, backup read, raw bytes, empty collection).
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("encode failed: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("decode failed: {0}")]
    Decode(#[source] serde_json::Error),
    #[error("compression failed: {0}")]
    Compression(#[source] std::io::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, StorageError>;

/// Opaque key-value byte storage.
///
/// Implementations must tolerate concurrent writers: the engine never
/// coalesces saves, so the last completed write wins.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Read the blob stored under `key`. `None` when the key is absent.
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Write `bytes` under `key`, replacing any previous value.
    async fn write(&self, key: &str, bytes: &[u8]) -> Result<()>;

    /// Remove the blob under `key`. Absent keys are not an error.
    async fn remove(&self, key: &str) -> Result<()>;
}

// ============================================================================
// Persister
// ============================================================================

/// Save/load routine over a [`StorageBackend`].
///
/// Cheap to clone; the detached-save wrapper clones it into the spawned task.
#[derive(Clone)]
pub struct Persister {
    backend: Arc<dyn StorageBackend>,
    compression_threshold: usize,
}

impl Persister {
    pub fn new(backend: Arc<dyn StorageBackend>) -> Self {
        Self {
            backend,
            compression_threshold: DEFAULT_COMPRESSION_THRESHOLD,
        }
    }

    /// Override the compression threshold (tests exercise the compression
    /// path with small collections this way)
    pub fn with_compression_threshold(mut self, threshold: usize) -> Self {
        self.compression_threshold = threshold;
        self
    }

    /// Durably save the collection: encode, compress when large, write the
    /// primary key, then mirror the same bytes to the backup key.
    ///
    /// On whole-collection encode failure, falls back to a best-effort
    /// backup-only write of the notes that still encode individually.
    pub async fn save(&self, notes: &[Note]) -> Result<()> {
        let encoded = match codec::encode_notes(notes) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    count = notes.len(),
                    "encode failed, attempting backup-only salvage write"
                );
                return self.salvage_to_backup(notes).await;
            }
        };

        let payload = codec::maybe_compress(encoded, self.compression_threshold);

        self.backend.write(PRIMARY_KEY, &payload).await?;
        self.backend.write(BACKUP_KEY, &payload).await?;

        tracing::debug!(
            count = notes.len(),
            bytes = payload.len(),
            "notes saved to primary and backup"
        );
        Ok(())
    }

    /// Fire-and-forget save: snapshots are encoded and written off the
    /// interactive path; the outcome is only logged.
    pub fn save_detached(&self, notes: Vec<Note>) {
        let persister = self.clone();
        tokio::spawn(async move {
            if let Err(e) = persister.save(&notes).await {
                tracing::warn!(error = %e, count = notes.len(), "background save failed");
            }
        });
    }

    /// Best-effort backup-only write: encode notes individually, skip the
    /// ones that fail, and write the surviving subset to the backup key.
    async fn salvage_to_backup(&self, notes: &[Note]) -> Result<()> {
        let salvageable: Vec<&Note> = notes
            .iter()
            .filter(|n| serde_json::to_vec(n).is_ok())
            .collect();

        let bytes =
            serde_json::to_vec(&salvageable).map_err(StorageError::Encode)?;
        self.backend.write(BACKUP_KEY, &bytes).await?;

        tracing::warn!(
            salvaged = salvageable.len(),
            dropped = notes.len() - salvageable.len(),
            bytes = bytes.len(),
            "salvage write to backup completed"
        );
        Ok(())
    }

    /// Load the collection: primary first, then backup, then empty.
    ///
    /// A successful backup recovery immediately re-writes the primary key.
    /// Never fails: data loss is accepted over a fatal error.
    pub async fn load(&self) -> Vec<Note> {
        match self.backend.read(PRIMARY_KEY).await {
            Ok(Some(bytes)) => match codec::decode_notes(&bytes) {
                Ok(notes) => {
                    tracing::debug!(count = notes.len(), bytes = bytes.len(), "loaded notes");
                    return notes;
                }
                Err(e) => {
                    tracing::warn!(
                        error = %e,
                        bytes = bytes.len(),
                        "primary decode failed, trying backup"
                    );
                }
            },
            Ok(None) => {
                tracing::debug!("no primary notes blob, trying backup");
            }
            Err(e) => {
                tracing::warn!(error = %e, "primary read failed, trying backup");
            }
        }

        match self.backend.read(BACKUP_KEY).await {
            Ok(Some(bytes)) => match codec::decode_notes(&bytes) {
                Ok(notes) => {
                    tracing::info!(
                        count = notes.len(),
                        bytes = bytes.len(),
                        "recovered notes from backup, re-saving primary"
                    );
                    if let Err(e) = self.backend.write(PRIMARY_KEY, &bytes).await {
                        tracing::warn!(error = %e, "failed to re-save primary after recovery");
                    }
                    notes
                }
                Err(e) => {
                    tracing::warn!(error = %e, "backup decode failed, starting empty");
                    Vec::new()
                }
            },
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::warn!(error = %e, "backup read failed, starting empty");
                Vec::new()
            }
        }
    }

    /// Read a persisted boolean flag (e.g. the dark-mode preference)
    pub async fn load_flag(&self, key: &str) -> Option<bool> {
        match self.backend.read(key).await {
            Ok(Some(bytes)) => Some(bytes.first().is_some_and(|b| *b != 0)),
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(error = %e, key, "flag read failed");
                None
            }
        }
    }

    /// Persist a boolean flag off the interactive path
    pub fn save_flag_detached(&self, key: &'static str, value: bool) {
        let backend = self.backend.clone();
        tokio::spawn(async move {
            if let Err(e) = backend.write(key, &[u8::from(value)]).await {
                tracing::warn!(error = %e, key, "flag write failed");
            }
        });
    }
}
