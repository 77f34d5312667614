//! Encoding, opportunistic compression, and lenient decoding
//!
//! The persisted format is a JSON array of note records, optionally gzipped.
//! Whether a payload is compressed is detected by trial, not by a stored
//! flag: decoding always attempts decompression first and silently falls
//! through to the raw bytes.
//!
//! Decoding is permissive at field level: a field that fails to decode is
//! replaced by a type-appropriate default instead of failing the record, and
//! every decoded note passes through the invariant repair.

use super::{Result, StorageError};
use crate::notes::{Note, Priority};
use chrono::{DateTime, Utc};
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Deserializer};
use std::io::{Read, Write};
use uuid::Uuid;

/// Encode the full collection to compact JSON
pub fn encode_notes(notes: &[Note]) -> Result<Vec<u8>> {
    serde_json::to_vec(notes).map_err(StorageError::Encode)
}

/// Compress the payload when it exceeds `threshold` bytes.
///
/// Compression failure is non-fatal: the uncompressed bytes are stored
/// instead, and the fallback is logged.
pub fn maybe_compress(bytes: Vec<u8>, threshold: usize) -> Vec<u8> {
    if bytes.len() <= threshold {
        return bytes;
    }
    match gzip(&bytes) {
        Ok(compressed) => {
            tracing::debug!(
                raw = bytes.len(),
                compressed = compressed.len(),
                "compressed notes payload"
            );
            compressed
        }
        Err(e) => {
            let e = StorageError::Compression(e);
            tracing::warn!(
                error = %e,
                bytes = bytes.len(),
                "storing uncompressed"
            );
            bytes
        }
    }
}

fn gzip(bytes: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes)?;
    encoder.finish()
}

/// Attempt gzip decompression; fall through to the raw bytes when the
/// payload was not compressed.
pub fn decompress_or_raw(bytes: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    match GzDecoder::new(bytes).read_to_end(&mut out) {
        Ok(_) => out,
        Err(_) => bytes.to_vec(),
    }
}

/// Decode a stored payload into repaired notes
pub fn decode_notes(bytes: &[u8]) -> Result<Vec<Note>> {
    let raw = decompress_or_raw(bytes);
    let records: Vec<NoteRecord> =
        serde_json::from_slice(&raw).map_err(StorageError::Decode)?;

    let now = Utc::now();
    Ok(records.into_iter().map(|r| r.into_note(now)).collect())
}

// ============================================================================
// Lenient record decoding
// ============================================================================

/// Deserialize a field, substituting the type default when the stored value
/// fails to decode
fn lenient<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: serde::de::DeserializeOwned + Default,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value).unwrap_or_default())
}

/// Persisted note record with per-field fallbacks.
///
/// Field names match [`Note`]'s serialization exactly, so a healthy payload
/// round-trips unchanged.
#[derive(Debug, Default, Deserialize)]
struct NoteRecord {
    #[serde(default, deserialize_with = "lenient")]
    id: Option<Uuid>,
    #[serde(default, deserialize_with = "lenient")]
    title: String,
    #[serde(default, deserialize_with = "lenient")]
    content: String,
    #[serde(default, deserialize_with = "lenient")]
    created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient")]
    modified_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient")]
    priority: Priority,
    #[serde(default, deserialize_with = "lenient")]
    favorite: bool,
    #[serde(default, deserialize_with = "lenient")]
    archived: bool,
    #[serde(default, deserialize_with = "lenient")]
    tags: Vec<String>,
    #[serde(default, deserialize_with = "lenient")]
    reminder: Option<DateTime<Utc>>,
}

impl NoteRecord {
    fn into_note(self, now: DateTime<Utc>) -> Note {
        let created_at = self.created_at.unwrap_or(now);
        let mut note = Note {
            id: self.id.unwrap_or_else(Uuid::new_v4),
            title: self.title,
            content: self.content,
            created_at,
            modified_at: self.modified_at.unwrap_or(created_at),
            priority: self.priority,
            favorite: self.favorite,
            archived: self.archived,
            tags: self.tags,
            reminder: self.reminder,
        };
        note.repair(now);
        note
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_notes(n: usize) -> Vec<Note> {
        (0..n)
            .map(|i| Note::new_full(format!("note {}", i), format!("content {}", i), Priority::Normal, vec![]))
            .collect()
    }

    #[test]
    fn test_round_trip_uncompressed() {
        let notes = sample_notes(3);
        let bytes = encode_notes(&notes).unwrap();
        let decoded = decode_notes(&bytes).unwrap();
        assert_eq!(decoded, notes);
    }

    #[test]
    fn test_round_trip_compressed() {
        let notes = sample_notes(5);
        let encoded = encode_notes(&notes).unwrap();
        let payload = maybe_compress(encoded.clone(), 16);
        assert_ne!(payload, encoded);
        // gzip magic bytes
        assert_eq!(&payload[..2], &[0x1f, 0x8b]);

        let decoded = decode_notes(&payload).unwrap();
        assert_eq!(decoded, notes);
    }

    #[test]
    fn test_small_payload_stays_uncompressed() {
        let notes = sample_notes(1);
        let encoded = encode_notes(&notes).unwrap();
        let payload = maybe_compress(encoded.clone(), 1024 * 1024);
        assert_eq!(payload, encoded);
    }

    #[test]
    fn test_decompress_falls_through_on_raw_bytes() {
        let raw = br#"[{"title":"t"}]"#;
        assert_eq!(decompress_or_raw(raw), raw.to_vec());
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_notes(b"not json at all").is_err());
    }

    #[test]
    fn test_lenient_field_defaults() {
        // priority is a number, favorite is a string, created_at is nonsense:
        // each falls back to its default instead of failing the record
        let json = br#"[{
            "id": "not-a-uuid",
            "title": "kept",
            "content": "also kept",
            "created_at": 12,
            "modified_at": "garbage",
            "priority": 7,
            "favorite": "yes",
            "tags": ["ok", "bad tag"],
            "reminder": {}
        }]"#;

        let notes = decode_notes(json).unwrap();
        assert_eq!(notes.len(), 1);
        let note = &notes[0];
        assert_eq!(note.title, "kept");
        assert_eq!(note.content, "also kept");
        assert_eq!(note.priority, Priority::Normal);
        assert!(!note.favorite);
        assert!(note.reminder.is_none());
        assert!(!note.id.is_nil());
        assert_eq!(note.tags, vec!["ok"]);
        assert!(note.modified_at >= note.created_at);
    }

    #[test]
    fn test_decode_missing_fields_gets_placeholders() {
        let json = br#"[{}]"#;
        let notes = decode_notes(json).unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].title, "untitled");
        assert_eq!(notes[0].content, "(no content)");
    }
}
