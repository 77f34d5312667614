//! Plain-text export of the whole collection
//!
//! Produces the string handed to the external share collaborator: a header
//! with the export timestamp and total count, then one block per note.

use super::models::Note;
use chrono::{DateTime, Utc};

const TIMESTAMP_FMT: &str = "%Y-%m-%d %H:%M UTC";

/// Render all notes as plain text
pub fn render(notes: &[Note], exported_at: DateTime<Utc>) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Notes export - {}\nTotal notes: {}\n",
        exported_at.format(TIMESTAMP_FMT),
        notes.len()
    ));

    for note in notes {
        out.push_str("\n----------------------------------------\n");
        out.push_str(&render_note(note));
    }
    out
}

fn render_note(note: &Note) -> String {
    let mut flags = Vec::new();
    if note.favorite {
        flags.push("favorite");
    }
    if note.archived {
        flags.push("archived");
    }
    let flags = if flags.is_empty() {
        String::new()
    } else {
        format!(" [{}]", flags.join(", "))
    };

    let tags = if note.tags.is_empty() {
        "-".to_string()
    } else {
        note.tags.join(", ")
    };

    format!(
        "{}{}\nPriority: {}\nCreated: {} | Modified: {}\nTags: {}\nWords: {}\n\n{}\n",
        note.title,
        flags,
        note.priority,
        note.created_at.format(TIMESTAMP_FMT),
        note.modified_at.format(TIMESTAMP_FMT),
        tags,
        note.word_count(),
        note.content
    )
}
