//! Core data structures for the linknotes application.
//!
//! This module contains the persisted note entity, the lightweight metadata
//! shown in the note list and the editable field set handed to the store.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Maximum number of characters allowed in a note title
pub const TITLE_MAX_CHARS: usize = 100;

/// Title used when a note is saved with an empty title
pub const DEFAULT_TITLE: &str = "Untitled Note";

/// Represents a single note in our system
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    /// Unique identifier for the note
    pub id: String,
    /// Note title
    pub title: String,
    /// Rich-text markup produced by the editor
    pub content: String,
    /// Normalized links, in insertion order
    pub links: Vec<String>,
    /// When the note was created
    pub created_at: DateTime<Utc>,
    /// Last modification time
    pub updated_at: DateTime<Utc>,
}

impl Note {
    /// Creates a new note from the given fields
    pub fn new(fields: NoteFields) -> Self {
        let now = Utc::now();
        Self::with_id(note_id_for(now), fields, now)
    }

    /// Creates a note with an explicit id and creation time
    pub fn with_id(id: String, fields: NoteFields, created_at: DateTime<Utc>) -> Self {
        Note {
            id,
            title: fields.title,
            content: fields.content,
            links: fields.links,
            created_at,
            updated_at: created_at,
        }
    }

    /// The editable part of the note
    pub fn fields(&self) -> NoteFields {
        NoteFields {
            title: self.title.clone(),
            content: self.content.clone(),
            links: self.links.clone(),
        }
    }

    pub fn metadata(&self) -> NoteMetadata {
        NoteMetadata::from(self)
    }
}

/// Builds the identifier for a note created at `at`
pub fn note_id_for(at: DateTime<Utc>) -> String {
    format!("note_{}", at.timestamp_millis())
}

/// The fields a caller provides when creating or updating a note
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteFields {
    pub title: String,
    pub content: String,
    pub links: Vec<String>,
}

impl NoteFields {
    pub fn new(title: impl Into<String>, content: impl Into<String>, links: Vec<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            links,
        }
    }

    /// True when both title and content are empty after trimming.
    /// Such a note is never persisted.
    pub fn is_blank(&self) -> bool {
        self.title.trim().is_empty() && self.content.trim().is_empty()
    }

    /// The trimmed title, or [`DEFAULT_TITLE`] when it is empty
    pub fn effective_title(&self) -> String {
        let trimmed = self.title.trim();
        if trimmed.is_empty() {
            DEFAULT_TITLE.to_string()
        } else {
            trimmed.to_string()
        }
    }
}

/// Summary of a note as shown in the note list
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteMetadata {
    pub id: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Note> for NoteMetadata {
    fn from(note: &Note) -> Self {
        NoteMetadata {
            id: note.id.clone(),
            title: note.title.clone(),
            created_at: note.created_at,
            updated_at: note.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_fields_ignore_whitespace_and_links() {
        let fields = NoteFields::new("  ", "\n\t", vec!["https://example.com".into()]);
        assert!(fields.is_blank());
        assert!(!NoteFields::new("x", "", vec![]).is_blank());
        assert!(!NoteFields::new("", "body", vec![]).is_blank());
    }

    #[test]
    fn effective_title_defaults_when_empty() {
        assert_eq!(NoteFields::new("   ", "body", vec![]).effective_title(), DEFAULT_TITLE);
        assert_eq!(NoteFields::new(" Groceries ", "", vec![]).effective_title(), "Groceries");
    }

    #[test]
    fn new_note_uses_timestamp_id() {
        let note = Note::new(NoteFields::new("A", "b", vec![]));
        assert!(note.id.starts_with("note_"));
        assert_eq!(note.created_at, note.updated_at);
        assert_eq!(note.metadata().title, "A");
    }
}
