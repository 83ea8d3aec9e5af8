//! In-memory note book
//!
//! Notes live for the session only. Titles and contents are trimmed and
//! must not be empty.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum NoteError {
    #[error("Note {0} is empty")]
    EmptyField(&'static str),

    #[error("Note not found: {0}")]
    NotFound(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub id: String,
    pub title: String,
    pub content: String,
    /// Milliseconds since the epoch
    pub created_at: u64,
    pub updated_at: u64,
}

#[derive(Debug, Default)]
pub struct NoteBook {
    notes: Vec<Note>,
    last_id: u64,
}

fn now_millis() -> u64 {
    u64::try_from(Utc::now().timestamp_millis()).unwrap_or_default()
}

fn clean(value: &str, field: &'static str) -> Result<String, NoteError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(NoteError::EmptyField(field));
    }
    Ok(trimmed.to_string())
}

impl NoteBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Note book holding one welcome note
    pub fn with_welcome() -> Self {
        let mut book = Self::new();
        // Literal title and content are never empty
        let _ = book.add(
            "Welcome to your notes!",
            "Capture your thoughts and ideas here.",
        );
        book
    }

    /// Ids are creation time in milliseconds, bumped when two notes land in
    /// the same millisecond.
    fn next_id(&mut self, now: u64) -> String {
        self.last_id = now.max(self.last_id + 1);
        self.last_id.to_string()
    }

    /// Create a note at the top of the list
    pub fn add(&mut self, title: &str, content: &str) -> Result<&Note, NoteError> {
        let title = clean(title, "title")?;
        let content = clean(content, "content")?;

        let now = now_millis();
        let note = Note {
            id: self.next_id(now),
            title,
            content,
            created_at: now,
            updated_at: now,
        };
        self.notes.insert(0, note);
        Ok(&self.notes[0])
    }

    pub fn update(&mut self, id: &str, title: &str, content: &str) -> Result<&Note, NoteError> {
        let title = clean(title, "title")?;
        let content = clean(content, "content")?;

        let note = self
            .notes
            .iter_mut()
            .find(|note| note.id == id)
            .ok_or_else(|| NoteError::NotFound(id.to_string()))?;

        note.title = title;
        note.content = content;
        note.updated_at = now_millis().max(note.created_at);
        Ok(note)
    }

    pub fn delete(&mut self, id: &str) -> Result<Note, NoteError> {
        let index = self
            .notes
            .iter()
            .position(|note| note.id == id)
            .ok_or_else(|| NoteError::NotFound(id.to_string()))?;
        Ok(self.notes.remove(index))
    }

    pub fn get(&self, id: &str) -> Option<&Note> {
        self.notes.iter().find(|note| note.id == id)
    }

    /// Notes, newest first
    pub fn list(&self) -> &[Note] {
        &self.notes
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }
}
