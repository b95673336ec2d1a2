//! Note store facade.
//!
//! [`NoteStore`] is the typed interface the editor and note list use to reach
//! persistence. It is agnostic of the storage mechanism; [`crate::FileNoteStore`]
//! keeps notes as JSON files and [`MemoryNoteStore`] keeps them in memory.
use std::{
    collections::HashMap,
    future::Future,
    sync::Mutex,
};

use chrono::Utc;
use log::debug;

use crate::{note_id_for, Note, NoteFields, NoteMetadata, NotesError, Result};

/// Abstract interface for note persistence.
pub trait NoteStore {
    /// Loads a note by id, `Ok(None)` when it does not exist
    fn load(&self, id: &str) -> impl Future<Output = Result<Option<Note>>> + Send;

    /// Creates a note and returns the id the store assigned to it
    fn save(&self, fields: NoteFields) -> impl Future<Output = Result<String>> + Send;

    /// Replaces the editable fields of an existing note
    fn update(&self, id: &str, fields: NoteFields) -> impl Future<Output = Result<()>> + Send;

    /// Permanently removes a note
    fn delete(&self, id: &str) -> impl Future<Output = Result<()>> + Send;

    /// Metadata of every note, most recently updated first
    fn list(&self) -> impl Future<Output = Result<Vec<NoteMetadata>>> + Send;
}

/// Sorts metadata by `updated_at`, newest first
pub fn sort_by_recent(notes: &mut [NoteMetadata]) {
    notes.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
}

/// In-memory storage for tests and embedding.
/// Does NOT persist data.
#[derive(Default)]
pub struct MemoryNoteStore {
    notes: Mutex<HashMap<String, Note>>,
}

impl MemoryNoteStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that already holds `notes`
    pub fn with_notes(notes: impl IntoIterator<Item = Note>) -> Self {
        let map = notes.into_iter().map(|n| (n.id.clone(), n)).collect();
        Self {
            notes: Mutex::new(map),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Note>>> {
        self.notes
            .lock()
            .map_err(|_| NotesError::LockAcquisitionFailed {
                message: "Failed to acquire lock on in-memory notes".to_string(),
            })
    }
}

impl NoteStore for MemoryNoteStore {
    async fn load(&self, id: &str) -> Result<Option<Note>> {
        Ok(self.lock()?.get(id).cloned())
    }

    async fn save(&self, fields: NoteFields) -> Result<String> {
        let mut notes = self.lock()?;
        let now = Utc::now();
        let mut id = note_id_for(now);
        let mut bump = 1;
        while notes.contains_key(&id) {
            id = format!("{}_{}", note_id_for(now), bump);
            bump += 1;
        }

        debug!("Creating in-memory note {}", id);
        notes.insert(id.clone(), Note::with_id(id.clone(), fields, now));
        Ok(id)
    }

    async fn update(&self, id: &str, fields: NoteFields) -> Result<()> {
        let mut notes = self.lock()?;
        let note = notes.get_mut(id).ok_or_else(|| NotesError::NoteNotFound {
            id: id.to_string(),
        })?;

        note.title = fields.title;
        note.content = fields.content;
        note.links = fields.links;
        note.updated_at = Utc::now();
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        match self.lock()?.remove(id) {
            Some(_) => Ok(()),
            None => Err(NotesError::NoteNotFound { id: id.to_string() }),
        }
    }

    async fn list(&self) -> Result<Vec<NoteMetadata>> {
        let mut notes: Vec<NoteMetadata> = self.lock()?.values().map(NoteMetadata::from).collect();
        sort_by_recent(&mut notes);
        Ok(notes)
    }
}

// --- Test Fixtures ---

#[cfg(test)]
pub(crate) mod fixtures {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use super::*;

    /// Wraps [`MemoryNoteStore`], counting mutating calls and optionally failing them
    #[derive(Default)]
    pub struct RecordingStore {
        pub inner: MemoryNoteStore,
        pub saves: AtomicUsize,
        pub updates: AtomicUsize,
        pub deletes: AtomicUsize,
        failing: AtomicBool,
    }

    impl RecordingStore {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn with_note(title: &str, content: &str, links: &[&str]) -> (Self, String) {
            let note = Note::with_id(
                "note_1".to_string(),
                NoteFields::new(title, content, links.iter().map(|l| l.to_string()).collect()),
                Utc::now(),
            );
            let id = note.id.clone();
            let store = Self {
                inner: MemoryNoteStore::with_notes([note]),
                ..Self::default()
            };
            (store, id)
        }

        pub fn set_failing(&self, failing: bool) {
            self.failing.store(failing, Ordering::SeqCst);
        }

        pub fn saves(&self) -> usize {
            self.saves.load(Ordering::SeqCst)
        }

        pub fn updates(&self) -> usize {
            self.updates.load(Ordering::SeqCst)
        }

        pub fn deletes(&self) -> usize {
            self.deletes.load(Ordering::SeqCst)
        }

        fn check(&self) -> Result<()> {
            if self.failing.load(Ordering::SeqCst) {
                Err(NotesError::ApplicationError {
                    message: "store offline".to_string(),
                })
            } else {
                Ok(())
            }
        }
    }

    impl NoteStore for RecordingStore {
        async fn load(&self, id: &str) -> Result<Option<Note>> {
            self.check()?;
            self.inner.load(id).await
        }

        async fn save(&self, fields: NoteFields) -> Result<String> {
            self.saves.fetch_add(1, Ordering::SeqCst);
            self.check()?;
            self.inner.save(fields).await
        }

        async fn update(&self, id: &str, fields: NoteFields) -> Result<()> {
            self.updates.fetch_add(1, Ordering::SeqCst);
            self.check()?;
            self.inner.update(id, fields).await
        }

        async fn delete(&self, id: &str) -> Result<()> {
            self.deletes.fetch_add(1, Ordering::SeqCst);
            self.check()?;
            self.inner.delete(id).await
        }

        async fn list(&self) -> Result<Vec<NoteMetadata>> {
            self.check()?;
            self.inner.list().await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_store_crud() {
        let store = MemoryNoteStore::new();
        let id = store
            .save(NoteFields::new("First", "body", vec!["https://a.com".into()]))
            .await
            .unwrap();

        let loaded = store.load(&id).await.unwrap().unwrap();
        assert_eq!(loaded.title, "First");
        assert_eq!(loaded.links, vec!["https://a.com"]);

        store
            .update(&id, NoteFields::new("Renamed", "body", vec![]))
            .await
            .unwrap();
        let loaded = store.load(&id).await.unwrap().unwrap();
        assert_eq!(loaded.title, "Renamed");
        assert!(loaded.updated_at >= loaded.created_at);

        assert_eq!(store.list().await.unwrap().len(), 1);
        store.delete(&id).await.unwrap();
        assert!(store.load(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn memory_store_assigns_distinct_ids() {
        let store = MemoryNoteStore::new();
        let a = store.save(NoteFields::new("a", "", vec![])).await.unwrap();
        let b = store.save(NoteFields::new("b", "", vec![])).await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn unknown_ids_are_reported() {
        let store = MemoryNoteStore::new();
        assert!(matches!(
            store.update("missing", NoteFields::default()).await,
            Err(NotesError::NoteNotFound { .. })
        ));
        assert!(matches!(
            store.delete("missing").await,
            Err(NotesError::NoteNotFound { .. })
        ));
    }
}
