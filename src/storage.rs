use std::{
    collections::HashMap,
    fs,
    io::Write,
    path::{Path, PathBuf},
    sync::{mpsc as std_mpsc, Arc, Mutex, MutexGuard},
    time::Duration,
};

use chrono::Utc;
use log::{debug, error, info, trace, warn};
use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tempfile::NamedTempFile;
use tokio::sync::mpsc;
use walkdir::WalkDir;

use crate::{
    handle_fs_event, load_note_from_file, note_id_for, sort_by_recent, Config, EventBus, Note,
    NoteFields, NoteMetadata, NoteStore, NotesError, Result,
};

/// Stores each note as a JSON file in the notes directory and keeps an
/// in-memory cache of all of them.
pub struct FileNoteStore {
    /// Directory where note files live
    notes_dir: PathBuf,

    /// In-memory cache of notes, indexed by note ID
    notes_cache: Arc<Mutex<HashMap<String, Note>>>,

    /// File system watcher to detect changes made outside the application
    watcher: Mutex<Option<RecommendedWatcher>>,

    /// Flag indicating if the cache has been populated
    initialized: bool,
}

impl FileNoteStore {
    /// Creates a store rooted at the configured notes directory.
    ///
    /// Nothing touches the disk until [`FileNoteStore::initialize`] is called.
    pub fn new(config: &Config) -> Self {
        Self::in_dir(config.notes_dir.clone())
    }

    pub fn in_dir(notes_dir: PathBuf) -> Self {
        Self {
            notes_dir,
            notes_cache: Arc::new(Mutex::new(HashMap::new())),
            watcher: Mutex::new(None),
            initialized: false,
        }
    }

    pub fn notes_dir(&self) -> &Path {
        &self.notes_dir
    }

    /// Creates the notes directory if needed and loads every note into the cache
    pub fn initialize(&mut self) -> Result<usize> {
        if self.initialized {
            return Ok(self.cache()?.len());
        }

        info!(
            "Initializing FileNoteStore in {}",
            self.notes_dir.display()
        );

        if !self.notes_dir.exists() {
            debug!(
                "Notes directory does not exist, creating: {}",
                self.notes_dir.display()
            );
            fs::create_dir_all(&self.notes_dir).map_err(|e| {
                error!("Failed to create notes directory: {}", e);
                NotesError::DirectoryError {
                    path: self.notes_dir.clone(),
                }
            })?;
        }

        let count = self.load_notes()?;
        self.initialized = true;
        info!("FileNoteStore initialization complete ({} notes)", count);
        Ok(count)
    }

    /// Loads all notes from disk into the in-memory cache
    ///
    /// # Returns
    ///
    /// The number of notes loaded in case of success or an error
    pub fn load_notes(&mut self) -> Result<usize> {
        let mut notes_buffer = HashMap::new();
        let mut load_errors = 0;

        for entry in WalkDir::new(&self.notes_dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();

            if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
                match load_note_from_file(path) {
                    Ok(note) => {
                        notes_buffer.insert(note.id.clone(), note);
                    }
                    Err(e) => {
                        warn!("Failed to load note from {}: {}", path.display(), e);
                        load_errors += 1;
                    }
                }
            }
        }

        if load_errors > 0 {
            error!("Encountered {} errors while loading notes", load_errors);
        }

        let notes_count = notes_buffer.len();
        let mut cache = self.cache()?;
        cache.clear();
        cache.extend(notes_buffer);

        info!("Loaded {} notes into cache", notes_count);
        Ok(notes_count)
    }

    fn cache(&self) -> Result<MutexGuard<'_, HashMap<String, Note>>> {
        self.notes_cache
            .lock()
            .map_err(|_| NotesError::LockAcquisitionFailed {
                message: "Failed to acquire lock on notes cache".to_string(),
            })
    }

    /// Helper method to get the file path for a note
    fn get_note_path(&self, note_id: &str) -> PathBuf {
        self.notes_dir.join(format!("{}.json", note_id))
    }

    /// Ids end up in file names, so anything that could escape the notes
    /// directory is treated as unknown.
    fn is_valid_id(note_id: &str) -> bool {
        !note_id.is_empty()
            && note_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    }

    /// Writes a note to disk using atomic operations to prevent data corruption
    fn write_note(&self, note: &Note) -> Result<()> {
        let file_path = self.get_note_path(&note.id);
        debug!("Writing note {} to {}", note.id, file_path.display());

        if !self.notes_dir.exists() {
            fs::create_dir_all(&self.notes_dir).map_err(|e| {
                error!("Failed to create directory {}: {}", self.notes_dir.display(), e);
                NotesError::Io(e)
            })?;
        }

        let mut temp_file = NamedTempFile::new_in(&self.notes_dir).map_err(|e| {
            error!("Failed to create temporary file: {}", e);
            NotesError::Io(e)
        })?;

        trace!("Serializing note to JSON");
        let json = serde_json::to_string_pretty(note).map_err(|e| {
            error!("Failed to serialize note: {}", e);
            NotesError::Serialization(e)
        })?;

        temp_file.write_all(json.as_bytes()).map_err(|e| {
            error!("Failed to write to temporary file: {}", e);
            NotesError::Io(e)
        })?;

        temp_file.flush().map_err(|e| {
            error!("Failed to flush temporary file: {}", e);
            NotesError::Io(e)
        })?;

        temp_file.persist(&file_path).map_err(|e| {
            error!(
                "Failed to persist file {}: {}",
                file_path.display(),
                e.error
            );
            NotesError::Io(e.error)
        })?;

        self.cache()?.insert(note.id.clone(), note.clone());
        trace!("Cache updated for note {}", note.id);
        Ok(())
    }

    /// Retrieves a note by its ID, from the cache or else from disk
    pub fn get_note(&self, note_id: &str) -> Option<Note> {
        if !Self::is_valid_id(note_id) {
            debug!("Rejecting malformed note id: {:?}", note_id);
            return None;
        }

        match self.notes_cache.lock() {
            Ok(cache) => {
                if let Some(note) = cache.get(note_id) {
                    trace!("Note found in cache: {}", note_id);
                    return Some(note.clone());
                }
            }
            Err(e) => {
                error!("Failed to acquire lock on cache: {}", e);
            }
        }

        let file_path = self.get_note_path(note_id);
        if !file_path.exists() {
            debug!("Note not found: {}", note_id);
            return None;
        }

        match load_note_from_file(&file_path) {
            Ok(note) => {
                if let Ok(mut cache) = self.notes_cache.lock() {
                    cache.insert(note_id.to_string(), note.clone());
                }
                Some(note)
            }
            Err(e) => {
                error!("Error loading note from file: {}", e);
                None
            }
        }
    }

    /// Searches notes by title and content using fuzzy matching
    /// Returns a Vec of Notes sorted by relevance score
    pub fn search_notes(&self, query: &str) -> Vec<Note> {
        use fuzzy_matcher::skim::SkimMatcherV2;
        use fuzzy_matcher::FuzzyMatcher;

        info!("Searching notes with query: '{}'", query);
        let matcher = SkimMatcherV2::default();

        let notes: Vec<Note> = match self.notes_cache.lock() {
            Ok(cache) => cache.values().cloned().collect(),
            Err(err) => {
                error!("Failed to acquire lock on notes cache during search: {}", err);
                return Vec::new();
            }
        };

        let mut scored: Vec<(i64, Note)> = notes
            .into_iter()
            .filter_map(|note| {
                // title matches are weighted more heavily
                let title_score = matcher.fuzzy_match(&note.title, query).unwrap_or(0);
                let content_score = matcher.fuzzy_match(&note.content, query).unwrap_or(0);
                let score = title_score * 2 + content_score;
                (score > 0).then_some((score, note))
            })
            .collect();

        scored.sort_by(|a, b| b.0.cmp(&a.0));
        debug!("Found {} matching notes", scored.len());
        scored.into_iter().map(|(_, note)| note).collect()
    }

    /// Starts watching the notes directory for changes made by other processes.
    ///
    /// Must be called from within a tokio runtime.
    pub fn watch(&mut self, bus: EventBus) -> Result<()> {
        let slot = self
            .watcher
            .get_mut()
            .map_err(|_| NotesError::LockAcquisitionFailed {
                message: "Failed to acquire lock on file watcher".to_string(),
            })?;
        if slot.is_some() {
            debug!("File system watcher already initialized");
            return Ok(());
        }

        let (std_tx, std_rx) = std_mpsc::channel();
        let (tx, mut rx) = mpsc::channel(100);

        let mut watcher: RecommendedWatcher = Watcher::new(
            std_tx,
            notify::Config::default().with_poll_interval(Duration::from_secs(2)),
        )
        .map_err(|e| NotesError::WatcherError {
            message: format!("Failed to create file watcher: {}", e),
        })?;

        watcher
            .watch(&self.notes_dir, RecursiveMode::NonRecursive)
            .map_err(|e| NotesError::WatcherError {
                message: format!("Failed to watch directory: {}", e),
            })?;

        *slot = Some(watcher);
        let notes_cache = Arc::clone(&self.notes_cache);

        // bridge the blocking notify channel into tokio
        tokio::task::spawn_blocking(move || {
            while let Ok(event) = std_rx.recv() {
                if tx.blocking_send(event).is_err() {
                    break;
                }
            }
            debug!("File system event bridge stopped");
        });

        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                match event {
                    Ok(event) => {
                        trace!("File system event: {:?}", event.kind);
                        handle_fs_event(event, &notes_cache, &bus);
                    }
                    Err(e) => error!("File system watcher error: {}", e),
                }
            }
            debug!("File system watcher event handler stopped");
        });

        info!(
            "File system watcher initialized for directory: {}",
            self.notes_dir.display()
        );
        Ok(())
    }

    /// Stops watching the notes directory
    pub fn stop_watcher(&mut self) {
        if let Ok(slot) = self.watcher.get_mut() {
            if slot.take().is_some() {
                info!("File system watcher stopped");
            }
        }
    }
}

impl NoteStore for FileNoteStore {
    async fn load(&self, id: &str) -> Result<Option<Note>> {
        Ok(self.get_note(id))
    }

    async fn save(&self, fields: NoteFields) -> Result<String> {
        let now = Utc::now();
        let mut id = note_id_for(now);
        let mut bump = 1;
        while self.get_note_path(&id).exists() || self.cache()?.contains_key(&id) {
            id = format!("{}_{}", note_id_for(now), bump);
            bump += 1;
        }

        info!("Creating note: {}", id);
        let note = Note::with_id(id.clone(), fields, now);
        self.write_note(&note)?;
        info!("Note saved successfully: {}", id);
        Ok(id)
    }

    async fn update(&self, id: &str, fields: NoteFields) -> Result<()> {
        info!("Updating note: {}", id);

        let existing = self.get_note(id).ok_or_else(|| {
            error!("Cannot update note {}: Note not found", id);
            NotesError::NoteNotFound { id: id.to_string() }
        })?;

        let updated = Note {
            id: existing.id,
            title: fields.title,
            content: fields.content,
            links: fields.links,
            created_at: existing.created_at,
            updated_at: Utc::now(),
        };

        self.write_note(&updated)?;
        info!("Note {} updated successfully", id);
        Ok(())
    }

    async fn delete(&self, id: &str) -> Result<()> {
        info!("Deleting note: {}", id);

        if self.get_note(id).is_none() {
            error!("Cannot delete note {}: Note not found", id);
            return Err(NotesError::NoteNotFound { id: id.to_string() });
        }

        let file_path = self.get_note_path(id);
        if file_path.exists() {
            fs::remove_file(&file_path).map_err(|e| {
                error!("Failed to delete note file {}: {}", file_path.display(), e);
                NotesError::Io(e)
            })?;
        } else {
            debug!("Note file doesn't exist on disk, only removing from cache");
        }

        self.cache()?.remove(id);
        info!("Note {} successfully deleted", id);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<NoteMetadata>> {
        let mut notes: Vec<NoteMetadata> = self.cache()?.values().map(NoteMetadata::from).collect();
        sort_by_recent(&mut notes);
        Ok(notes)
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    fn store_in(dir: &TempDir) -> FileNoteStore {
        let mut store = FileNoteStore::in_dir(dir.path().join("notes"));
        store.initialize().unwrap();
        store
    }

    #[tokio::test]
    async fn save_writes_json_file_and_survives_reload() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        let id = store
            .save(NoteFields::new("Reading", "<p>list</p>", vec!["https://a.com".into()]))
            .await
            .unwrap();
        assert!(dir.path().join("notes").join(format!("{}.json", id)).exists());

        let reopened = store_in(&dir);
        let note = reopened.load(&id).await.unwrap().unwrap();
        assert_eq!(note.title, "Reading");
        assert_eq!(note.links, vec!["https://a.com"]);
    }

    #[tokio::test]
    async fn update_preserves_created_at() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let id = store.save(NoteFields::new("v1", "", vec![])).await.unwrap();
        let before = store.load(&id).await.unwrap().unwrap();

        store.update(&id, NoteFields::new("v2", "body", vec![])).await.unwrap();
        let after = store.load(&id).await.unwrap().unwrap();

        assert_eq!(after.id, before.id);
        assert_eq!(after.created_at, before.created_at);
        assert!(after.updated_at >= before.updated_at);
        assert_eq!(after.title, "v2");
    }

    #[tokio::test]
    async fn update_and_delete_unknown_notes_fail() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);

        assert!(matches!(
            store.update("note_404", NoteFields::default()).await,
            Err(NotesError::NoteNotFound { .. })
        ));
        assert!(matches!(
            store.delete("note_404").await,
            Err(NotesError::NoteNotFound { .. })
        ));
        assert!(store.load("../etc/passwd").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn delete_removes_file_and_cache_entry() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let id = store.save(NoteFields::new("gone", "", vec![])).await.unwrap();

        store.delete(&id).await.unwrap();
        assert!(store.load(&id).await.unwrap().is_none());
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn list_is_sorted_by_most_recent_update() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        let first = store.save(NoteFields::new("first", "", vec![])).await.unwrap();
        let second = store.save(NoteFields::new("second", "", vec![])).await.unwrap();
        assert_ne!(first, second);

        tokio::time::sleep(Duration::from_millis(5)).await;
        store.update(&first, NoteFields::new("first again", "", vec![])).await.unwrap();

        let ids: Vec<String> = store.list().await.unwrap().into_iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![first, second]);
    }

    #[tokio::test]
    async fn search_ranks_title_matches_first() {
        let dir = TempDir::new().unwrap();
        let store = store_in(&dir);
        store.save(NoteFields::new("Groceries", "milk and eggs", vec![])).await.unwrap();
        store.save(NoteFields::new("Trip", "buy groceries on the way", vec![])).await.unwrap();
        store.save(NoteFields::new("Unrelated", "nothing here", vec![])).await.unwrap();

        let results = store.search_notes("groceries");
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].title, "Groceries");
    }
}
