use std::{
    collections::HashMap,
    fs,
    path::Path,
    sync::{Arc, Mutex},
};

use log::{debug, error, trace};
use notify::EventKind;

use crate::{EventBus, Note, NoteEvent, NotesError, Result};

/// Handles file system events by updating the notes cache.
///
/// Publishes [`NoteEvent::Saved`] when at least one note file changed so the
/// note list picks up edits made outside the application.
pub fn handle_fs_event(
    event: notify::Event,
    notes_cache: &Arc<Mutex<HashMap<String, Note>>>,
    bus: &EventBus,
) {
    let mut changed = false;

    match event.kind {
        EventKind::Create(_) | EventKind::Modify(_) => {
            for path in event.paths.iter().filter(|p| is_note_file(p)) {
                match load_note_from_file(path) {
                    Ok(note) => {
                        if let Ok(mut cache) = notes_cache.lock() {
                            if cache.get(&note.id) != Some(&note) {
                                debug!("Updated cache for note: {}", note.id);
                                cache.insert(note.id.clone(), note);
                                changed = true;
                            }
                        }
                    }
                    Err(e) => {
                        // temp files being persisted land here too
                        debug!("Skipping changed file {}: {}", path.display(), e);
                    }
                }
            }
        }
        EventKind::Remove(_) => {
            for path in event.paths.iter().filter(|p| is_note_file(p)) {
                if let Some(file_stem) = path.file_stem() {
                    let note_id = file_stem.to_string_lossy().to_string();

                    if let Ok(mut cache) = notes_cache.lock() {
                        if cache.remove(&note_id).is_some() {
                            debug!("Removed note {} from cache due to file deletion", note_id);
                            changed = true;
                        }
                    }
                }
            }
        }
        _ => {}
    }

    if changed {
        bus.publish(NoteEvent::Saved);
    }
}

fn is_note_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "json")
}

/// Helper method to load a single note from file
pub fn load_note_from_file(path: &Path) -> Result<Note> {
    debug!("Loading note from file: {}", path.display());
    let content = fs::read_to_string(path).map_err(|e| {
        error!("Failed to open note file {}: {}", path.display(), e);
        NotesError::Io(e)
    })?;

    let note: Note = serde_json::from_str(&content)?;

    if note.id.is_empty() {
        let error_mgs = format!("Note from {} has an empty ID", path.display());
        error!("{}", error_mgs);
        return Err(NotesError::InvalidFormat { message: error_mgs });
    }

    trace!("Successfully loaded note: {}", note.id);
    Ok(note)
}
