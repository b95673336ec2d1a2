//! Note list shown next to the editor.
//!
//! The list itself comes from the [`NoteStore`]; collapse state, selection and
//! the last known list are kept in `sidebar_state.json` so the list can be
//! shown before the store answers. That file is written through a
//! [`Debouncer`] and is never authoritative.
use std::{
    fs,
    io::Write,
    path::{Path, PathBuf},
    sync::Arc,
    time::Duration,
};

use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tokio::sync::{
    broadcast::{self, error::RecvError},
    oneshot,
};

use crate::{Config, Debouncer, EventBus, NoteEvent, NoteMetadata, NoteStore, Notice, NotesError, Result};

const STATE_FILE: &str = "sidebar_state.json";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SidebarState {
    pub notes: Vec<NoteMetadata>,
    pub last_sync_time: Option<DateTime<Utc>>,
    pub is_collapsed: bool,
    pub selected_note_id: Option<String>,
}

/// Reads and writes [`SidebarState`] as JSON
#[derive(Debug, Clone)]
pub struct SidebarStateStore {
    path: PathBuf,
}

impl SidebarStateStore {
    pub fn new(app_data_dir: &Path) -> Self {
        Self {
            path: app_data_dir.join(STATE_FILE),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(&config.app_data_dir)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The saved state, `None` when nothing was saved yet
    pub fn load(&self) -> Result<Option<SidebarState>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    pub fn save(&self, state: &SidebarState) -> Result<()> {
        let dir = self.path.parent().ok_or_else(|| NotesError::DirectoryError {
            path: self.path.clone(),
        })?;
        fs::create_dir_all(dir).map_err(|e| {
            error!("Failed to create directory {}: {}", dir.display(), e);
            NotesError::DirectoryError {
                path: dir.to_path_buf(),
            }
        })?;

        let mut temp_file = NamedTempFile::new_in(dir)?;
        temp_file.write_all(serde_json::to_string_pretty(state)?.as_bytes())?;
        temp_file.flush()?;
        temp_file.persist(&self.path).map_err(|e| {
            error!("Failed to persist {}: {}", self.path.display(), e.error);
            NotesError::Io(e.error)
        })?;

        debug!("Sidebar state written to {}", self.path.display());
        Ok(())
    }
}

pub struct Sidebar<S> {
    store: Arc<S>,
    bus: EventBus,
    state: SidebarState,
    state_store: SidebarStateStore,
    persist: Debouncer<SidebarState>,
}

impl<S: NoteStore> Sidebar<S> {
    /// Restores the saved state, then refreshes the list from the store
    pub async fn open(
        store: Arc<S>,
        bus: EventBus,
        state_store: SidebarStateStore,
        debounce: Duration,
    ) -> Self {
        let state = match state_store.load() {
            Ok(Some(state)) => {
                debug!("Restored sidebar state with {} notes", state.notes.len());
                state
            }
            Ok(None) => SidebarState::default(),
            Err(e) => {
                warn!("Ignoring unreadable sidebar state: {}", e);
                SidebarState::default()
            }
        };

        let writer = state_store.clone();
        let persist = Debouncer::new(debounce, move |state: SidebarState| {
            let writer = writer.clone();
            async move { writer.save(&state) }
        });

        let mut sidebar = Self {
            store,
            bus,
            state,
            state_store,
            persist,
        };

        if let Err(e) = sidebar.refresh().await {
            warn!("Showing saved note list, refresh failed: {}", e);
        }
        sidebar
    }

    pub fn state(&self) -> &SidebarState {
        &self.state
    }

    pub fn notes(&self) -> &[NoteMetadata] {
        &self.state.notes
    }

    /// Reloads the list from the store
    pub async fn refresh(&mut self) -> Result<()> {
        let notes = self.store.list().await?;
        debug!("Sidebar refreshed with {} notes", notes.len());
        self.state.notes = notes;
        self.state.last_sync_time = Some(Utc::now());
        if let Some(selected) = &self.state.selected_note_id {
            if !self.state.notes.iter().any(|n| &n.id == selected) {
                self.state.selected_note_id = None;
            }
        }
        self.state_changed();
        Ok(())
    }

    pub fn apply_title_change(&mut self, note_id: &str, title: &str) {
        if let Some(note) = self.state.notes.iter_mut().find(|n| n.id == note_id) {
            note.title = title.to_string();
            self.state_changed();
        }
    }

    pub fn select(&mut self, note_id: Option<String>) {
        self.state.selected_note_id = note_id;
        self.state_changed();
    }

    pub fn set_collapsed(&mut self, collapsed: bool) {
        self.state.is_collapsed = collapsed;
        self.state_changed();
    }

    pub fn toggle_collapsed(&mut self) {
        self.set_collapsed(!self.state.is_collapsed);
    }

    /// Deletes a note; the list only changes once the store has confirmed
    pub async fn delete_note(&mut self, note_id: &str) -> Result<()> {
        if let Err(e) = self.store.delete(note_id).await {
            error!("Failed to delete note {}: {}", note_id, e);
            self.bus.notify(Notice::error("Failed to delete note"));
            return Err(e);
        }

        info!("Deleted note {}", note_id);
        self.remove_local(note_id);
        self.bus.publish(NoteEvent::Deleted {
            note_id: note_id.to_string(),
        });
        self.bus.notify(Notice::success("Note deleted"));
        Ok(())
    }

    fn remove_local(&mut self, note_id: &str) {
        let before = self.state.notes.len();
        self.state.notes.retain(|n| n.id != note_id);
        if self.state.selected_note_id.as_deref() == Some(note_id) {
            self.state.selected_note_id = None;
        }
        if self.state.notes.len() != before {
            self.state_changed();
        }
    }

    pub async fn handle_event(&mut self, event: NoteEvent) {
        match event {
            NoteEvent::Saved => {
                if let Err(e) = self.refresh().await {
                    warn!("Failed to refresh note list: {}", e);
                }
            }
            NoteEvent::TitleChanged { note_id, title } => self.apply_title_change(&note_id, &title),
            NoteEvent::Deleted { note_id } => self.remove_local(&note_id),
        }
    }

    /// Follows note events until `stop` fires or the bus closes
    pub async fn run(
        mut self,
        mut events: broadcast::Receiver<NoteEvent>,
        mut stop: oneshot::Receiver<()>,
    ) -> Self {
        loop {
            tokio::select! {
                biased;
                received = events.recv() => match received {
                    Ok(event) => self.handle_event(event).await,
                    Err(RecvError::Lagged(missed)) => {
                        debug!("Sidebar missed {} events, refreshing", missed);
                        self.handle_event(NoteEvent::Saved).await;
                    }
                    Err(RecvError::Closed) => break,
                },
                _ = &mut stop => break,
            }
        }
        self
    }

    /// Writes the state immediately, dropping any pending debounced write
    pub fn persist_now(&mut self) -> Result<()> {
        self.persist.cancel();
        self.state_store.save(&self.state)
    }

    fn state_changed(&mut self) {
        self.persist.schedule(self.state.clone());
    }
}
