//! In-memory working copy of a note being edited.
//!
//! [`EditSession`] performs no I/O. It tracks the editable fields against the
//! last persisted snapshot, hands out [`SaveRequest`]s for the caller to run
//! against a store, and decides what a navigation attempt should do.
use chrono::Utc;
use log::{debug, info, warn};

use crate::{
    add_url_to_urls, contains_url, join_urls, normalize_url, parse_urls, validate_link_input,
    Note, NoteEvent, NoteFields, NotesError, Result, TITLE_MAX_CHARS,
};

/// Observable phase of an [`EditSession`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Loading,
    Clean,
    Dirty,
    Saving,
}

/// Which store operation a save must use
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveTarget {
    Create,
    Update(String),
}

/// A save handed out by [`EditSession::begin_save`]
#[derive(Debug, Clone, PartialEq)]
pub struct SaveRequest {
    pub target: SaveTarget,
    pub fields: NoteFields,
    /// The session title as typed when the save started
    pub edited_title: String,
}

/// Result of a successful save
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedNote {
    pub note_id: String,
    /// The note was created under an id other than the session's working id
    pub relocated: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationDecision {
    Proceed(String),
    /// Unsaved changes; ask the user to save, discard or cancel
    Prompt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationChoice {
    Save,
    Discard,
    Cancel,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NavigationStep {
    Proceed(String),
    /// Run a save; go to the target only if it succeeds
    SaveThenProceed(String),
    Stay,
}

#[derive(Debug)]
pub struct EditSession {
    note_id: String,
    title: String,
    content: String,
    links: String,
    snapshot: Option<Note>,
    loading: bool,
    saving: bool,
    pending_navigation: Option<String>,
    pasted: Option<String>,
}

impl EditSession {
    /// A session for `note_id`, waiting for [`EditSession::finish_loading`]
    pub fn new(note_id: impl Into<String>) -> Self {
        Self {
            note_id: note_id.into(),
            title: String::new(),
            content: String::new(),
            links: String::new(),
            snapshot: None,
            loading: true,
            saving: false,
            pending_navigation: None,
            pasted: None,
        }
    }

    /// Populates the session from a loaded note, or leaves it empty for a new one
    pub fn finish_loading(&mut self, note: Option<Note>) {
        match note {
            Some(note) => {
                debug!("Session loaded note {}", note.id);
                self.note_id = note.id.clone();
                self.title = note.title.clone();
                self.content = note.content.clone();
                self.links = join_urls(&note.links);
                self.snapshot = Some(note);
            }
            None => {
                debug!("Session {} starts as a new note", self.note_id);
                self.title.clear();
                self.content.clear();
                self.links.clear();
                self.snapshot = None;
            }
        }
        self.loading = false;
    }

    pub fn note_id(&self) -> &str {
        &self.note_id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// The link list as the delimited string shown to the user
    pub fn links_text(&self) -> &str {
        &self.links
    }

    pub fn links(&self) -> Vec<String> {
        parse_urls(&self.links)
    }

    pub fn snapshot(&self) -> Option<&Note> {
        self.snapshot.as_ref()
    }

    /// Whether the note exists in the store
    pub fn is_persisted(&self) -> bool {
        self.snapshot.is_some()
    }

    pub fn is_saving(&self) -> bool {
        self.saving
    }

    pub fn state(&self) -> SessionState {
        if self.loading {
            SessionState::Loading
        } else if self.saving {
            SessionState::Saving
        } else if self.is_dirty() {
            SessionState::Dirty
        } else {
            SessionState::Clean
        }
    }

    /// Whether the fields differ from the last persisted snapshot.
    ///
    /// Without a snapshot any non-blank field counts as a change.
    pub fn is_dirty(&self) -> bool {
        match &self.snapshot {
            None => {
                !self.title.trim().is_empty()
                    || !self.content.trim().is_empty()
                    || !self.links.trim().is_empty()
            }
            Some(saved) => {
                self.title != saved.title
                    || self.content != saved.content
                    || self.links() != saved.links
            }
        }
    }

    /// Sets the title, returning the broadcast to send when the note already exists
    pub fn set_title(&mut self, title: impl Into<String>) -> Result<Option<NoteEvent>> {
        let title = title.into();
        let length = title.chars().count();
        if length > TITLE_MAX_CHARS {
            return Err(NotesError::TitleTooLong {
                length,
                max: TITLE_MAX_CHARS,
            });
        }

        self.title = title;
        Ok(self.snapshot.as_ref().map(|_| NoteEvent::TitleChanged {
            note_id: self.note_id.clone(),
            title: self.title.clone(),
        }))
    }

    pub fn set_content(&mut self, content: impl Into<String>) {
        self.content = content.into();
    }

    /// Replaces the link list from user input.
    ///
    /// Blank input clears the list. Otherwise every segment must be a valid
    /// URL; a rejected edit leaves the list untouched.
    pub fn set_links(&mut self, value: &str) -> Result<()> {
        if value.trim().is_empty() {
            self.links.clear();
            return Ok(());
        }

        let urls = validate_link_input(value)?;
        let links = urls
            .iter()
            .fold(Vec::new(), |acc, url| add_url_to_urls(&acc, &normalize_url(url)));
        self.links = join_urls(&links);
        Ok(())
    }

    /// Appends a link unless an equal one is present, returning whether it was added
    pub fn add_link(&mut self, url: &str) -> bool {
        let current = self.links();
        if contains_url(&current, url) {
            return false;
        }
        self.links = join_urls(&add_url_to_urls(&current, &normalize_url(url)));
        true
    }

    /// Records prose pasted from the clipboard for the editing surface
    pub fn set_pasted(&mut self, text: impl Into<String>) {
        self.pasted = Some(text.into());
    }

    /// Takes the pasted content, leaving none behind
    pub fn take_pasted(&mut self) -> Option<String> {
        self.pasted.take()
    }

    /// Starts a save, or returns `None` when one is already running or the note is blank
    pub fn begin_save(&mut self) -> Option<SaveRequest> {
        if self.saving {
            debug!("Save already in flight for {}, ignoring request", self.note_id);
            return None;
        }

        let edited_title = self.title.clone();
        let mut fields = NoteFields::new(edited_title.clone(), self.content.clone(), self.links());
        if fields.is_blank() {
            debug!("Nothing to save for {}", self.note_id);
            return None;
        }
        fields.title = fields.effective_title();

        let target = match &self.snapshot {
            Some(_) => SaveTarget::Update(self.note_id.clone()),
            None => SaveTarget::Create,
        };

        self.saving = true;
        Some(SaveRequest {
            target,
            fields,
            edited_title,
        })
    }

    /// Applies the store's answer to a [`SaveRequest`].
    ///
    /// `result` carries the id the note was stored under. On failure the
    /// session stays dirty and the error is returned.
    pub fn complete_save(&mut self, request: SaveRequest, result: Result<String>) -> Result<SavedNote> {
        self.saving = false;

        let note_id = match result {
            Ok(id) => id,
            Err(e) => {
                warn!("Saving note {} failed: {}", self.note_id, e);
                return Err(e);
            }
        };

        let now = Utc::now();
        let relocated = request.target == SaveTarget::Create && note_id != self.note_id;
        let created_at = match (&request.target, &self.snapshot) {
            (SaveTarget::Update(_), Some(saved)) => saved.created_at,
            _ => now,
        };

        // the stored title is trimmed or defaulted; adopt it unless edited mid-save
        if self.title == request.edited_title {
            self.title = request.fields.title.clone();
        }

        let mut note = Note::with_id(note_id.clone(), request.fields, created_at);
        note.updated_at = now;
        self.snapshot = Some(note);

        if relocated {
            info!("Note {} stored as {}", self.note_id, note_id);
        }
        self.note_id = note_id.clone();

        Ok(SavedNote { note_id, relocated })
    }

    /// Reverts the fields to the snapshot, or clears them for a new note
    pub fn discard_changes(&mut self) {
        debug!("Discarding changes to {}", self.note_id);
        match &self.snapshot {
            Some(saved) => {
                self.title = saved.title.clone();
                self.content = saved.content.clone();
                self.links = join_urls(&saved.links);
            }
            None => {
                self.title.clear();
                self.content.clear();
                self.links.clear();
            }
        }
    }

    /// Decides whether leaving for `target` needs the user's confirmation
    pub fn request_navigation(&mut self, target: impl Into<String>) -> NavigationDecision {
        let target = target.into();
        if self.is_dirty() {
            debug!("Unsaved changes, holding navigation to {}", target);
            self.pending_navigation = Some(target);
            NavigationDecision::Prompt
        } else {
            NavigationDecision::Proceed(target)
        }
    }

    pub fn pending_navigation(&self) -> Option<&str> {
        self.pending_navigation.as_deref()
    }

    /// Resolves a prompted navigation with the user's choice
    pub fn resolve_navigation(&mut self, choice: NavigationChoice) -> NavigationStep {
        let Some(target) = self.pending_navigation.take() else {
            return NavigationStep::Stay;
        };

        match choice {
            NavigationChoice::Save => NavigationStep::SaveThenProceed(target),
            NavigationChoice::Discard => {
                self.discard_changes();
                NavigationStep::Proceed(target)
            }
            NavigationChoice::Cancel => NavigationStep::Stay,
        }
    }
}
