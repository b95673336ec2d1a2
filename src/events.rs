//! Process-wide note events and user notices.
//!
//! The editor publishes, the note list subscribes. Both hold a clone of the
//! same [`EventBus`], handed out by whoever wires the application together.
use log::{debug, trace};
use tokio::sync::broadcast;

use crate::Notice;

const DEFAULT_CAPACITY: usize = 64;

/// Signals consumed by the note list
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoteEvent {
    /// A note was persisted; the list should be reloaded
    Saved,
    /// The title of a loaded note was edited (not yet persisted)
    TitleChanged { note_id: String, title: String },
    /// A note was removed from the store
    Deleted { note_id: String },
}

/// Broadcasts [`NoteEvent`]s and [`Notice`]s to every subscriber.
#[derive(Debug, Clone)]
pub struct EventBus {
    notes: broadcast::Sender<NoteEvent>,
    notices: broadcast::Sender<Notice>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (notes, _) = broadcast::channel(capacity);
        let (notices, _) = broadcast::channel(capacity);
        Self { notes, notices }
    }

    pub fn publish(&self, event: NoteEvent) {
        debug!("Publishing note event: {:?}", event);
        if self.notes.send(event).is_err() {
            trace!("No subscribers for note events");
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<NoteEvent> {
        self.notes.subscribe()
    }

    /// Shows a notification to the user
    pub fn notify(&self, notice: Notice) {
        debug!("Notice [{:?}]: {}", notice.level, notice.message);
        if self.notices.send(notice).is_err() {
            trace!("No subscribers for notices");
        }
    }

    pub fn subscribe_notices(&self) -> broadcast::Receiver<Notice> {
        self.notices.subscribe()
    }
}
