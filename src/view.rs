//! The note view: drives an [`EditSession`] against a [`NoteStore`].
//!
//! [`NoteView`] owns the session for one open note. Edits, saves and
//! navigation can be driven directly through its methods or by sending
//! [`ViewCommand`]s to [`NoteView::run`], which also owns the clipboard
//! debounce window, the invalid-link warning and optional autosave.
use std::{ops::ControlFlow, sync::Arc, time::Duration};

use log::{debug, error, info, trace, warn};
use tokio::{
    sync::mpsc,
    time::{sleep_until, Instant},
};

use crate::{
    Classification, ClipboardClassifier, ClipboardEvent, ClipboardStatus, Config, EditSession,
    EventBus, InternalCopies, LinkOpener, NavigationChoice, NavigationDecision, NavigationStep,
    NoteEvent, NoteStore, Notice, NotesError, OpenMethod, Result, SaveTarget, SavedNote,
    SessionState, SystemClipboard,
};

/// Timing knobs of a [`NoteView`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ViewOptions {
    pub clipboard_debounce: Duration,
    pub invalid_url_warning: Duration,
    pub autosave: Option<Duration>,
}

impl Default for ViewOptions {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for ViewOptions {
    fn from(config: &Config) -> Self {
        Self {
            clipboard_debounce: config.clipboard_debounce(),
            invalid_url_warning: config.invalid_url_warning(),
            autosave: config.autosave_delay(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveOutcome {
    /// Nothing to save, or a save was already running
    Skipped,
    Saved(SavedNote),
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClipboardOutcome {
    LinkAdded(String),
    Pasted(String),
    Ignored,
}

/// Input to [`NoteView::run`]
#[derive(Debug, Clone, PartialEq)]
pub enum ViewCommand {
    SetTitle(String),
    SetContent(String),
    SetLinks(String),
    /// Insert converted markup at the end of the content
    AppendContent(String),
    Clipboard(ClipboardEvent),
    Save,
    /// Open the link at a 1-based position
    OpenLink(usize),
    /// Copy the link at a 1-based position to the clipboard
    CopyLink(usize),
    Navigate(String),
    ResolveNavigation(NavigationChoice),
    Close,
}

/// Output of [`NoteView::run`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewSignal {
    /// Leaving for `target` needs a save, discard or cancel decision
    NavigationPrompt { target: String },
    /// The view was left for `target`; the run loop has ended
    Navigated(String),
    /// The note is now addressed by a new location
    LocationChanged(String),
    /// Prose from the clipboard, for the editing surface to insert
    Pasted(String),
}

/// Addressable location of a note
pub fn note_location(note_id: &str) -> String {
    format!("/note/{}", note_id)
}

pub struct NoteView<S> {
    store: Arc<S>,
    bus: EventBus,
    options: ViewOptions,
    session: EditSession,
    classifier: ClipboardClassifier,
    location: String,
    clipboard_status: ClipboardStatus,
    pending_clipboard: Option<(ClipboardEvent, Instant)>,
    url_warning: Option<(String, Instant)>,
    autosave_at: Option<Instant>,
    opener: Option<LinkOpener>,
    internal_copies: InternalCopies,
}

impl<S: NoteStore> NoteView<S> {
    /// Opens `note_id`. A missing note, or one that fails to load, starts a new note.
    pub async fn open(store: Arc<S>, bus: EventBus, options: ViewOptions, note_id: &str) -> Self {
        let mut session = EditSession::new(note_id);

        match store.load(note_id).await {
            Ok(Some(note)) => session.finish_loading(Some(note)),
            Ok(None) => {
                debug!("Note {} not found, starting a new note", note_id);
                session.finish_loading(None);
            }
            Err(e) => {
                warn!("Failed to load note {}: {}, starting a new note", note_id, e);
                session.finish_loading(None);
            }
        }

        Self {
            store,
            bus,
            options,
            session,
            classifier: ClipboardClassifier::new(),
            location: note_location(note_id),
            clipboard_status: ClipboardStatus::Monitoring,
            pending_clipboard: None,
            url_warning: None,
            autosave_at: None,
            opener: None,
            internal_copies: InternalCopies::default(),
        }
    }

    /// Uses `opener` for [`ViewCommand::OpenLink`]
    pub fn with_opener(mut self, opener: LinkOpener) -> Self {
        self.opener = Some(opener);
        self
    }

    /// Marks links copied by this view so the clipboard watcher ignores them
    pub fn with_internal_copies(mut self, internal_copies: InternalCopies) -> Self {
        self.internal_copies = internal_copies;
        self
    }

    pub fn session(&self) -> &EditSession {
        &self.session
    }

    pub fn state(&self) -> SessionState {
        self.session.state()
    }

    pub fn is_dirty(&self) -> bool {
        self.session.is_dirty()
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub fn clipboard_status(&self) -> &ClipboardStatus {
        &self.clipboard_status
    }

    pub fn set_clipboard_status(&mut self, status: ClipboardStatus) {
        if let ClipboardStatus::Unavailable(reason) = &status {
            warn!("Clipboard classification disabled: {}", reason);
        }
        self.clipboard_status = status;
    }

    pub fn set_title(&mut self, title: impl Into<String>) -> Result<()> {
        match self.session.set_title(title) {
            Ok(event) => {
                if let Some(event) = event {
                    self.bus.publish(event);
                }
                self.touch();
                Ok(())
            }
            Err(e) => {
                self.bus.notify(Notice::warning(e.to_string()));
                Err(e)
            }
        }
    }

    pub fn set_content(&mut self, content: impl Into<String>) {
        self.session.set_content(content);
        self.touch();
    }

    pub fn append_content(&mut self, markup: &str) {
        let content = format!("{}{}", self.session.content(), markup);
        self.set_content(content);
    }

    /// Replaces the link list, showing a transient warning when a segment is invalid
    pub fn set_links(&mut self, value: &str) -> Result<()> {
        match self.session.set_links(value) {
            Ok(()) => {
                self.url_warning = None;
                self.touch();
                Ok(())
            }
            Err(e) => {
                let message = e.to_string();
                debug!("Rejected link edit: {}", message);
                self.url_warning = Some((message.clone(), Instant::now() + self.options.invalid_url_warning));
                self.bus.notify(Notice::warning(message));
                Err(e)
            }
        }
    }

    /// The invalid-link warning, while it has not expired
    pub fn invalid_url_warning(&self) -> Option<&str> {
        self.url_warning
            .as_ref()
            .filter(|(_, expires)| Instant::now() < *expires)
            .map(|(message, _)| message.as_str())
    }

    /// The link at 1-based `index`
    pub fn link(&self, index: usize) -> Option<String> {
        index
            .checked_sub(1)
            .and_then(|i| self.session.links().into_iter().nth(i))
    }

    pub fn open_link(&self, index: usize, opener: &LinkOpener) -> Result<OpenMethod> {
        let url = self.link(index).ok_or_else(|| NotesError::ApplicationError {
            message: format!("Note has no link #{}", index),
        })?;
        opener.open(&url)
    }

    /// Copies the link at 1-based `index` to the system clipboard
    pub async fn copy_link(&self, index: usize) -> Result<String> {
        let url = self.link(index).ok_or_else(|| NotesError::ApplicationError {
            message: format!("Note has no link #{}", index),
        })?;
        self.internal_copies.mark(url.clone());
        SystemClipboard.write_text(&url).await?;
        Ok(url)
    }

    /// Restarts the autosave window, or drops it once the note is clean again
    fn touch(&mut self) {
        if let Some(delay) = self.options.autosave {
            self.autosave_at = self.session.is_dirty().then(|| Instant::now() + delay);
        }
    }

    /// Persists the session, creating the note on its first save
    pub async fn save(&mut self) -> SaveOutcome {
        let Some(request) = self.session.begin_save() else {
            return SaveOutcome::Skipped;
        };
        self.autosave_at = None;

        let result = match &request.target {
            SaveTarget::Create => self.store.save(request.fields.clone()).await,
            SaveTarget::Update(id) => self
                .store
                .update(id, request.fields.clone())
                .await
                .map(|()| id.clone()),
        };

        match self.session.complete_save(request, result) {
            Ok(saved) => {
                info!("Saved note {}", saved.note_id);
                if saved.relocated {
                    self.location = note_location(&saved.note_id);
                }
                self.bus.notify(Notice::success("Note saved"));
                self.bus.publish(NoteEvent::Saved);
                SaveOutcome::Saved(saved)
            }
            Err(e) => {
                error!("Failed to save note {}: {}", self.session.note_id(), e);
                self.bus.notify(Notice::error("Failed to save note"));
                SaveOutcome::Failed
            }
        }
    }

    pub fn request_navigation(&mut self, target: impl Into<String>) -> NavigationDecision {
        self.session.request_navigation(target)
    }

    /// Applies the user's answer to a navigation prompt, returning where to go
    pub async fn resolve_navigation(&mut self, choice: NavigationChoice) -> Option<String> {
        match self.session.resolve_navigation(choice) {
            NavigationStep::Proceed(target) => Some(target),
            NavigationStep::SaveThenProceed(target) => match self.save().await {
                SaveOutcome::Saved(_) => Some(target),
                outcome => {
                    debug!("Staying on {} after save outcome {:?}", self.location, outcome);
                    None
                }
            },
            NavigationStep::Stay => None,
        }
    }

    /// Schedules a clipboard event for classification, restarting the debounce window
    pub fn on_clipboard(&mut self, event: ClipboardEvent) {
        if let ClipboardStatus::Unavailable(_) = self.clipboard_status {
            return;
        }
        if !ClipboardClassifier::accepts(&event) {
            trace!("Clipboard event discarded");
            return;
        }
        self.pending_clipboard = Some((event, Instant::now() + self.options.clipboard_debounce));
    }

    pub fn clipboard_deadline(&self) -> Option<Instant> {
        self.pending_clipboard.as_ref().map(|(_, at)| *at)
    }

    /// Classifies the pending clipboard event, if any
    pub fn settle_clipboard(&mut self) -> ClipboardOutcome {
        let Some((event, _)) = self.pending_clipboard.take() else {
            return ClipboardOutcome::Ignored;
        };

        match self.classifier.classify(&event, &self.session.links()) {
            Classification::Link { url, .. } => {
                self.session.add_link(&url);
                self.touch();
                debug!("Attached link {} from clipboard", url);
                ClipboardOutcome::LinkAdded(url)
            }
            Classification::Prose(text) => {
                self.session.set_pasted(text.clone());
                ClipboardOutcome::Pasted(text)
            }
            Classification::Ignored(reason) => {
                trace!("Clipboard event ignored: {:?}", reason);
                ClipboardOutcome::Ignored
            }
        }
    }

    /// Takes pasted prose waiting for the editing surface
    pub fn take_pasted(&mut self) -> Option<String> {
        self.session.take_pasted()
    }

    /// Runs the view until it is closed or navigated away from.
    ///
    /// Pending clipboard and autosave timers are dropped when the loop ends.
    pub async fn run(
        mut self,
        mut commands: mpsc::Receiver<ViewCommand>,
        mut clipboard: Option<mpsc::Receiver<ClipboardEvent>>,
        signals: mpsc::Sender<ViewSignal>,
    ) -> Self {
        debug!("Note view running at {}", self.location);

        loop {
            let clipboard_deadline = self.clipboard_deadline();
            let autosave_deadline = self.autosave_at;

            tokio::select! {
                command = commands.recv() => {
                    let Some(command) = command else { break };
                    if self.handle_command(command, &signals).await.is_break() {
                        break;
                    }
                }
                Some(event) = next_clipboard_event(&mut clipboard) => self.on_clipboard(event),
                _ = sleep_until_some(clipboard_deadline) => {
                    if let ClipboardOutcome::Pasted(_) = self.settle_clipboard() {
                        if let Some(text) = self.take_pasted() {
                            send_signal(&signals, ViewSignal::Pasted(text)).await;
                        }
                    }
                }
                _ = sleep_until_some(autosave_deadline) => {
                    self.autosave_at = None;
                    debug!("Autosaving {}", self.session.note_id());
                    if let SaveOutcome::Saved(saved) = self.save().await {
                        if saved.relocated {
                            send_signal(&signals, ViewSignal::LocationChanged(self.location.clone())).await;
                        }
                    }
                }
            }
        }

        self.pending_clipboard = None;
        self.autosave_at = None;
        debug!("Note view at {} closed", self.location);
        self
    }

    async fn handle_command(
        &mut self,
        command: ViewCommand,
        signals: &mpsc::Sender<ViewSignal>,
    ) -> ControlFlow<()> {
        match command {
            ViewCommand::SetTitle(title) => {
                if let Err(e) = self.set_title(title) {
                    debug!("Title edit rejected: {}", e);
                }
            }
            ViewCommand::SetContent(content) => self.set_content(content),
            ViewCommand::SetLinks(links) => {
                if let Err(e) = self.set_links(&links) {
                    debug!("Link edit rejected: {}", e);
                }
            }
            ViewCommand::AppendContent(markup) => self.append_content(&markup),
            ViewCommand::Clipboard(event) => self.on_clipboard(event),
            ViewCommand::Save => {
                if let SaveOutcome::Saved(saved) = self.save().await {
                    if saved.relocated {
                        send_signal(signals, ViewSignal::LocationChanged(self.location.clone())).await;
                    }
                }
            }
            ViewCommand::OpenLink(index) => {
                let result = match &self.opener {
                    Some(opener) => self.open_link(index, opener),
                    None => Err(NotesError::ApplicationError {
                        message: "No link opener available".to_string(),
                    }),
                };
                if let Err(e) = result {
                    warn!("Could not open link #{}: {}", index, e);
                    self.bus.notify(Notice::error(e.to_string()));
                }
            }
            ViewCommand::CopyLink(index) => match self.copy_link(index).await {
                Ok(url) => self.bus.notify(Notice::success(format!("Copied {}", url))),
                Err(e) => {
                    warn!("Could not copy link #{}: {}", index, e);
                    self.bus.notify(Notice::error(e.to_string()));
                }
            },
            ViewCommand::Navigate(target) => match self.request_navigation(target) {
                NavigationDecision::Proceed(target) => {
                    send_signal(signals, ViewSignal::Navigated(target)).await;
                    return ControlFlow::Break(());
                }
                NavigationDecision::Prompt => {
                    if let Some(target) = self.session.pending_navigation().map(str::to_string) {
                        send_signal(signals, ViewSignal::NavigationPrompt { target }).await;
                    }
                }
            },
            ViewCommand::ResolveNavigation(choice) => {
                let previous = self.location.clone();
                if let Some(target) = self.resolve_navigation(choice).await {
                    if self.location != previous {
                        send_signal(signals, ViewSignal::LocationChanged(self.location.clone())).await;
                    }
                    send_signal(signals, ViewSignal::Navigated(target)).await;
                    return ControlFlow::Break(());
                }
            }
            ViewCommand::Close => return ControlFlow::Break(()),
        }
        ControlFlow::Continue(())
    }
}

async fn next_clipboard_event(rx: &mut Option<mpsc::Receiver<ClipboardEvent>>) -> Option<ClipboardEvent> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn sleep_until_some(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

async fn send_signal(signals: &mpsc::Sender<ViewSignal>, signal: ViewSignal) {
    if signals.send(signal).await.is_err() {
        trace!("No listener for view signals");
    }
}

#[cfg(test)]
mod tests {
    use tokio::time::sleep;

    use super::*;
    use crate::{store::fixtures::RecordingStore, NoticeLevel};

    async fn open_view(store: RecordingStore, id: &str) -> (NoteView<RecordingStore>, Arc<RecordingStore>, EventBus) {
        let store = Arc::new(store);
        let bus = EventBus::default();
        let view = NoteView::open(Arc::clone(&store), bus.clone(), ViewOptions::default(), id).await;
        (view, store, bus)
    }

    #[tokio::test]
    async fn blank_note_save_never_reaches_the_store() {
        let (mut view, store, _) = open_view(RecordingStore::new(), "new").await;
        assert_eq!(view.save().await, SaveOutcome::Skipped);
        view.set_title("   ").unwrap();
        assert_eq!(view.save().await, SaveOutcome::Skipped);
        assert_eq!(store.saves() + store.updates(), 0);
    }

    #[tokio::test]
    async fn first_save_creates_then_later_saves_update() {
        let (mut view, store, bus) = open_view(RecordingStore::new(), "new").await;
        let mut events = bus.subscribe();
        let mut notices = bus.subscribe_notices();

        view.set_title("x").unwrap();
        assert!(view.is_dirty());
        let SaveOutcome::Saved(saved) = view.save().await else {
            panic!("save failed");
        };
        assert!(saved.relocated);
        assert_eq!(view.location(), note_location(&saved.note_id));
        assert!(!view.is_dirty());
        assert_eq!(events.try_recv().unwrap(), NoteEvent::Saved);
        assert_eq!(notices.try_recv().unwrap(), Notice::success("Note saved"));

        view.set_content("more");
        view.save().await;
        assert_eq!(store.saves(), 1);
        assert_eq!(store.updates(), 1);
        let stored = store.load(&saved.note_id).await.unwrap().unwrap();
        assert_eq!(stored.content, "more");
    }

    #[tokio::test]
    async fn failed_save_keeps_changes_and_notifies() {
        let (store, id) = RecordingStore::with_note("A", "body", &[]);
        let (mut view, store, bus) = open_view(store, &id).await;
        let mut notices = bus.subscribe_notices();

        view.set_content("edited");
        store.set_failing(true);
        assert_eq!(view.save().await, SaveOutcome::Failed);
        assert!(view.is_dirty());
        let notice = notices.try_recv().unwrap();
        assert_eq!(notice.level, NoticeLevel::Error);
        assert_eq!(notice.message, "Failed to save note");

        store.set_failing(false);
        assert!(matches!(view.save().await, SaveOutcome::Saved(_)));
        assert!(!view.is_dirty());
    }

    #[tokio::test]
    async fn load_failure_starts_a_new_note() {
        let store = RecordingStore::new();
        store.set_failing(true);
        let (view, _, _) = open_view(store, "note_9").await;
        assert_eq!(view.state(), SessionState::Clean);
        assert!(view.session().snapshot().is_none());
        assert_eq!(view.location(), "/note/note_9");
    }

    #[tokio::test]
    async fn title_edits_on_loaded_notes_are_broadcast() {
        let (store, id) = RecordingStore::with_note("A", "", &[]);
        let (mut view, _, bus) = open_view(store, &id).await;
        let mut events = bus.subscribe();

        view.set_title("B").unwrap();
        assert_eq!(
            events.try_recv().unwrap(),
            NoteEvent::TitleChanged {
                note_id: id,
                title: "B".into()
            }
        );
    }

    #[tokio::test]
    async fn discard_navigation_skips_the_store() {
        let (store, id) = RecordingStore::with_note("A", "", &[]);
        let (mut view, store, _) = open_view(store, &id).await;

        view.set_title("B").unwrap();
        assert_eq!(view.request_navigation("/"), NavigationDecision::Prompt);
        assert_eq!(
            view.resolve_navigation(NavigationChoice::Discard).await.as_deref(),
            Some("/")
        );
        assert!(!view.is_dirty());
        assert_eq!(store.saves() + store.updates(), 0);
    }

    #[tokio::test]
    async fn save_navigation_only_proceeds_after_a_successful_save() {
        let (store, id) = RecordingStore::with_note("A", "", &[]);
        let (mut view, store, _) = open_view(store, &id).await;
        view.set_title("B").unwrap();

        store.set_failing(true);
        view.request_navigation("/");
        assert_eq!(view.resolve_navigation(NavigationChoice::Save).await, None);
        assert!(view.is_dirty());

        store.set_failing(false);
        view.request_navigation("/");
        assert_eq!(
            view.resolve_navigation(NavigationChoice::Save).await.as_deref(),
            Some("/")
        );
        assert_eq!(store.updates(), 2);
        assert_eq!(store.load(&id).await.unwrap().unwrap().title, "B");
    }

    #[tokio::test(start_paused = true)]
    async fn invalid_links_show_a_transient_warning() {
        let (store, id) = RecordingStore::with_note("A", "", &["https://a.com"]);
        let (mut view, _, _) = open_view(store, &id).await;

        assert!(view.set_links("https://a.com, nope").is_err());
        assert_eq!(view.invalid_url_warning(), Some("Invalid URL detected: nope"));
        assert_eq!(view.session().links(), vec!["https://a.com"]);

        sleep(Duration::from_secs(3)).await;
        assert_eq!(view.invalid_url_warning(), None);

        view.set_links("nope").unwrap_err();
        view.set_links("https://b.com").unwrap();
        assert_eq!(view.invalid_url_warning(), None);
    }

    #[tokio::test]
    async fn clipboard_links_and_prose_are_routed() {
        let (mut view, store, _) = open_view(RecordingStore::new(), "new").await;

        view.on_clipboard(ClipboardEvent::external("https://example.com"));
        assert_eq!(
            view.settle_clipboard(),
            ClipboardOutcome::LinkAdded("https://example.com".into())
        );
        assert_eq!(view.session().links(), vec!["https://example.com"]);
        assert!(view.is_dirty());

        view.on_clipboard(ClipboardEvent::external("Hello world"));
        assert_eq!(view.settle_clipboard(), ClipboardOutcome::Pasted("Hello world".into()));
        assert_eq!(view.session().links(), vec!["https://example.com"]);
        assert_eq!(view.take_pasted().as_deref(), Some("Hello world"));
        assert_eq!(view.take_pasted(), None);

        view.on_clipboard(ClipboardEvent::new("https://other.com", true));
        assert_eq!(view.settle_clipboard(), ClipboardOutcome::Ignored);
        assert_eq!(store.saves(), 0);
    }

    #[tokio::test]
    async fn unavailable_clipboard_disables_classification() {
        let (mut view, _, _) = open_view(RecordingStore::new(), "new").await;
        view.set_clipboard_status(ClipboardStatus::Unavailable("no display".into()));
        view.on_clipboard(ClipboardEvent::external("https://example.com"));
        assert_eq!(view.clipboard_deadline(), None);
        assert!(view.session().links().is_empty());
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn links_are_opened_by_position() {
        let (store, id) = RecordingStore::with_note("A", "", &["https://a.com", "https://b.com"]);
        let (view, _, _) = open_view(store, &id).await;

        assert_eq!(view.link(2).as_deref(), Some("https://b.com"));
        assert_eq!(view.link(0), None);

        let opener = LinkOpener::browser_only("true");
        assert_eq!(
            view.open_link(1, &opener).unwrap(),
            OpenMethod::Browser("true".into())
        );
        assert!(view.open_link(3, &opener).is_err());
    }

    fn spawn_run(
        view: NoteView<RecordingStore>,
    ) -> (
        mpsc::Sender<ViewCommand>,
        mpsc::Sender<ClipboardEvent>,
        mpsc::Receiver<ViewSignal>,
        tokio::task::JoinHandle<NoteView<RecordingStore>>,
    ) {
        let (cmd_tx, cmd_rx) = mpsc::channel(16);
        let (clip_tx, clip_rx) = mpsc::channel(16);
        let (sig_tx, sig_rx) = mpsc::channel(16);
        let handle = tokio::spawn(view.run(cmd_rx, Some(clip_rx), sig_tx));
        (cmd_tx, clip_tx, sig_rx, handle)
    }

    #[tokio::test(start_paused = true)]
    async fn run_loop_debounces_clipboard_and_emits_pasted_text() {
        let (view, _, _) = open_view(RecordingStore::new(), "new").await;
        let (commands, clipboard, mut signals, handle) = spawn_run(view);

        clipboard.send(ClipboardEvent::external("https://a.com")).await.unwrap();
        clipboard.send(ClipboardEvent::external("https://b.com")).await.unwrap();
        sleep(Duration::from_millis(200)).await;

        clipboard.send(ClipboardEvent::external("Tom &amp; Jerry")).await.unwrap();
        assert_eq!(signals.recv().await, Some(ViewSignal::Pasted("Tom & Jerry".into())));

        commands.send(ViewCommand::Close).await.unwrap();
        let view = handle.await.unwrap();
        assert_eq!(view.session().links(), vec!["https://b.com"]);
    }

    #[tokio::test(start_paused = true)]
    async fn run_loop_prompts_and_saves_before_navigating() {
        let (view, store, _) = open_view(RecordingStore::new(), "new").await;
        let (commands, _clipboard, mut signals, handle) = spawn_run(view);

        commands.send(ViewCommand::SetTitle("Draft".into())).await.unwrap();
        commands.send(ViewCommand::Navigate("/".into())).await.unwrap();
        assert_eq!(
            signals.recv().await,
            Some(ViewSignal::NavigationPrompt { target: "/".into() })
        );

        commands
            .send(ViewCommand::ResolveNavigation(NavigationChoice::Save))
            .await
            .unwrap();
        let Some(ViewSignal::LocationChanged(location)) = signals.recv().await else {
            panic!("expected a location change");
        };
        assert!(location.starts_with("/note/note_"));
        assert_eq!(signals.recv().await, Some(ViewSignal::Navigated("/".into())));

        let view = handle.await.unwrap();
        assert_eq!(store.saves(), 1);
        assert!(!view.is_dirty());
    }

    #[tokio::test(start_paused = true)]
    async fn run_loop_autosaves_after_the_idle_window() {
        let store = Arc::new(RecordingStore::new());
        let options = ViewOptions {
            autosave: Some(Duration::from_secs(2)),
            ..ViewOptions::default()
        };
        let view = NoteView::open(Arc::clone(&store), EventBus::default(), options, "new").await;
        let (commands, _clipboard, mut signals, handle) = spawn_run(view);

        commands.send(ViewCommand::SetContent("a".into())).await.unwrap();
        sleep(Duration::from_secs(1)).await;
        commands.send(ViewCommand::SetContent("ab".into())).await.unwrap();
        sleep(Duration::from_millis(1500)).await;
        assert_eq!(store.saves(), 0);

        assert!(matches!(signals.recv().await, Some(ViewSignal::LocationChanged(_))));
        assert_eq!(store.saves(), 1);

        commands.send(ViewCommand::Close).await.unwrap();
        let view = handle.await.unwrap();
        assert_eq!(view.session().content(), "ab");
        assert!(!view.is_dirty());
    }

    #[tokio::test(start_paused = true)]
    async fn reverting_an_edit_cancels_the_pending_autosave() {
        let (store, id) = RecordingStore::with_note("A", "body", &[]);
        let store = Arc::new(store);
        let options = ViewOptions {
            autosave: Some(Duration::from_secs(2)),
            ..ViewOptions::default()
        };
        let view = NoteView::open(Arc::clone(&store), EventBus::default(), options, &id).await;
        let (commands, _clipboard, _signals, handle) = spawn_run(view);

        commands.send(ViewCommand::SetContent("changed".into())).await.unwrap();
        sleep(Duration::from_secs(1)).await;
        commands.send(ViewCommand::SetContent("body".into())).await.unwrap();
        sleep(Duration::from_secs(5)).await;

        commands.send(ViewCommand::Close).await.unwrap();
        let view = handle.await.unwrap();
        assert_eq!(store.updates(), 0);
        assert!(!view.is_dirty());
    }

    #[tokio::test]
    async fn rejected_edits_through_the_run_loop_keep_the_session() {
        let (store, id) = RecordingStore::with_note("A", "", &["https://a.com"]);
        let (view, _, bus) = open_view(store, &id).await;
        let mut notices = bus.subscribe_notices();
        let (commands, _clipboard, _signals, handle) = spawn_run(view);

        commands.send(ViewCommand::SetTitle("x".repeat(101))).await.unwrap();
        commands.send(ViewCommand::SetLinks("not a url".into())).await.unwrap();
        commands.send(ViewCommand::Close).await.unwrap();

        let view = handle.await.unwrap();
        assert_eq!(view.session().title(), "A");
        assert_eq!(view.session().links(), vec!["https://a.com"]);
        assert_eq!(notices.recv().await.unwrap().level, NoticeLevel::Warning);
        assert_eq!(notices.recv().await.unwrap().level, NoticeLevel::Warning);
    }
}
