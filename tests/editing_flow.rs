use std::{sync::Arc, time::Duration};

use linknotes::{
    ClipboardEvent, ClipboardOutcome, EventBus, FileNoteStore, NavigationChoice, NavigationDecision,
    NoteEvent, NoteStore, NoteView, SaveOutcome, Sidebar, SidebarStateStore, ViewOptions,
};
use tempfile::TempDir;

fn open_store(dir: &TempDir) -> Arc<FileNoteStore> {
    let mut store = FileNoteStore::in_dir(dir.path().join("notes"));
    store.initialize().unwrap();
    Arc::new(store)
}

#[tokio::test]
async fn note_edited_from_the_clipboard_survives_a_restart() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let bus = EventBus::default();
    let mut events = bus.subscribe();

    let mut view = NoteView::open(Arc::clone(&store), bus.clone(), ViewOptions::default(), "new").await;
    view.set_title("Reading list").unwrap();

    view.on_clipboard(ClipboardEvent::external("HTTPS://Example.com/"));
    assert_eq!(
        view.settle_clipboard(),
        ClipboardOutcome::LinkAdded("https://example.com".into())
    );
    view.on_clipboard(ClipboardEvent::external("Rust &amp; friends"));
    assert_eq!(
        view.settle_clipboard(),
        ClipboardOutcome::Pasted("Rust & friends".into())
    );
    let pasted = view.take_pasted().unwrap();
    view.append_content(&format!("<p>{}</p>", pasted));

    let SaveOutcome::Saved(saved) = view.save().await else {
        panic!("save failed");
    };
    assert!(saved.relocated);
    assert_eq!(events.try_recv().unwrap(), NoteEvent::Saved);
    assert!(dir
        .path()
        .join("notes")
        .join(format!("{}.json", saved.note_id))
        .exists());

    // a second save updates the same file
    view.set_content("<p>rewritten</p>");
    assert!(matches!(view.save().await, SaveOutcome::Saved(ref s) if s.note_id == saved.note_id));

    let restarted = open_store(&dir);
    assert_eq!(restarted.list().await.unwrap().len(), 1);
    let reopened = NoteView::open(restarted, bus, ViewOptions::default(), &saved.note_id).await;
    assert!(!reopened.is_dirty());
    assert_eq!(reopened.session().title(), "Reading list");
    assert_eq!(reopened.session().content(), "<p>rewritten</p>");
    assert_eq!(reopened.session().links(), vec!["https://example.com"]);
}

#[tokio::test]
async fn discarding_on_navigation_leaves_the_file_untouched() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let bus = EventBus::default();
    let id = store
        .save(linknotes::NoteFields::new("Keep", "original", vec![]))
        .await
        .unwrap();

    let mut view = NoteView::open(Arc::clone(&store), bus, ViewOptions::default(), &id).await;
    view.set_content("scratch");
    assert_eq!(view.request_navigation("/"), NavigationDecision::Prompt);
    assert_eq!(
        view.resolve_navigation(NavigationChoice::Discard).await.as_deref(),
        Some("/")
    );

    let stored = store.load(&id).await.unwrap().unwrap();
    assert_eq!(stored.content, "original");
    assert_eq!(stored.created_at, stored.updated_at);
}

#[tokio::test]
async fn sidebar_deletes_notes_from_disk() {
    let dir = TempDir::new().unwrap();
    let store = open_store(&dir);
    let bus = EventBus::default();
    let id = store
        .save(linknotes::NoteFields::new("Doomed", "", vec![]))
        .await
        .unwrap();

    let state_store = SidebarStateStore::new(&dir.path().join("app_data"));
    let mut sidebar = Sidebar::open(
        Arc::clone(&store),
        bus,
        state_store.clone(),
        Duration::from_millis(50),
    )
    .await;
    assert_eq!(sidebar.notes().len(), 1);

    sidebar.delete_note(&id).await.unwrap();
    assert!(sidebar.notes().is_empty());
    assert!(store.load(&id).await.unwrap().is_none());
    assert!(!dir.path().join("notes").join(format!("{}.json", id)).exists());

    sidebar.persist_now().unwrap();
    assert!(state_store.load().unwrap().unwrap().notes.is_empty());
}
