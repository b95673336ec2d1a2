//! CLI module for the linknotes application
//!
//! This module handles the command-line interface. Edits go through a
//! [`NoteView`] and deletions through the [`Sidebar`], so the command line
//! follows the same validation and save rules as an interactive session.
use std::{
    io::{stdin, stdout, Write},
    path::PathBuf,
    sync::Arc,
};

use console::style;
use log::{debug, info, warn};
use tokio::{
    io::{AsyncBufReadExt, BufReader},
    sync::{broadcast::error::RecvError, mpsc, oneshot},
};

use crate::{
    extract_domain, format_line_on_space, markdown_paste_to_html, ClipboardStatus, ClipboardWatcher,
    Commands, Config, EventBus, FileNoteStore, LinkOpener, NavigationChoice, Note, NoteMetadata,
    NoteStore, NoteView, Notice, NoticeLevel, NotesError, OpenMethod, Result, SaveOutcome, Sidebar,
    SidebarStateStore, SystemClipboard, ViewCommand, ViewOptions, ViewSignal,
};

/// Working id of a note that has not been saved yet
const NEW_NOTE_ID: &str = "new";

/// CLI Application handler - processes CLI commands against the note store
pub struct App {
    /// The note storage backend
    store: Arc<FileNoteStore>,

    /// Process-wide note events and notices
    bus: EventBus,

    /// Application configuration
    config: Config,

    /// Where the configuration was loaded from
    config_path: Option<PathBuf>,

    /// Whether to display verbose output
    verbose: bool,
}

impl App {
    pub fn new(
        store: Arc<FileNoteStore>,
        bus: EventBus,
        config: Config,
        config_path: Option<PathBuf>,
        verbose: bool,
    ) -> Self {
        Self {
            store,
            bus,
            config,
            config_path,
            verbose,
        }
    }

    /// Run the CLI application with the given command
    pub async fn run(&self, command: Commands) -> Result<()> {
        match command {
            Commands::List { limit, json } => self.list_notes(limit, json).await?,
            Commands::Show { id, json } => self.show_note(&id, json).await?,
            Commands::New {
                title,
                content,
                links,
            } => self.create_note(title, content, links).await?,
            Commands::Edit {
                id,
                title,
                content,
                links,
            } => self.edit_note(&id, title, content, links).await?,
            Commands::Delete { id, force } => self.handle_delete(&id, force).await?,
            Commands::Search { query, limit, json } => self.handle_search(&query, limit, json)?,
            Commands::Open { id, index, copy } => self.handle_open(&id, index, copy).await?,
            Commands::Watch { id } => self.watch_note(&id).await?,
            Commands::Config {
                show,
                reset,
                output,
            } => self.handle_config(show, reset, output)?,
        }

        Ok(())
    }

    fn view_options(&self) -> ViewOptions {
        ViewOptions::from(&self.config)
    }

    async fn open_view(&self, note_id: &str) -> NoteView<FileNoteStore> {
        NoteView::open(Arc::clone(&self.store), self.bus.clone(), self.view_options(), note_id).await
    }

    async fn existing_note(&self, id: &str) -> Result<Note> {
        self.store
            .load(id)
            .await?
            .ok_or_else(|| NotesError::NoteNotFound { id: id.to_string() })
    }

    async fn list_notes(&self, limit: usize, json: bool) -> Result<()> {
        let mut notes = self.store.list().await?;
        if limit > 0 {
            notes.truncate(limit);
        }

        if json {
            println!("{}", serde_json::to_string_pretty(&notes)?);
            return Ok(());
        }

        if notes.is_empty() {
            println!("No notes yet.");
            return Ok(());
        }

        for note in &notes {
            self.print_metadata(note);
        }
        println!(
            "\n{} note{}",
            notes.len(),
            if notes.len() == 1 { "" } else { "s" }
        );
        Ok(())
    }

    fn print_metadata(&self, note: &NoteMetadata) {
        println!(
            "{} | {} | {}",
            style(&note.id).dim(),
            note.updated_at.format("%Y-%m-%d %H:%M"),
            style(&note.title).bold()
        );
    }

    async fn show_note(&self, id: &str, json: bool) -> Result<()> {
        let note = self.existing_note(id).await?;

        if json {
            println!("{}", serde_json::to_string_pretty(&note)?);
            return Ok(());
        }

        self.print_note(&note, true);
        Ok(())
    }

    fn print_note(&self, note: &Note, with_content: bool) {
        println!("Title:   {}", style(&note.title).bold());
        println!("ID:      {}", note.id);
        println!("Created: {}", note.created_at.format("%Y-%m-%d %H:%M:%S"));
        println!("Updated: {}", note.updated_at.format("%Y-%m-%d %H:%M:%S"));

        if !note.links.is_empty() {
            println!("Links:");
            for (i, link) in note.links.iter().enumerate() {
                println!("  {}. {} {}", i + 1, link, style(format!("({})", extract_domain(link))).cyan());
            }
        }

        if with_content && !note.content.trim().is_empty() {
            println!("\n{}", note.content);
        }
    }

    async fn create_note(&self, title: String, content: String, links: Option<String>) -> Result<()> {
        let mut view = self.open_view(NEW_NOTE_ID).await;
        view.set_title(title)?;
        view.set_content(content);
        if let Some(links) = links {
            view.set_links(&links)?;
        }

        match view.save().await {
            SaveOutcome::Saved(saved) => {
                println!("Created note {}", style(&saved.note_id).green());
                Ok(())
            }
            SaveOutcome::Skipped => {
                println!("Nothing to save: title and content are empty.");
                Ok(())
            }
            SaveOutcome::Failed => Err(NotesError::ApplicationError {
                message: "Failed to save note".to_string(),
            }),
        }
    }

    async fn edit_note(
        &self,
        id: &str,
        title: Option<String>,
        content: Option<String>,
        links: Option<String>,
    ) -> Result<()> {
        self.existing_note(id).await?;
        let mut view = self.open_view(id).await;

        if let Some(title) = title {
            view.set_title(title)?;
        }
        if let Some(content) = content {
            view.set_content(content);
        }
        if let Some(links) = links {
            view.set_links(&links)?;
        }

        if !view.is_dirty() {
            println!("No changes to save.");
            return Ok(());
        }

        match view.save().await {
            SaveOutcome::Saved(saved) => {
                println!("Updated note {}", style(&saved.note_id).green());
                Ok(())
            }
            SaveOutcome::Skipped => {
                println!("Nothing to save: title and content are empty.");
                Ok(())
            }
            SaveOutcome::Failed => Err(NotesError::ApplicationError {
                message: "Failed to save note".to_string(),
            }),
        }
    }

    async fn open_sidebar(&self) -> Sidebar<FileNoteStore> {
        Sidebar::open(
            Arc::clone(&self.store),
            self.bus.clone(),
            SidebarStateStore::from_config(&self.config),
            self.config.sidebar_debounce(),
        )
        .await
    }

    async fn handle_delete(&self, id: &str, force: bool) -> Result<()> {
        let note = self.existing_note(id).await?;

        if !force {
            println!("You are about to delete the following note:");
            self.print_note(&note, false);

            println!("\nThis action cannot be undone!");
            print!("Are you sure you want to delete this note? [y/N]: ");
            stdout().flush()?;

            let mut input = String::new();
            stdin().read_line(&mut input)?;

            let input = input.trim().to_lowercase();
            if input != "y" && input != "yes" {
                println!("Deletion cancelled.");
                return Ok(());
            }
        }

        let mut sidebar = self.open_sidebar().await;
        sidebar.delete_note(id).await?;
        if let Err(e) = sidebar.persist_now() {
            warn!("Failed to write sidebar state: {}", e);
        }

        println!("Note '{}' ({}) has been permanently deleted.", note.title, note.id);
        Ok(())
    }

    fn handle_search(&self, query: &str, limit: usize, json: bool) -> Result<()> {
        let mut results = self.store.search_notes(query);
        if limit > 0 {
            results.truncate(limit);
        }

        if json {
            println!("{}", serde_json::to_string_pretty(&results)?);
            return Ok(());
        }

        if results.is_empty() {
            println!("No notes found matching query: \"{}\"", query);
            return Ok(());
        }

        for note in &results {
            self.print_metadata(&note.metadata());
        }
        println!("\nFound {} matching notes.", results.len());
        Ok(())
    }

    async fn handle_open(&self, id: &str, index: usize, copy: bool) -> Result<()> {
        self.existing_note(id).await?;
        let view = self.open_view(id).await;

        if copy {
            let url = view.copy_link(index).await?;
            println!("Copied {}", style(url).cyan());
            return Ok(());
        }

        match view.open_link(index, &LinkOpener::new(&self.config))? {
            OpenMethod::Native => println!("Opened link #{}", index),
            OpenMethod::Browser(browser) => println!("Opened link #{} with {}", index, browser),
        }
        Ok(())
    }

    fn handle_config(&self, show: bool, reset: bool, output: Option<PathBuf>) -> Result<()> {
        if reset {
            let path = output
                .or_else(|| self.config_path.clone())
                .or_else(Config::default_path)
                .ok_or_else(|| NotesError::ConfigError {
                    message: "No configuration path available".to_string(),
                })?;
            Config::default().save(&path)?;
            println!("Configuration reset at {}", path.display());
            return Ok(());
        }

        if let Some(path) = &output {
            self.config.save(path)?;
            println!("Configuration written to {}", path.display());
        }

        if show || output.is_none() {
            if self.verbose {
                if let Some(path) = self.config_path.clone().or_else(Config::default_path) {
                    println!("# {}", path.display());
                }
            }
            println!("{}", serde_json::to_string_pretty(&self.config)?);
        }
        Ok(())
    }

    /// Interactive editing: the clipboard feeds the note while lines typed
    /// on stdin edit it.
    async fn watch_note(&self, id: &str) -> Result<()> {
        let watcher = ClipboardWatcher::new(SystemClipboard, self.config.clipboard_poll_interval());
        let internal_copies = watcher.internal_copies();
        let (clipboard_tx, clipboard_rx) = mpsc::channel(16);
        let (status, clipboard_task) = watcher.start(clipboard_tx).await;

        let mut view = self
            .open_view(id)
            .await
            .with_opener(LinkOpener::new(&self.config))
            .with_internal_copies(internal_copies);
        view.set_clipboard_status(status.clone());

        match &status {
            ClipboardStatus::Monitoring => println!("{}", style("Watching the clipboard").green()),
            ClipboardStatus::Unavailable(reason) => {
                println!("{} {}", style("Clipboard unavailable:").yellow(), reason)
            }
        }
        if let Some(note) = view.session().snapshot() {
            self.print_note(note, true);
        } else {
            println!("New note");
        }
        print_watch_help();

        let sidebar = self.open_sidebar().await;
        let (stop_sidebar, sidebar_stop_rx) = oneshot::channel();
        let sidebar_task = tokio::spawn(sidebar.run(self.bus.subscribe(), sidebar_stop_rx));

        let mut notices = self.bus.subscribe_notices();
        let notice_task = tokio::spawn(async move {
            loop {
                match notices.recv().await {
                    Ok(notice) => print_notice(&notice),
                    Err(RecvError::Lagged(_)) => continue,
                    Err(RecvError::Closed) => break,
                }
            }
        });

        let (commands, commands_rx) = mpsc::channel(16);
        let (signals_tx, mut signals) = mpsc::channel(16);
        let clipboard_rx = clipboard_task.as_ref().map(|_| clipboard_rx);
        let view_task = tokio::spawn(view.run(commands_rx, clipboard_rx, signals_tx));

        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        let mut stdin_open = true;
        let mut awaiting_choice = false;

        loop {
            tokio::select! {
                signal = signals.recv() => match signal {
                    Some(ViewSignal::Pasted(text)) => {
                        let markup = markdown_paste_to_html(&text)
                            .unwrap_or_else(|| format!("<p>{}</p>", html_escape::encode_text(&text)));
                        println!("{} {}", style("Pasted:").cyan(), text);
                        send_command(&commands, ViewCommand::AppendContent(markup)).await;
                    }
                    Some(ViewSignal::NavigationPrompt { target }) => {
                        debug!("Navigation to {} needs confirmation", target);
                        awaiting_choice = true;
                        print!("Unsaved changes. [s]ave, [d]iscard or [c]ancel? ");
                        stdout().flush()?;
                    }
                    Some(ViewSignal::LocationChanged(location)) => {
                        println!("Note is now at {}", style(location).green());
                    }
                    Some(ViewSignal::Navigated(_)) | None => break,
                },
                line = lines.next_line(), if stdin_open => match line? {
                    Some(line) if awaiting_choice => match parse_choice(&line) {
                        Some(choice) => {
                            awaiting_choice = false;
                            send_command(&commands, ViewCommand::ResolveNavigation(choice)).await;
                        }
                        None => {
                            print!("Please answer s, d or c: ");
                            stdout().flush()?;
                        }
                    },
                    Some(line) => {
                        if let Some(command) = parse_watch_line(&line) {
                            send_command(&commands, command).await;
                        } else if line.trim() == ":help" {
                            print_watch_help();
                        }
                    }
                    None => {
                        stdin_open = false;
                        send_command(&commands, ViewCommand::Navigate("/".to_string())).await;
                    }
                },
                _ = tokio::signal::ctrl_c() => {
                    println!();
                    send_command(&commands, ViewCommand::Navigate("/".to_string())).await;
                }
            }

            if !stdin_open && awaiting_choice {
                // nobody left to answer the prompt
                send_command(&commands, ViewCommand::ResolveNavigation(NavigationChoice::Save)).await;
                awaiting_choice = false;
            }
        }

        drop(commands);
        let view = view_task.await.map_err(|e| NotesError::ApplicationError {
            message: format!("Note view task failed: {}", e),
        })?;
        info!("Left {} ({:?})", view.location(), view.state());

        if let Some(task) = clipboard_task {
            task.abort();
        }
        let _ = stop_sidebar.send(());
        match sidebar_task.await {
            Ok(mut sidebar) => {
                if let Err(e) = sidebar.persist_now() {
                    warn!("Failed to write sidebar state: {}", e);
                }
            }
            Err(e) => warn!("Sidebar task failed: {}", e),
        }
        notice_task.abort();
        Ok(())
    }
}

async fn send_command(commands: &mpsc::Sender<ViewCommand>, command: ViewCommand) {
    if commands.send(command).await.is_err() {
        debug!("Note view already closed");
    }
}

fn parse_choice(line: &str) -> Option<NavigationChoice> {
    match line.trim().to_lowercase().as_str() {
        "s" | "save" => Some(NavigationChoice::Save),
        "d" | "discard" => Some(NavigationChoice::Discard),
        "c" | "cancel" => Some(NavigationChoice::Cancel),
        _ => None,
    }
}

/// Turns a line typed in watch mode into a view command
fn parse_watch_line(line: &str) -> Option<ViewCommand> {
    let trimmed = line.trim();
    if let Some(rest) = trimmed.strip_prefix(':') {
        let (name, arg) = rest.split_once(' ').unwrap_or((rest, ""));
        let arg = arg.trim();
        let index = || arg.parse::<usize>().ok();
        return match name {
            "t" | "title" => Some(ViewCommand::SetTitle(arg.to_string())),
            "l" | "links" => Some(ViewCommand::SetLinks(arg.to_string())),
            "s" | "save" => Some(ViewCommand::Save),
            "o" | "open" => Some(ViewCommand::OpenLink(index().unwrap_or(1))),
            "y" | "copy" => Some(ViewCommand::CopyLink(index().unwrap_or(1))),
            "q" | "quit" => Some(ViewCommand::Navigate("/".to_string())),
            _ => None,
        };
    }

    if trimmed.is_empty() {
        return None;
    }

    let markup = match format_line_on_space(line) {
        Some(block) => block.to_html(),
        None => format!("<p>{}</p>", html_escape::encode_text(trimmed)),
    };
    Some(ViewCommand::AppendContent(markup))
}

fn print_notice(notice: &Notice) {
    match notice.level {
        NoticeLevel::Success => println!("{}", style(&notice.message).green()),
        NoticeLevel::Warning => println!("{}", style(&notice.message).yellow()),
        NoticeLevel::Error => println!("{}", style(&notice.message).red().bold()),
    }
}

fn print_watch_help() {
    println!("Copy a link to attach it, copy text to append it. Type a line to append it.");
    println!("  :t <title>   set the title");
    println!("  :l <links>   replace the links (comma-separated)");
    println!("  :o <n>       open link n      :y <n>  copy link n");
    println!("  :s           save             :q      leave");
}
