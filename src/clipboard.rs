//! Clipboard notifications and their classification.
//!
//! [`ClipboardWatcher`] polls the system clipboard and emits a
//! [`ClipboardEvent`] whenever its text changes. [`ClipboardClassifier`]
//! decides whether an event is a link for the note's link list or prose for
//! the editing surface.
use std::{
    future::Future,
    process::Stdio,
    sync::{Arc, Mutex},
    time::Duration,
};

use chrono::{DateTime, Utc};
use log::{debug, info, trace, warn};
use tokio::{
    io::AsyncWriteExt,
    process::Command,
    sync::mpsc,
    task::JoinHandle,
    time::{interval, MissedTickBehavior},
};

use crate::{add_url_to_urls, contains_url, is_valid_url, normalize_url, NotesError, Result};

/// Text that appeared on the clipboard
#[derive(Debug, Clone, PartialEq)]
pub struct ClipboardEvent {
    pub text: String,
    /// The copy was made by this application
    pub from_app: bool,
    pub received_at: DateTime<Utc>,
}

impl ClipboardEvent {
    pub fn new(text: impl Into<String>, from_app: bool) -> Self {
        Self {
            text: text.into(),
            from_app,
            received_at: Utc::now(),
        }
    }

    /// An event for text copied outside the application
    pub fn external(text: impl Into<String>) -> Self {
        Self::new(text, false)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    Empty,
    FromApp,
    Duplicate,
    KnownLink,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Ignored(IgnoreReason),
    /// A new link; `links` is the list with the link appended
    Link { url: String, links: Vec<String> },
    /// Prose with HTML entities decoded, for the editing surface
    Prose(String),
}

/// Classifies clipboard events, remembering the last text it acted on
#[derive(Debug, Default)]
pub struct ClipboardClassifier {
    last_processed: Option<String>,
}

impl ClipboardClassifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether an event is worth scheduling for classification at all
    pub fn accepts(event: &ClipboardEvent) -> bool {
        !event.from_app && !event.text.trim().is_empty()
    }

    pub fn last_processed(&self) -> Option<&str> {
        self.last_processed.as_deref()
    }

    pub fn classify<S: AsRef<str>>(&mut self, event: &ClipboardEvent, current_links: &[S]) -> Classification {
        let text = event.text.trim();
        if text.is_empty() {
            return Classification::Ignored(IgnoreReason::Empty);
        }
        if event.from_app {
            trace!("Ignoring clipboard text copied by the application");
            return Classification::Ignored(IgnoreReason::FromApp);
        }
        if self.last_processed.as_deref() == Some(text) {
            debug!("Clipboard text already processed, ignoring");
            return Classification::Ignored(IgnoreReason::Duplicate);
        }

        if is_valid_url(text) {
            let url = normalize_url(text);
            if contains_url(current_links, &url) {
                debug!("Clipboard link {} already attached", url);
                return Classification::Ignored(IgnoreReason::KnownLink);
            }
            self.last_processed = Some(text.to_string());
            let links = add_url_to_urls(current_links, &url);
            Classification::Link { url, links }
        } else {
            self.last_processed = Some(text.to_string());
            Classification::Prose(html_escape::decode_html_entities(text).into_owned())
        }
    }
}

/// Source of clipboard text
pub trait ClipboardReader {
    fn read_text(&self) -> impl Future<Output = Result<String>> + Send;
}

/// The platform clipboard, reached through its command line tools
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClipboard;

impl SystemClipboard {
    /// Copies `text` to the clipboard
    pub async fn write_text(&self, text: &str) -> Result<()> {
        let mut last_error = String::from("no clipboard command for this platform");

        for (program, args) in write_commands() {
            match pipe_to(program, args, text).await {
                Ok(()) => {
                    debug!("Copied {} bytes with {}", text.len(), program);
                    return Ok(());
                }
                Err(message) => last_error = message,
            }
        }

        Err(NotesError::ClipboardUnavailable { message: last_error })
    }
}

/// Runs `program` with `text` on its stdin. The child is always reaped.
async fn pipe_to(program: &str, args: &[&str], text: &str) -> std::result::Result<(), String> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()
        .map_err(|e| format!("Failed to spawn {}: {}", program, e))?;

    let written = match child.stdin.take() {
        Some(mut stdin) => stdin.write_all(text.as_bytes()).await,
        None => Ok(()),
    };

    if let Err(e) = written {
        if let Err(kill_error) = child.kill().await {
            warn!("Failed to stop {}: {}", program, kill_error);
        }
        return Err(format!("Failed to write to {}: {}", program, e));
    }

    match child.wait().await {
        Ok(status) if status.success() => Ok(()),
        Ok(status) => Err(format!("{} exited with {}", program, status)),
        Err(e) => Err(format!("Failed to wait for {}: {}", program, e)),
    }
}

impl ClipboardReader for SystemClipboard {
    async fn read_text(&self) -> Result<String> {
        let mut last_error = String::from("no clipboard command for this platform");

        for (program, args) in read_commands() {
            match Command::new(program).args(*args).stderr(Stdio::null()).output().await {
                Ok(output) if output.status.success() => {
                    return Ok(String::from_utf8_lossy(&output.stdout).into_owned());
                }
                Ok(output) => last_error = format!("{} exited with {}", program, output.status),
                Err(e) => last_error = format!("Failed to run {}: {}", program, e),
            }
        }

        Err(NotesError::ClipboardUnavailable { message: last_error })
    }
}

type ClipboardCommand = (&'static str, &'static [&'static str]);

fn read_commands() -> &'static [ClipboardCommand] {
    if cfg!(target_os = "macos") {
        &[("pbpaste", &[])]
    } else if cfg!(windows) {
        &[("powershell", &["-NoProfile", "-Command", "Get-Clipboard"])]
    } else {
        &[
            ("xclip", &["-selection", "clipboard", "-o"]),
            ("xsel", &["--clipboard", "--output"]),
        ]
    }
}

fn write_commands() -> &'static [ClipboardCommand] {
    if cfg!(target_os = "macos") {
        &[("pbcopy", &[])]
    } else if cfg!(windows) {
        &[("clip", &[])]
    } else {
        &[
            ("xclip", &["-selection", "clipboard"]),
            ("xsel", &["--clipboard", "--input"]),
        ]
    }
}

/// Remembers the last text the application itself copied
#[derive(Debug, Clone, Default)]
pub struct InternalCopies(Arc<Mutex<Option<String>>>);

impl InternalCopies {
    pub fn mark(&self, text: impl Into<String>) {
        if let Ok(mut last) = self.0.lock() {
            *last = Some(text.into());
        }
    }

    pub fn is_internal(&self, text: &str) -> bool {
        self.0
            .lock()
            .map(|last| last.as_deref() == Some(text))
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClipboardStatus {
    Monitoring,
    Unavailable(String),
}

/// Polls a [`ClipboardReader`] and reports text changes
pub struct ClipboardWatcher<R> {
    reader: R,
    poll_interval: Duration,
    internal: InternalCopies,
}

impl<R: ClipboardReader + Send + Sync + 'static> ClipboardWatcher<R> {
    /// A zero `poll_interval` is raised to one millisecond.
    pub fn new(reader: R, poll_interval: Duration) -> Self {
        Self {
            reader,
            poll_interval: poll_interval.max(Duration::from_millis(1)),
            internal: InternalCopies::default(),
        }
    }

    /// Handle for marking copies made by the application
    pub fn internal_copies(&self) -> InternalCopies {
        self.internal.clone()
    }

    /// Probes the clipboard and starts polling.
    ///
    /// Text already on the clipboard is not reported. When the probe fails the
    /// watcher is not started and the status says why.
    pub async fn start(self, tx: mpsc::Sender<ClipboardEvent>) -> (ClipboardStatus, Option<JoinHandle<()>>) {
        let mut last = match self.reader.read_text().await {
            Ok(text) => text,
            Err(e) => {
                warn!("Clipboard monitoring unavailable: {}", e);
                return (ClipboardStatus::Unavailable(e.to_string()), None);
            }
        };

        info!("Watching clipboard every {:?}", self.poll_interval);
        let handle = tokio::spawn(async move {
            let mut ticker = interval(self.poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                let text = match self.reader.read_text().await {
                    Ok(text) => text,
                    Err(e) => {
                        trace!("Clipboard read failed: {}", e);
                        continue;
                    }
                };
                if text.is_empty() || text == last {
                    continue;
                }

                last = text.clone();
                let from_app = self.internal.is_internal(&text);
                if tx.send(ClipboardEvent::new(text, from_app)).await.is_err() {
                    debug!("Clipboard listener gone, stopping watcher");
                    break;
                }
            }
        });

        (ClipboardStatus::Monitoring, Some(handle))
    }
}
