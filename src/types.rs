//! Shared value types for the linknotes application.
//!
//! This module contains the crate `Result` alias, user-facing notices and the
//! command-line subcommands.
use std::path::PathBuf;

use clap::Subcommand;
use serde::{Deserialize, Serialize};

use crate::NotesError;

/// A specialized Result type for linknotes operations.
pub type Result<T> = std::result::Result<T, NotesError>;

/// Severity of a user-visible notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoticeLevel {
    Success,
    Warning,
    Error,
}

/// A user-visible notification ("toast")
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Success,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: NoticeLevel::Error,
            message: message.into(),
        }
    }
}

/// Available subcommands for the linknotes application
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List notes, most recently updated first
    List {
        /// Limit the number of notes shown (0 shows all)
        #[clap(short = 'n', long, default_value_t = 0)]
        limit: usize,

        /// Format output as JSON
        #[clap(short, long)]
        json: bool,
    },

    /// View a note by ID
    Show {
        /// ID of the note to view
        id: String,

        /// Format output as raw JSON
        #[clap(short, long)]
        json: bool,
    },

    /// Create a new note
    New {
        /// Title of the note
        #[clap(short = 'T', long, default_value = "")]
        title: String,

        /// Content of the note
        #[clap(short, long, default_value = "")]
        content: String,

        /// Links to attach (comma-separated)
        #[clap(short, long)]
        links: Option<String>,
    },

    /// Edit an existing note
    Edit {
        /// ID of the note to edit
        id: String,

        /// New title for the note
        #[clap(short = 'T', long)]
        title: Option<String>,

        /// New content for the note
        #[clap(short, long)]
        content: Option<String>,

        /// Replace the links (comma-separated, empty string clears them)
        #[clap(short, long)]
        links: Option<String>,
    },

    /// Delete a note by ID
    Delete {
        /// ID of the note to delete
        id: String,

        /// Skip confirmation prompt
        #[clap(short, long)]
        force: bool,
    },

    /// Search notes by title or content
    Search {
        /// Search query text
        query: String,

        /// Limit the number of search results
        #[clap(short = 'n', long, default_value_t = 10)]
        limit: usize,

        /// Format output as JSON
        #[clap(short, long)]
        json: bool,
    },

    /// Open one of a note's links in the browser
    Open {
        /// ID of the note
        id: String,

        /// Position of the link in the note's list (starting at 1)
        #[clap(short, long, default_value_t = 1)]
        index: usize,

        /// Copy the link to the clipboard instead of opening it
        #[clap(short, long)]
        copy: bool,
    },

    /// Edit a note interactively from the clipboard: copied links are attached,
    /// copied text is appended to the content
    Watch {
        /// ID of the note to watch (unknown IDs start a new note)
        id: String,
    },

    /// Configuration management
    Config {
        /// Show current configuration
        #[clap(short = 'S', long)]
        show: bool,

        /// Reset configuration to defaults
        #[clap(short, long)]
        reset: bool,

        /// Path to write the configuration to (defaults to the loaded path)
        #[clap(short, long)]
        output: Option<PathBuf>,
    },
}
