//! Error types for the linknotes application.
//!
//! This module defines custom error types that categorize different failures
//! that can occur while editing, validating and persisting notes.

use std::{io, path::PathBuf};

use thiserror::Error;

/// The main error type for the linknotes application.
#[derive(Error, Debug)]
pub enum NotesError {
    /// Errors related to file I/O operations.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Errors related to serialization/deserialization operations.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Note was not found when performing an operation.
    #[error("Note not found: {id}")]
    NoteNotFound { id: String },

    /// One or more link segments failed URL validation.
    #[error("Invalid URL detected: {}", segments.join(", "))]
    InvalidUrls { segments: Vec<String> },

    /// Title exceeds the allowed number of characters.
    #[error("Title is {length} characters long, the maximum is {max}")]
    TitleTooLong { length: usize, max: usize },

    /// Invalid note format or content.
    #[error("Invalid note format: {message}")]
    InvalidFormat { message: String },

    /// Directory creation or access failed.
    #[error("Failed to create or access directory: {path}")]
    DirectoryError { path: PathBuf },

    /// Errors related to configuration.
    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    /// for mutex lock acquisition issues
    #[error("{message}")]
    LockAcquisitionFailed { message: String },

    /// The system clipboard could not be read.
    #[error("Clipboard unavailable: {message}")]
    ClipboardUnavailable { message: String },

    /// Neither the native opener nor the browser fallback could open a link.
    #[error("Failed to open {url}: {message}")]
    OpenFailed { url: String, message: String },

    #[error("File watcher error: {message}")]
    WatcherError { message: String },

    /// Generic application error with a custom message.
    #[error("{message}")]
    ApplicationError { message: String },
}
