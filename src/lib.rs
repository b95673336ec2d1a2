//! Link-aware note-taking library
//!
//! This library provides the editing controller behind linknotes: link
//! validation and deduplication, dirty tracking and saving of an open note,
//! clipboard classification, markdown autoformatting and the note list.

mod autoformat;
mod cli;
mod clipboard;
mod config;
mod debounce;
mod errors;
mod events;
mod helper;
mod links;
mod note;
mod opener;
mod session;
mod sidebar;
mod storage;
mod store;
mod types;
mod view;

// Re-export key components
pub use autoformat::*;
pub use cli::*;
pub use clipboard::*;
pub use config::*;
pub use debounce::*;
pub use errors::*;
pub use events::*;
pub use helper::*;
pub use links::*;
pub use note::*;
pub use opener::*;
pub use session::*;
pub use sidebar::*;
pub use storage::*;
pub use store::*;
pub use types::*;
pub use view::*;
