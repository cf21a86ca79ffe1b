//! Error taxonomy for shelf operations.

use thiserror::Error;

use crate::domain::{Category, EntryId};

/// Errors surfaced by the store, the add flow and the search adapter
#[derive(Debug, Error)]
pub enum ShelfError {
    #[error("Entry not found: {0}")]
    NotFound(EntryId),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Position {position} out of range for '{category}' ({count} entries)")]
    InvalidPosition {
        category: Category,
        position: usize,
        count: usize,
    },

    #[error("Already on the shelf: '{title}' by {author}")]
    Duplicate { title: String, author: String },

    #[error("'{category}' changed during comparison (expected version {expected}, found {found})")]
    StaleSnapshot {
        category: Category,
        expected: u64,
        found: u64,
    },

    #[error("Search service unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("Position invariant violated in '{category}': {detail}")]
    InvariantViolation { category: Category, detail: String },

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ShelfError {
    /// Whether the caller should restart the add flow from the beginning
    pub fn needs_restart(&self) -> bool {
        matches!(self, ShelfError::StaleSnapshot { .. })
    }
}

pub type ShelfResult<T> = Result<T, ShelfError>;
