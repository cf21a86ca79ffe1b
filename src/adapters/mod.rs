//! Adapter interfaces for external systems.
//!
//! The only external system is a bibliographic search service used to look
//! up candidates before adding them.

pub mod openlibrary;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::core::ShelfResult;
use crate::domain::NewEntry;

pub use openlibrary::OpenLibraryClient;

/// One search result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub title: String,
    pub author: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isbn: Option<String>,
}

impl SearchHit {
    /// Turn a hit into an unplaced shelf entry
    pub fn into_new_entry(self) -> NewEntry {
        let entry = NewEntry::new(self.title, self.author);
        match self.isbn {
            Some(isbn) => entry.with_isbn(isbn),
            None => entry,
        }
    }
}

/// Trait for title search backends
#[async_trait]
pub trait BookSearch: Send + Sync {
    /// Human-readable backend name
    fn name(&self) -> &str;

    /// Free-text search; blank queries are rejected with `InvalidInput`
    async fn search(&self, query: &str) -> ShelfResult<Vec<SearchHit>>;
}
