//! Cataloged books and their grouped listing.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::category::Category;
use super::tags::Tags;

/// Stable entry identifier (never reused)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(pub i64);

impl std::fmt::Display for EntryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for EntryId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(EntryId)
    }
}

/// A stored book
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entry {
    pub id: EntryId,

    pub title: String,

    pub author: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isbn: Option<String>,

    pub category: Category,

    /// Zero-based dense rank within the category (lower = preferred)
    pub position: usize,

    #[serde(default)]
    pub tags: Tags,

    pub added_at: DateTime<Utc>,
}

impl Entry {
    /// Whether this entry has the same `(title, author)` identity
    pub fn same_book(&self, title: &str, author: &str) -> bool {
        self.title == title && self.author == author
    }
}

/// A book that has not been placed yet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewEntry {
    pub title: String,

    pub author: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub isbn: Option<String>,

    #[serde(default)]
    pub tags: Tags,
}

impl NewEntry {
    pub fn new(title: impl Into<String>, author: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            author: author.into(),
            isbn: None,
            tags: Tags::default(),
        }
    }

    pub fn with_isbn(mut self, isbn: impl Into<String>) -> Self {
        self.isbn = Some(isbn.into());
        self
    }

    pub fn with_tags(mut self, tags: Tags) -> Self {
        self.tags = tags;
        self
    }
}

/// All entries grouped by category, each group ordered by position
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct Shelves(BTreeMap<Category, Vec<Entry>>);

impl Shelves {
    /// Group entries; every category is present even when empty
    pub fn from_entries(entries: impl IntoIterator<Item = Entry>) -> Self {
        let mut groups: BTreeMap<Category, Vec<Entry>> =
            Category::ALL.iter().map(|c| (*c, Vec::new())).collect();

        for entry in entries {
            groups.entry(entry.category).or_default().push(entry);
        }
        for group in groups.values_mut() {
            group.sort_by_key(|e| e.position);
        }

        Self(groups)
    }

    pub fn get(&self, category: Category) -> &[Entry] {
        self.0.get(&category).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (Category, &[Entry])> {
        self.0.iter().map(|(c, e)| (*c, e.as_slice()))
    }

    pub fn entries(&self) -> impl Iterator<Item = &Entry> {
        self.0.values().flatten()
    }

    pub fn contains_book(&self, title: &str, author: &str) -> bool {
        self.entries().any(|e| e.same_book(title, author))
    }

    /// Keep only entries whose tags match the filter
    pub fn filtered_by_tag(&self, filter: &str) -> Self {
        Self(
            self.0
                .iter()
                .map(|(c, entries)| {
                    let kept = entries
                        .iter()
                        .filter(|e| e.tags.matches_filter(filter))
                        .cloned()
                        .collect();
                    (*c, kept)
                })
                .collect(),
        )
    }

    pub fn len(&self) -> usize {
        self.0.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
