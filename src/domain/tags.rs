//! Free-text tag sets.
//!
//! Tags are stored as a single normalized string (`"fantasy, re-read"`).
//! Matching is case-insensitive because every tag is lowercased on the way in.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

/// Normalized, order-preserving set of tags
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct Tags(Vec<String>);

impl Tags {
    /// Parse a comma-separated tag list
    pub fn parse(raw: &str) -> Self {
        let mut tags: Vec<String> = Vec::new();
        for tag in raw.split(',') {
            let tag = tag.trim().to_lowercase();
            if !tag.is_empty() && !tags.contains(&tag) {
                tags.push(tag);
            }
        }
        Self(tags)
    }

    /// Stored form
    pub fn to_stored(&self) -> String {
        self.0.join(", ")
    }

    pub fn contains(&self, tag: &str) -> bool {
        let tag = tag.trim().to_lowercase();
        self.0.iter().any(|t| *t == tag)
    }

    /// Remove the tag if present, add it otherwise
    pub fn toggle(&mut self, tag: &str) {
        let tag = tag.trim().to_lowercase();
        if tag.is_empty() {
            return;
        }
        if let Some(idx) = self.0.iter().position(|t| *t == tag) {
            self.0.remove(idx);
        } else {
            self.0.push(tag);
        }
    }

    /// Case-insensitive substring match against the stored form
    pub fn matches_filter(&self, filter: &str) -> bool {
        let filter = filter.trim().to_lowercase();
        filter.is_empty() || self.to_stored().contains(&filter)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<String> for Tags {
    fn from(raw: String) -> Self {
        Self::parse(&raw)
    }
}

impl From<Tags> for String {
    fn from(tags: Tags) -> Self {
        tags.to_stored()
    }
}

impl std::fmt::Display for Tags {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_stored())
    }
}

/// Sorted set of every tag in use
pub fn all_tags<'a>(sets: impl IntoIterator<Item = &'a Tags>) -> Vec<String> {
    let unique: BTreeSet<&str> = sets.into_iter().flat_map(|t| t.iter()).collect();
    unique.into_iter().map(str::to_string).collect()
}
