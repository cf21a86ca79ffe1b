//! Domain types for the shelf.
//!
//! - Category: the fixed classification buckets
//! - Entry: a stored book, plus the grouped `Shelves` listing
//! - Tags: normalized free-text labels

pub mod category;
pub mod entry;
pub mod tags;

pub use category::Category;
pub use entry::{Entry, EntryId, NewEntry, Shelves};
pub use tags::{all_tags, Tags};
