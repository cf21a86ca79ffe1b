//! booki - a personal bookshelf ranked by pairwise comparison
//!
//! Books live in one of four categories. Three are ranked: a new book is
//! placed by asking the user a short series of "which did you like more?"
//! questions (a binary search over the existing ranking). The fourth, `tbr`,
//! is a plain to-be-read list.
//!
//! # Architecture
//!
//! - Positions are dense per category (`0..n`) and every mutation is one
//!   SQLite transaction that re-checks density before committing
//! - A comparison session is a plain serializable value held by the caller,
//!   stamped with the category version it was read at
//! - Imports go through an append-only JSONL queue, one book at a time
//!
//! # Modules
//!
//! - `adapters`: External search (Open Library)
//! - `core`: PositionStore, ComparisonSession, reorder, Shelf add flow
//! - `domain`: Data structures (Category, Entry, Tags)
//! - `ingest`: CSV import, import queue, import processor
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Add a book and answer the comparisons
//! booki add "Dune" "Frank Herbert" --category liked-it
//!
//! # Show the shelf
//! booki list
//!
//! # Import a reading history
//! booki import goodreads_library_export.csv
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;
pub mod ingest;

// Re-export main types at crate root for convenience
pub use core::{ComparisonSession, PositionStore, Shelf, ShelfError, ShelfResult};
pub use domain::{Category, Entry, EntryId, NewEntry, Shelves, Tags};
pub use ingest::{ImportProcessor, ImportQueue};
