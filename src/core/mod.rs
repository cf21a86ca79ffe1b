//! Core shelf logic.
//!
//! This module contains:
//! - PositionStore: dense per-category ordering over SQLite
//! - ComparisonSession: binary-search placement over human judgments
//! - Reorder: atomic whole-category permutations
//! - Shelf: the add flow tying the two together

pub mod comparison;
pub mod error;
pub mod position_store;
pub mod reorder;
pub mod shelf;

// Re-export commonly used types
pub use comparison::{max_comparisons, ComparisonSession, Placement};
pub use error::{ShelfError, ShelfResult};
pub use position_store::{PeerSnapshot, PositionStore};
pub use reorder::{move_entry, validate_permutation, Assignment};
pub use shelf::{AddStep, Judge, Shelf, MAX_RESTARTS};
