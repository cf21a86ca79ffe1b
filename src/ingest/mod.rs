//! Bulk import of an external reading history.
//!
//! The pipeline:
//!
//! 1. **csv_import**: parse the export, infer categories, drop duplicates
//! 2. **queue**: JSONL-based FIFO queue, idempotent per book
//! 3. **processor**: confirm and place one queued book at a time
//!
//! ```text
//! export.csv → parse_export → dedup_against → ImportQueue → ImportProcessor → Shelf
//!                                                  ↓
//!                                         import_queue.jsonl
//! ```

pub mod csv_import;
pub mod processor;
pub mod queue;

// Re-export key types
pub use csv_import::{dedup_against, infer_category, parse_export, ImportRecord, ImportReport};
pub use processor::{Confirmation, ImportProcessor, ItemOutcome, Prompter, RunSummary};
pub use queue::{EnqueueResult, ImportQueue, ImportQueueError, ImportStatus, QueueItem, QueueStatus};
