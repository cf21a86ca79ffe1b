//! Drives queued imports through confirmation and placement.
//!
//! One item at a time: the current item is confirmed by the user, placed on
//! the shelf through the normal comparison flow, then completed or discarded
//! in the queue. Abandoning a comparison pauses the run and leaves the item
//! current so `resume` picks it up again.

use anyhow::Result;
use tracing::{info, warn};

use super::csv_import::ImportRecord;
use super::queue::{ImportQueue, QueueItem};
use crate::core::{Judge, Shelf, ShelfError, ShelfResult};
use crate::domain::{Category, Entry, Tags};

/// What the user settled for an item before placement
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Confirmation {
    pub category: Category,
    pub tags: Tags,
}

/// User interaction needed while importing
pub trait Prompter: Judge {
    /// Confirm or change the inferred category and collect tags.
    /// `None` discards the item.
    fn confirm(&mut self, record: &ImportRecord) -> ShelfResult<Option<Confirmation>>;
}

impl<P: Prompter + ?Sized> Prompter for &mut P {
    fn confirm(&mut self, record: &ImportRecord) -> ShelfResult<Option<Confirmation>> {
        (**self).confirm(record)
    }
}

/// Result of handling one item
#[derive(Debug, Clone)]
pub enum ItemOutcome {
    Inserted(Entry),
    Discarded,
    /// Comparison abandoned; the item stays current
    Paused,
}

/// Totals for a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub inserted: usize,
    pub discarded: usize,
    pub paused: bool,
}

pub struct ImportProcessor<'a, P: Prompter> {
    shelf: &'a mut Shelf,
    queue: &'a ImportQueue,
    prompter: P,
}

impl<'a, P: Prompter> ImportProcessor<'a, P> {
    pub fn new(shelf: &'a mut Shelf, queue: &'a ImportQueue, prompter: P) -> Self {
        Self {
            shelf,
            queue,
            prompter,
        }
    }

    /// Process items until the queue drains or the user pauses
    pub async fn run(&mut self) -> Result<RunSummary> {
        let mut summary = RunSummary::default();

        while let Some(outcome) = self.process_next().await? {
            match outcome {
                ItemOutcome::Inserted(_) => summary.inserted += 1,
                ItemOutcome::Discarded => summary.discarded += 1,
                ItemOutcome::Paused => {
                    summary.paused = true;
                    break;
                }
            }
        }

        info!(
            inserted = summary.inserted,
            discarded = summary.discarded,
            paused = summary.paused,
            "Import run finished"
        );
        Ok(summary)
    }

    /// Handle the current item, or start the next one.
    /// Returns `None` when nothing is left.
    pub async fn process_next(&mut self) -> Result<Option<ItemOutcome>> {
        let item = match self.queue.current().await? {
            Some(item) => item,
            None => match self.queue.begin_next().await? {
                Some(item) => item,
                None => return Ok(None),
            },
        };

        self.process(item).await.map(Some)
    }

    async fn process(&mut self, item: QueueItem) -> Result<ItemOutcome> {
        let record = &item.data.record;

        let Some(confirmation) = self.prompter.confirm(record)? else {
            self.queue.discard(&item.id).await?;
            info!(id = %item.id, title = %record.title, "Import discarded");
            return Ok(ItemOutcome::Discarded);
        };

        let candidate = record.to_new_entry().with_tags(confirmation.tags);
        let placed = self
            .shelf
            .place(candidate, confirmation.category, &mut self.prompter);

        match placed {
            Ok(Some(entry)) => {
                self.queue.complete(&item.id, entry.id).await?;
                info!(id = %item.id, entry = %entry.id, category = %entry.category, position = entry.position, "Import placed");
                Ok(ItemOutcome::Inserted(entry))
            }
            Ok(None) => Ok(ItemOutcome::Paused),
            Err(ShelfError::Duplicate { title, author }) => {
                // Added by hand since the export was read
                warn!(id = %item.id, %title, %author, "Already on the shelf, discarding");
                self.queue.discard(&item.id).await?;
                Ok(ItemOutcome::Discarded)
            }
            Err(e) => Err(e.into()),
        }
    }
}
