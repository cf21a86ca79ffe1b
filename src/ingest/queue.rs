//! JSONL-based import queue.
//!
//! Append-only log with state derived from replay. Items are processed in
//! enqueue order, strictly one at a time: at most one item is `Current`, and
//! `begin_next` refuses to hand out another until it is completed or
//! discarded.

use std::collections::HashMap;
use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use anyhow::Result;
use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::fs;
use uuid::Uuid;

use super::csv_import::ImportRecord;
use crate::domain::EntryId;

/// Errors that can occur with the import queue
#[derive(Debug, Error)]
pub enum ImportQueueError {
    #[error("Queue item not found: {0}")]
    NotFound(String),

    #[error("Item {0} is still in progress; complete or discard it first")]
    InFlight(String),

    #[error("Invalid state transition for {id}: {from:?} → {to:?}")]
    InvalidTransition {
        id: String,
        from: ImportStatus,
        to: ImportStatus,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Lifecycle of a queued import
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportStatus {
    /// Waiting its turn
    Pending,

    /// Being confirmed/compared right now
    Current,

    /// Placed on the shelf
    Done,

    /// Dropped by the user
    Discarded,
}

/// An event in the queue log (append-only)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueEvent {
    pub timestamp: DateTime<Utc>,

    pub item_id: String,

    pub event_type: QueueEventType,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueEventType {
    Enqueued,
    Started,
    Completed,
    Discarded,
    /// A finished item was imported again
    Requeued,
}

/// Payload of an `Enqueued` event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueItemData {
    pub record: ImportRecord,

    /// Import run that queued the item
    pub batch: Uuid,

    /// Position in the overall FIFO order
    pub sequence: u64,
}

/// A queue item with current state (derived from replaying events)
#[derive(Debug, Clone)]
pub struct QueueItem {
    /// SHA256(title \0 author), 12 hex chars
    pub id: String,

    pub status: ImportStatus,

    pub data: QueueItemData,

    pub started_at: Option<DateTime<Utc>>,

    pub finished_at: Option<DateTime<Utc>>,

    /// Entry created when the item completed
    pub entry_id: Option<EntryId>,
}

/// Result of enqueueing one record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnqueueResult {
    Queued(String),
    AlreadyQueued(String),
    /// A finished (placed or discarded) item queued again
    Requeued(String),
}

impl EnqueueResult {
    pub fn id(&self) -> &str {
        match self {
            Self::Queued(id)
            | Self::AlreadyQueued(id)
            | Self::Requeued(id) => id,
        }
    }

    /// Whether the record is now waiting in the queue because of this call
    pub fn is_new(&self) -> bool {
        matches!(self, Self::Queued(_) | Self::Requeued(_))
    }
}

/// Queue status summary
#[derive(Debug, Clone, Default)]
pub struct QueueStatus {
    pub pending: usize,
    pub current: Option<QueueItem>,
    pub done: usize,
    pub discarded: usize,
}

impl QueueStatus {
    pub fn is_idle(&self) -> bool {
        self.pending == 0 && self.current.is_none()
    }
}

/// JSONL-based import queue
pub struct ImportQueue {
    queue_path: PathBuf,
}

impl ImportQueue {
    pub fn new(queue_path: PathBuf) -> Self {
        Self { queue_path }
    }

    /// Open the configured queue, creating its directory
    pub async fn open_default() -> Result<Self> {
        let path = crate::config::import_queue_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        Ok(Self::new(path))
    }

    pub fn path(&self) -> &Path {
        &self.queue_path
    }

    /// Open the log and take the exclusive lock, then replay it.
    ///
    /// Every read-check-append sequence runs on the returned guard, so two
    /// processes can never both act on the same snapshot.
    fn lock(&self) -> Result<LockedLog, ImportQueueError> {
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .append(true)
            .open(&self.queue_path)?;

        file.lock_exclusive()?;
        let items = read_items(&file)?;

        Ok(LockedLog { file, items })
    }

    fn event(
        item_id: &str,
        event_type: QueueEventType,
        data: Option<serde_json::Value>,
    ) -> QueueEvent {
        QueueEvent {
            timestamp: Utc::now(),
            item_id: item_id.to_string(),
            event_type,
            data,
        }
    }

    /// Replay all events to build current state
    pub async fn replay(&self) -> Result<HashMap<String, QueueItem>, ImportQueueError> {
        if !self.queue_path.exists() {
            return Ok(HashMap::new());
        }

        let file = std::fs::File::open(&self.queue_path)?;

        // Shared lock: never read a half-written line
        file.lock_shared()?;
        read_items(&file)
    }

    fn apply_event(items: &mut HashMap<String, QueueItem>, event: QueueEvent) {
        match event.event_type {
            QueueEventType::Enqueued => {
                if let Some(data) = event.data {
                    if let Ok(item_data) = serde_json::from_value::<QueueItemData>(data) {
                        items.insert(
                            event.item_id.clone(),
                            QueueItem {
                                id: event.item_id,
                                status: ImportStatus::Pending,
                                data: item_data,
                                started_at: None,
                                finished_at: None,
                                entry_id: None,
                            },
                        );
                    }
                }
            }
            QueueEventType::Started => {
                if let Some(item) = items.get_mut(&event.item_id) {
                    item.status = ImportStatus::Current;
                    item.started_at = Some(event.timestamp);
                }
            }
            QueueEventType::Completed => {
                if let Some(item) = items.get_mut(&event.item_id) {
                    item.status = ImportStatus::Done;
                    item.finished_at = Some(event.timestamp);
                    item.entry_id = event
                        .data
                        .as_ref()
                        .and_then(|d| d.get("entry_id"))
                        .and_then(|id| id.as_i64())
                        .map(EntryId);
                }
            }
            QueueEventType::Discarded => {
                if let Some(item) = items.get_mut(&event.item_id) {
                    item.status = ImportStatus::Discarded;
                    item.finished_at = Some(event.timestamp);
                }
            }
            QueueEventType::Requeued => {
                if let Some(item) = items.get_mut(&event.item_id) {
                    item.status = ImportStatus::Pending;
                    item.started_at = None;
                    item.finished_at = None;
                    item.entry_id = None;

                    let data = event.data.as_ref();
                    if let Some(sequence) = data
                        .and_then(|d| d.get("sequence"))
                        .and_then(|s| s.as_u64())
                    {
                        item.data.sequence = sequence;
                    }
                    if let Some(record) = data
                        .and_then(|d| d.get("record"))
                        .and_then(|r| serde_json::from_value::<ImportRecord>(r.clone()).ok())
                    {
                        item.data.record = record;
                    }
                }
            }
        }
    }

    /// Enqueue one record (idempotent per title/author)
    pub async fn enqueue(
        &self,
        record: &ImportRecord,
        batch: Uuid,
    ) -> Result<EnqueueResult, ImportQueueError> {
        let mut log = self.lock()?;
        log.enqueue(record, batch)
    }

    /// Enqueue a batch in order; returns the per-record results
    pub async fn enqueue_all(
        &self,
        records: &[ImportRecord],
    ) -> Result<Vec<EnqueueResult>, ImportQueueError> {
        let batch = Uuid::new_v4();
        let mut log = self.lock()?;

        records
            .iter()
            .map(|record| log.enqueue(record, batch))
            .collect()
    }

    /// Pending items in FIFO order
    pub async fn pending(&self) -> Result<Vec<QueueItem>, ImportQueueError> {
        let items = self.replay().await?;
        let mut pending: Vec<QueueItem> = items
            .into_values()
            .filter(|item| item.status == ImportStatus::Pending)
            .collect();
        pending.sort_by_key(|item| item.data.sequence);
        Ok(pending)
    }

    /// The item currently in flight, if any
    pub async fn current(&self) -> Result<Option<QueueItem>, ImportQueueError> {
        let items = self.replay().await?;
        Ok(items
            .into_values()
            .find(|item| item.status == ImportStatus::Current))
    }

    /// Make the oldest pending item current.
    ///
    /// Fails with `InFlight` while another item is current.
    pub async fn begin_next(&self) -> Result<Option<QueueItem>, ImportQueueError> {
        let mut log = self.lock()?;

        if let Some(current) = log.items.values().find(|i| i.status == ImportStatus::Current) {
            return Err(ImportQueueError::InFlight(current.id.clone()));
        }

        let next = log
            .items
            .values()
            .filter(|item| item.status == ImportStatus::Pending)
            .min_by_key(|item| item.data.sequence)
            .map(|item| item.id.clone());

        let Some(id) = next else {
            return Ok(None);
        };

        log.append(Self::event(&id, QueueEventType::Started, None))?;
        Ok(log.items.get(&id).cloned())
    }

    /// Mark the current item as placed on the shelf
    pub async fn complete(&self, id: &str, entry_id: EntryId) -> Result<(), ImportQueueError> {
        let mut log = self.lock()?;
        log.require_current(id, ImportStatus::Done)?;

        let data = serde_json::json!({ "entry_id": entry_id.0 });
        log.append(Self::event(id, QueueEventType::Completed, Some(data)))
    }

    /// Drop the current item
    pub async fn discard(&self, id: &str) -> Result<(), ImportQueueError> {
        let mut log = self.lock()?;
        log.require_current(id, ImportStatus::Discarded)?;
        log.append(Self::event(id, QueueEventType::Discarded, None))
    }

    /// Get queue status summary
    pub async fn status(&self) -> Result<QueueStatus, ImportQueueError> {
        let items = self.replay().await?;

        let mut status = QueueStatus::default();
        for item in items.into_values() {
            match item.status {
                ImportStatus::Pending => status.pending += 1,
                ImportStatus::Current => status.current = Some(item),
                ImportStatus::Done => status.done += 1,
                ImportStatus::Discarded => status.discarded += 1,
            }
        }

        Ok(status)
    }

    pub async fn get(&self, id: &str) -> Result<Option<QueueItem>, ImportQueueError> {
        let items = self.replay().await?;
        Ok(items.get(id).cloned())
    }
}

/// The queue log with the exclusive lock held (released on drop)
struct LockedLog {
    file: std::fs::File,
    items: HashMap<String, QueueItem>,
}

impl LockedLog {
    /// Append one event and fold it into the in-memory state
    fn append(&mut self, event: QueueEvent) -> Result<(), ImportQueueError> {
        let json = serde_json::to_string(&event)?;
        writeln!(self.file, "{}", json)?;
        self.file.flush()?;

        ImportQueue::apply_event(&mut self.items, event);
        Ok(())
    }

    fn enqueue(
        &mut self,
        record: &ImportRecord,
        batch: Uuid,
    ) -> Result<EnqueueResult, ImportQueueError> {
        let id = item_id(&record.title, &record.author);
        let sequence = next_sequence(&self.items);

        match self.items.get(&id).map(|item| item.status) {
            Some(ImportStatus::Pending | ImportStatus::Current) => {
                Ok(EnqueueResult::AlreadyQueued(id))
            }
            // Finished items come back; whether the book is still on the
            // shelf is for the caller's dedup to decide
            Some(ImportStatus::Done | ImportStatus::Discarded) => {
                let data = serde_json::json!({ "sequence": sequence, "record": record });
                self.append(ImportQueue::event(&id, QueueEventType::Requeued, Some(data)))?;
                Ok(EnqueueResult::Requeued(id))
            }
            None => {
                let data = QueueItemData {
                    record: record.clone(),
                    batch,
                    sequence,
                };
                self.append(ImportQueue::event(
                    &id,
                    QueueEventType::Enqueued,
                    Some(serde_json::to_value(&data)?),
                ))?;
                Ok(EnqueueResult::Queued(id))
            }
        }
    }

    fn require_current(&self, id: &str, to: ImportStatus) -> Result<(), ImportQueueError> {
        let item = self
            .items
            .get(id)
            .ok_or_else(|| ImportQueueError::NotFound(id.to_string()))?;

        if item.status != ImportStatus::Current {
            return Err(ImportQueueError::InvalidTransition {
                id: id.to_string(),
                from: item.status,
                to,
            });
        }
        Ok(())
    }
}

/// Replay every line of a (locked) log file
fn read_items(file: &std::fs::File) -> Result<HashMap<String, QueueItem>, ImportQueueError> {
    let mut items = HashMap::new();

    for line in BufReader::new(file).lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }

        let event: QueueEvent = serde_json::from_str(&line)?;
        ImportQueue::apply_event(&mut items, event);
    }

    Ok(items)
}

fn next_sequence(items: &HashMap<String, QueueItem>) -> u64 {
    items
        .values()
        .map(|item| item.data.sequence + 1)
        .max()
        .unwrap_or(0)
}

/// Queue id for a book: SHA256 of `title \0 author`, first 12 hex chars
pub fn item_id(title: &str, author: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(title.as_bytes());
    hasher.update([0u8]);
    hasher.update(author.as_bytes());
    let digest = hasher.finalize();

    hex::encode(&digest[..6])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Category;
    use tempfile::TempDir;

    fn create_test_queue() -> (ImportQueue, TempDir) {
        let temp = TempDir::new().unwrap();
        let queue_path = temp.path().join("import_queue.jsonl");
        (ImportQueue::new(queue_path), temp)
    }

    fn record(title: &str) -> ImportRecord {
        ImportRecord {
            title: title.to_string(),
            author: "Anon".to_string(),
            rating: 5,
            shelf: "read".to_string(),
            read_count: 1,
            category: Category::LikedIt,
        }
    }

    #[test]
    fn test_item_id_shape() {
        let id = item_id("Dune", "Frank Herbert");
        assert_eq!(id.len(), 12);
        assert_eq!(id, item_id("Dune", "Frank Herbert"));
        assert_ne!(item_id("ab", "c"), item_id("a", "bc"));
    }

    #[tokio::test]
    async fn test_idempotent_enqueue() {
        let (queue, _temp) = create_test_queue();

        let first = queue.enqueue(&record("A"), Uuid::new_v4()).await.unwrap();
        let second = queue.enqueue(&record("A"), Uuid::new_v4()).await.unwrap();

        assert!(first.is_new());
        assert_eq!(second, EnqueueResult::AlreadyQueued(first.id().to_string()));
        assert_eq!(queue.status().await.unwrap().pending, 1);
    }

    #[tokio::test]
    async fn test_fifo_and_single_in_flight() {
        let (queue, _temp) = create_test_queue();
        queue
            .enqueue_all(&[record("A"), record("B"), record("C")])
            .await
            .unwrap();

        let a = queue.begin_next().await.unwrap().unwrap();
        assert_eq!(a.data.record.title, "A");
        assert_eq!(a.status, ImportStatus::Current);

        let err = queue.begin_next().await.unwrap_err();
        assert!(matches!(err, ImportQueueError::InFlight(ref id) if *id == a.id));

        queue.complete(&a.id, EntryId(7)).await.unwrap();
        let b = queue.begin_next().await.unwrap().unwrap();
        assert_eq!(b.data.record.title, "B");

        queue.discard(&b.id).await.unwrap();
        let c = queue.begin_next().await.unwrap().unwrap();
        assert_eq!(c.data.record.title, "C");

        let done = queue.get(&a.id).await.unwrap().unwrap();
        assert_eq!(done.status, ImportStatus::Done);
        assert_eq!(done.entry_id, Some(EntryId(7)));
    }

    #[tokio::test]
    async fn test_complete_requires_current() {
        let (queue, _temp) = create_test_queue();
        let id = queue.enqueue(&record("A"), Uuid::new_v4()).await.unwrap().id().to_string();

        let err = queue.complete(&id, EntryId(1)).await.unwrap_err();
        assert!(matches!(
            err,
            ImportQueueError::InvalidTransition {
                from: ImportStatus::Pending,
                to: ImportStatus::Done,
                ..
            }
        ));
        assert!(matches!(
            queue.discard("nope").await.unwrap_err(),
            ImportQueueError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_discarded_item_requeues_at_the_back() {
        let (queue, _temp) = create_test_queue();
        queue.enqueue_all(&[record("A"), record("B")]).await.unwrap();

        let a = queue.begin_next().await.unwrap().unwrap();
        queue.discard(&a.id).await.unwrap();

        let result = queue.enqueue(&record("A"), Uuid::new_v4()).await.unwrap();
        assert!(matches!(result, EnqueueResult::Requeued(_)));

        let order: Vec<_> = queue
            .pending()
            .await
            .unwrap()
            .into_iter()
            .map(|i| i.data.record.title)
            .collect();
        assert_eq!(order, vec!["B", "A"]);
    }

    #[tokio::test]
    async fn test_completed_item_requeues_with_fresh_record() {
        let (queue, _temp) = create_test_queue();
        queue.enqueue(&record("A"), Uuid::new_v4()).await.unwrap();

        let a = queue.begin_next().await.unwrap().unwrap();
        queue.complete(&a.id, EntryId(3)).await.unwrap();

        let mut again = record("A");
        again.rating = 2;
        again.category = Category::ItWasOk;
        let result = queue.enqueue(&again, Uuid::new_v4()).await.unwrap();
        assert_eq!(result, EnqueueResult::Requeued(a.id.clone()));
        assert!(result.is_new());

        let item = queue.get(&a.id).await.unwrap().unwrap();
        assert_eq!(item.status, ImportStatus::Pending);
        assert_eq!(item.entry_id, None);
        assert_eq!(item.data.record.category, Category::ItWasOk);

        let next = queue.begin_next().await.unwrap().unwrap();
        assert_eq!(next.id, a.id);
    }

    #[tokio::test]
    async fn test_enqueue_all_with_repeats_in_one_batch() {
        let (queue, _temp) = create_test_queue();

        let results = queue
            .enqueue_all(&[record("A"), record("B"), record("A")])
            .await
            .unwrap();
        assert!(results[0].is_new());
        assert!(results[1].is_new());
        assert_eq!(results[2], EnqueueResult::AlreadyQueued(results[0].id().to_string()));

        let sequences: Vec<_> = queue
            .pending()
            .await
            .unwrap()
            .into_iter()
            .map(|i| i.data.sequence)
            .collect();
        assert_eq!(sequences, vec![0, 1]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_begin_next_hands_out_one_item() {
        for _ in 0..20 {
            let (queue, _temp) = create_test_queue();
            queue.enqueue_all(&[record("A"), record("B")]).await.unwrap();
            let path = queue.path().to_path_buf();

            let tasks: Vec<_> = (0..2)
                .map(|_| {
                    let path = path.clone();
                    tokio::spawn(async move { ImportQueue::new(path).begin_next().await })
                })
                .collect();

            let mut started = 0;
            let mut in_flight = 0;
            for task in tasks {
                match task.await.unwrap() {
                    Ok(Some(_)) => started += 1,
                    Err(ImportQueueError::InFlight(_)) => in_flight += 1,
                    other => panic!("unexpected result: {:?}", other),
                }
            }
            assert_eq!((started, in_flight), (1, 1));

            let status = queue.status().await.unwrap();
            assert_eq!(status.pending, 1);
            assert_eq!(status.current.unwrap().data.record.title, "A");
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_complete_and_discard_apply_once() {
        for _ in 0..20 {
            let (queue, _temp) = create_test_queue();
            queue.enqueue(&record("A"), Uuid::new_v4()).await.unwrap();
            let a = queue.begin_next().await.unwrap().unwrap();
            let path = queue.path().to_path_buf();

            let completing = {
                let (path, id) = (path.clone(), a.id.clone());
                tokio::spawn(async move { ImportQueue::new(path).complete(&id, EntryId(1)).await })
            };
            let discarding = {
                let (path, id) = (path.clone(), a.id.clone());
                tokio::spawn(async move { ImportQueue::new(path).discard(&id).await })
            };

            let outcomes = [completing.await.unwrap(), discarding.await.unwrap()];
            assert_eq!(outcomes.iter().filter(|r| r.is_ok()).count(), 1);
            assert!(outcomes
                .iter()
                .filter_map(|r| r.as_ref().err())
                .all(|e| matches!(e, ImportQueueError::InvalidTransition { from, .. } if *from != ImportStatus::Current)));
        }
    }

    #[tokio::test]
    async fn test_state_survives_reopen() {
        let (queue, temp) = create_test_queue();
        queue.enqueue_all(&[record("A"), record("B")]).await.unwrap();
        let a = queue.begin_next().await.unwrap().unwrap();

        let reopened = ImportQueue::new(temp.path().join("import_queue.jsonl"));
        let current = reopened.current().await.unwrap().unwrap();
        assert_eq!(current.id, a.id);
        assert_eq!(reopened.status().await.unwrap().pending, 1);
    }
}
