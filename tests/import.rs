//! Import Integration Tests
//!
//! CSV export → dedup → queue → processor, against on-disk state.

use booki::core::{Judge, PositionStore, Shelf, ShelfResult};
use booki::domain::{Category, Entry, NewEntry, Tags};
use booki::ingest::{
    dedup_against, parse_export, Confirmation, EnqueueResult, ImportProcessor, ImportQueue,
    ImportRecord, ImportStatus, Prompter,
};
use tempfile::TempDir;

const EXPORT: &str = "\
Book Id,Title,Author,Author l-f,My Rating,Exclusive Shelf,Read Count
1,Dune,Frank Herbert,\"Herbert, Frank\",5,read,3
2,\"Good Omens: The Nice and Accurate Prophecies\",\"Pratchett, Terry\",,4,read,1
3,Foundation,Isaac Asimov,\"Asimov, Isaac\",4,read,1
4,Neuromancer,William Gibson,\"Gibson, William\",0,to-read,0
5,Twilight,Stephenie Meyer,\"Meyer, Stephenie\",1,read,1
6,Ulysses,James Joyce,\"Joyce, James\",0,currently-reading,0
7,Dune,Frank Herbert,\"Herbert, Frank\",5,read,1
";

/// Accepts inferred categories; prefers shorter titles
#[derive(Default)]
struct Agreeable {
    discard: Vec<&'static str>,
    abandon_after: Option<usize>,
    judged: usize,
    log: Vec<String>,
}

impl Judge for Agreeable {
    fn judge(&mut self, candidate: &NewEntry, subject: &Entry) -> ShelfResult<Option<bool>> {
        if self.abandon_after == Some(self.judged) {
            return Ok(None);
        }
        self.judged += 1;
        Ok(Some(candidate.title.len() < subject.title.len()))
    }
}

impl Prompter for Agreeable {
    fn confirm(&mut self, record: &ImportRecord) -> ShelfResult<Option<Confirmation>> {
        self.log.push(record.title.clone());
        if self.discard.contains(&record.title.as_str()) {
            return Ok(None);
        }
        Ok(Some(Confirmation {
            category: record.category,
            tags: Tags::parse("imported"),
        }))
    }
}

fn setup() -> (TempDir, Shelf, ImportQueue) {
    let temp = TempDir::new().unwrap();
    let store = PositionStore::open(&temp.path().join("booki.db")).unwrap();
    let queue = ImportQueue::new(temp.path().join("import_queue.jsonl"));
    (temp, Shelf::new(store), queue)
}

#[tokio::test]
async fn test_full_import() {
    let (_temp, mut shelf, queue) = setup();

    let mut report = parse_export(EXPORT.as_bytes(), b',').unwrap();
    assert_eq!(report.skipped_uncategorized, 1);
    dedup_against(&mut report, &shelf.store().list_all().unwrap());
    assert_eq!(report.skipped_duplicates, 1);
    assert_eq!(report.records.len(), 5);

    let results = queue.enqueue_all(&report.records).await.unwrap();
    assert!(results.iter().all(|r| r.is_new()));

    let mut prompter = Agreeable {
        discard: vec!["Twilight"],
        ..Default::default()
    };
    let summary = ImportProcessor::new(&mut shelf, &queue, &mut prompter)
        .run()
        .await
        .unwrap();
    assert_eq!(summary.inserted, 4);
    assert_eq!(summary.discarded, 1);

    // Processed in file order
    assert_eq!(
        prompter.log,
        vec![
            "Dune",
            "Good Omens: The Nice and Accurate Prophecies",
            "Foundation",
            "Neuromancer",
            "Twilight"
        ]
    );

    let shelves = shelf.store().list_all().unwrap();
    let liked: Vec<_> = shelves
        .get(Category::LikedIt)
        .iter()
        .map(|e| e.title.as_str())
        .collect();
    assert_eq!(
        liked,
        vec!["Dune", "Foundation", "Good Omens: The Nice and Accurate Prophecies"]
    );
    assert_eq!(shelves.get(Category::Tbr)[0].title, "Neuromancer");
    assert!(shelves.get(Category::DidntLikeIt).is_empty());
    assert!(shelves.entries().all(|e| e.tags.contains("imported")));
}

#[tokio::test]
async fn test_reimport_is_idempotent() {
    let (_temp, mut shelf, queue) = setup();

    let mut report = parse_export(EXPORT.as_bytes(), b',').unwrap();
    dedup_against(&mut report, &shelf.store().list_all().unwrap());
    queue.enqueue_all(&report.records).await.unwrap();
    ImportProcessor::new(&mut shelf, &queue, Agreeable::default())
        .run()
        .await
        .unwrap();

    let mut again = parse_export(EXPORT.as_bytes(), b',').unwrap();
    dedup_against(&mut again, &shelf.store().list_all().unwrap());
    assert!(again.records.is_empty());
    assert_eq!(again.skipped_duplicates, 6);
}

#[tokio::test]
async fn test_deleted_book_can_be_imported_again() {
    let (_temp, mut shelf, queue) = setup();

    let mut report = parse_export(EXPORT.as_bytes(), b',').unwrap();
    dedup_against(&mut report, &shelf.store().list_all().unwrap());
    queue.enqueue_all(&report.records).await.unwrap();
    ImportProcessor::new(&mut shelf, &queue, Agreeable::default())
        .run()
        .await
        .unwrap();

    let dune = shelf
        .store()
        .list_all()
        .unwrap()
        .entries()
        .find(|e| e.title == "Dune")
        .cloned()
        .unwrap();
    shelf.store_mut().delete(dune.id).unwrap();

    let mut again = parse_export(EXPORT.as_bytes(), b',').unwrap();
    dedup_against(&mut again, &shelf.store().list_all().unwrap());
    assert_eq!(again.records.len(), 1);

    let results = queue.enqueue_all(&again.records).await.unwrap();
    assert!(matches!(results.as_slice(), [EnqueueResult::Requeued(_)]));

    let next = queue.begin_next().await.unwrap().unwrap();
    assert_eq!(next.data.record.title, "Dune");
    assert_eq!(next.entry_id, None);

    let summary = ImportProcessor::new(&mut shelf, &queue, Agreeable::default())
        .run()
        .await
        .unwrap();
    assert_eq!(summary.inserted, 1);
    assert!(shelf.store().contains_book("Dune", "Frank Herbert").unwrap());
    assert!(queue.status().await.unwrap().is_idle());
}

#[tokio::test]
async fn test_pause_keeps_one_item_in_flight() {
    let (temp, mut shelf, queue) = setup();

    let mut report = parse_export(EXPORT.as_bytes(), b',').unwrap();
    dedup_against(&mut report, &shelf.store().list_all().unwrap());
    queue.enqueue_all(&report.records).await.unwrap();

    // Dune needs no comparison; the first question about Good Omens stops the run
    let prompter = Agreeable {
        abandon_after: Some(0),
        ..Default::default()
    };
    let summary = ImportProcessor::new(&mut shelf, &queue, prompter)
        .run()
        .await
        .unwrap();
    assert!(summary.paused);
    assert_eq!(summary.inserted, 1);

    let reopened = ImportQueue::new(temp.path().join("import_queue.jsonl"));
    let status = reopened.status().await.unwrap();
    let current = status.current.unwrap();
    assert_eq!(current.status, ImportStatus::Current);
    assert_eq!(current.data.record.author, "Pratchett, Terry");
    assert_eq!(status.pending, 3);
    assert!(reopened.begin_next().await.is_err());
}
