//! Reorder Integration Tests
//!
//! Whole-category permutations are all-or-nothing and interact with
//! in-flight comparison sessions through the category version.

use booki::core::{move_entry, AddStep, Assignment, PositionStore, Shelf, ShelfError};
use booki::domain::{Category, EntryId, NewEntry};

fn seeded(titles: &[&str]) -> (PositionStore, Vec<EntryId>) {
    let mut store = PositionStore::open_in_memory().unwrap();
    let ids = titles
        .iter()
        .map(|t| store.append(Category::LikedIt, &NewEntry::new(*t, "x")).unwrap().id)
        .collect();
    (store, ids)
}

fn titles(store: &PositionStore) -> Vec<String> {
    store
        .entries_in(Category::LikedIt)
        .unwrap()
        .into_iter()
        .map(|e| e.title)
        .collect()
}

#[test]
fn test_reverse_permutation() {
    let (mut store, ids) = seeded(&["A", "B", "C", "D"]);
    let assignments: Vec<_> = ids
        .iter()
        .rev()
        .enumerate()
        .map(|(position, id)| Assignment { id: *id, position })
        .collect();

    store.apply_reorder(Category::LikedIt, &assignments).unwrap();
    assert_eq!(titles(&store), vec!["D", "C", "B", "A"]);
}

#[test]
fn test_partial_or_malformed_reorders_write_nothing() {
    let (mut store, ids) = seeded(&["A", "B", "C"]);
    let version = store.version(Category::LikedIt).unwrap();

    let partial = vec![
        Assignment { id: ids[2], position: 0 },
        Assignment { id: ids[0], position: 1 },
    ];
    let duplicate_position = vec![
        Assignment { id: ids[0], position: 0 },
        Assignment { id: ids[1], position: 0 },
        Assignment { id: ids[2], position: 2 },
    ];
    let gap = vec![
        Assignment { id: ids[0], position: 0 },
        Assignment { id: ids[1], position: 1 },
        Assignment { id: ids[2], position: 3 },
    ];
    let foreign = vec![
        Assignment { id: ids[0], position: 0 },
        Assignment { id: ids[1], position: 1 },
        Assignment { id: EntryId(999), position: 2 },
    ];

    for bad in [partial, duplicate_position, gap, foreign] {
        let err = store.apply_reorder(Category::LikedIt, &bad).unwrap_err();
        assert!(matches!(err, ShelfError::InvalidInput(_)), "{:?}", err);
    }

    assert_eq!(titles(&store), vec!["A", "B", "C"]);
    assert_eq!(store.version(Category::LikedIt).unwrap(), version);
}

#[test]
fn test_drag_and_drop() {
    let (mut store, ids) = seeded(&["A", "B", "C", "D", "E"]);

    let assignments = move_entry(&ids, 4, 1).unwrap();
    store.apply_reorder(Category::LikedIt, &assignments).unwrap();
    assert_eq!(titles(&store), vec!["A", "E", "B", "C", "D"]);

    store.move_within(Category::LikedIt, 0, 4).unwrap();
    assert_eq!(titles(&store), vec!["E", "B", "C", "D", "A"]);

    assert!(store.move_within(Category::LikedIt, 0, 5).is_err());
}

#[test]
fn test_reorder_invalidates_open_session() {
    let (store, ids) = seeded(&["A", "B", "C"]);
    let mut shelf = Shelf::new(store);

    let AddStep::Compare { session, .. } = shelf
        .begin_add(NewEntry::new("N", "x"), Category::LikedIt)
        .unwrap()
    else {
        panic!("expected a comparison");
    };

    let assignments = move_entry(&ids, 0, 2).unwrap();
    shelf
        .store_mut()
        .apply_reorder(Category::LikedIt, &assignments)
        .unwrap();

    let err = shelf.record_judgment(session, false).unwrap_err();
    assert!(err.needs_restart());
}

#[test]
fn test_identity_reorder_keeps_sessions_valid() {
    let (store, ids) = seeded(&["A", "B"]);
    let mut shelf = Shelf::new(store);

    let AddStep::Compare { session, .. } = shelf
        .begin_add(NewEntry::new("N", "x"), Category::LikedIt)
        .unwrap()
    else {
        panic!("expected a comparison");
    };

    let unchanged: Vec<_> = ids
        .iter()
        .enumerate()
        .map(|(position, id)| Assignment { id: *id, position })
        .collect();
    shelf
        .store_mut()
        .apply_reorder(Category::LikedIt, &unchanged)
        .unwrap();

    assert!(shelf.record_judgment(session, true).is_ok());
}
