//! Whole-category reordering applied as one batch.
//!
//! The caller submits a full permutation (every id of the category, positions
//! exactly `0..n`). It is checked against the live category inside the same
//! transaction that writes it; anything partial or malformed is refused with
//! nothing written.

use std::collections::{BTreeSet, HashMap};

use rusqlite::{params, TransactionBehavior};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::error::{ShelfError, ShelfResult};
use super::position_store::{bump_version, entries_in, verify_density, PositionStore};
use crate::domain::{Category, EntryId};

/// New position for one entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Assignment {
    pub id: EntryId,
    pub position: usize,
}

/// Move the item at `from` to `to` within an ordered id list and return the
/// resulting full permutation.
pub fn move_entry(order: &[EntryId], from: usize, to: usize) -> ShelfResult<Vec<Assignment>> {
    if from >= order.len() || to >= order.len() {
        return Err(ShelfError::InvalidInput(format!(
            "move {} -> {} outside list of {}",
            from,
            to,
            order.len()
        )));
    }

    let mut reordered = order.to_vec();
    let moved = reordered.remove(from);
    reordered.insert(to, moved);

    Ok(reordered
        .into_iter()
        .enumerate()
        .map(|(position, id)| Assignment { id, position })
        .collect())
}

/// Check that `assignments` is a full permutation of `current`
pub fn validate_permutation(current: &[EntryId], assignments: &[Assignment]) -> ShelfResult<()> {
    if assignments.len() != current.len() {
        return Err(ShelfError::InvalidInput(format!(
            "expected {} assignments, got {}",
            current.len(),
            assignments.len()
        )));
    }

    let expected: BTreeSet<EntryId> = current.iter().copied().collect();
    let submitted: BTreeSet<EntryId> = assignments.iter().map(|a| a.id).collect();
    if submitted != expected {
        let unknown: Vec<String> = submitted.difference(&expected).map(|id| id.to_string()).collect();
        let missing: Vec<String> = expected.difference(&submitted).map(|id| id.to_string()).collect();
        return Err(ShelfError::InvalidInput(format!(
            "id set mismatch (unknown: [{}], missing: [{}])",
            unknown.join(", "),
            missing.join(", ")
        )));
    }

    let positions: BTreeSet<usize> = assignments.iter().map(|a| a.position).collect();
    if positions.len() != assignments.len() || positions.iter().copied().ne(0..assignments.len()) {
        return Err(ShelfError::InvalidInput(format!(
            "positions must be exactly 0..{}",
            assignments.len()
        )));
    }

    Ok(())
}

impl PositionStore {
    /// Apply a full permutation of one category atomically
    pub fn apply_reorder(
        &mut self,
        category: Category,
        assignments: &[Assignment],
    ) -> ShelfResult<()> {
        let tx = self
            .conn_mut()
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let current: Vec<EntryId> = entries_in(&tx, category)?.iter().map(|e| e.id).collect();
        validate_permutation(&current, assignments)?;

        let old: HashMap<EntryId, usize> = current
            .iter()
            .enumerate()
            .map(|(position, id)| (*id, position))
            .collect();

        let mut moved = 0;
        {
            let mut stmt = tx.prepare("UPDATE books SET position = ?1 WHERE id = ?2")?;
            for assignment in assignments {
                if old.get(&assignment.id) != Some(&assignment.position) {
                    stmt.execute(params![assignment.position as i64, assignment.id.0])?;
                    moved += 1;
                }
            }
        }

        if moved == 0 {
            debug!(%category, "Reorder left category unchanged");
            return Ok(());
        }

        bump_version(&tx, category)?;
        verify_density(&tx, category)?;
        tx.commit()?;

        info!(%category, moved, "Reordered category");
        Ok(())
    }

    /// Drag-and-drop: move the entry at `from` to `to` within a category
    pub fn move_within(&mut self, category: Category, from: usize, to: usize) -> ShelfResult<()> {
        let order: Vec<EntryId> = self.entries_in(category)?.iter().map(|e| e.id).collect();
        if from == to && from < order.len() {
            return Ok(());
        }

        let assignments = move_entry(&order, from, to)?;
        self.apply_reorder(category, &assignments)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::NewEntry;

    fn ids(raw: &[i64]) -> Vec<EntryId> {
        raw.iter().map(|id| EntryId(*id)).collect()
    }

    fn assign(pairs: &[(i64, usize)]) -> Vec<Assignment> {
        pairs
            .iter()
            .map(|(id, position)| Assignment {
                id: EntryId(*id),
                position: *position,
            })
            .collect()
    }

    #[test]
    fn test_move_down() {
        let result = move_entry(&ids(&[10, 20, 30, 40]), 0, 2).unwrap();
        assert_eq!(result, assign(&[(20, 0), (30, 1), (10, 2), (40, 3)]));
    }

    #[test]
    fn test_move_up() {
        let result = move_entry(&ids(&[10, 20, 30]), 2, 0).unwrap();
        assert_eq!(result, assign(&[(30, 0), (10, 1), (20, 2)]));
    }

    #[test]
    fn test_move_out_of_range() {
        assert!(move_entry(&ids(&[1, 2]), 0, 2).is_err());
        assert!(move_entry(&[], 0, 0).is_err());
    }

    #[test]
    fn test_validate_rejects_partial_patch() {
        let err = validate_permutation(&ids(&[1, 2, 3]), &assign(&[(1, 1), (2, 0)])).unwrap_err();
        assert!(matches!(err, ShelfError::InvalidInput(_)));
    }

    #[test]
    fn test_validate_rejects_foreign_id() {
        let err =
            validate_permutation(&ids(&[1, 2]), &assign(&[(1, 0), (9, 1)])).unwrap_err();
        assert!(err.to_string().contains("unknown: [9]"));
    }

    #[test]
    fn test_validate_rejects_gapped_positions() {
        assert!(validate_permutation(&ids(&[1, 2]), &assign(&[(1, 0), (2, 2)])).is_err());
        assert!(validate_permutation(&ids(&[1, 2]), &assign(&[(1, 1), (2, 1)])).is_err());
    }

    #[test]
    fn test_apply_reorder_and_move_within() {
        let mut store = PositionStore::open_in_memory().unwrap();
        let a = store.append(Category::Tbr, &NewEntry::new("A", "x")).unwrap();
        let b = store.append(Category::Tbr, &NewEntry::new("B", "x")).unwrap();
        let c = store.append(Category::Tbr, &NewEntry::new("C", "x")).unwrap();

        store
            .apply_reorder(
                Category::Tbr,
                &[
                    Assignment { id: c.id, position: 0 },
                    Assignment { id: a.id, position: 1 },
                    Assignment { id: b.id, position: 2 },
                ],
            )
            .unwrap();

        store.move_within(Category::Tbr, 0, 2).unwrap();
        let order: Vec<_> = store
            .entries_in(Category::Tbr)
            .unwrap()
            .into_iter()
            .map(|e| e.title)
            .collect();
        assert_eq!(order, vec!["A", "B", "C"]);
    }
}
