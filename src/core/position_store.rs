//! SQLite-backed store that keeps every category densely positioned.
//!
//! Within a category, positions are always exactly `0..n`. Every mutation
//! runs in one IMMEDIATE transaction that shifts the affected neighbours,
//! bumps the category version and re-checks density before committing, so a
//! reader never sees a half-shifted category.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use tracing::{debug, info};

use super::error::{ShelfError, ShelfResult};
use crate::domain::{Category, Entry, EntryId, NewEntry, Shelves, Tags};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS books (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    title TEXT NOT NULL,
    author TEXT NOT NULL,
    isbn TEXT,
    category TEXT NOT NULL,
    position INTEGER NOT NULL,
    tags TEXT NOT NULL DEFAULT '',
    added_at TEXT NOT NULL
);
CREATE UNIQUE INDEX IF NOT EXISTS books_identity ON books (title, author);
CREATE INDEX IF NOT EXISTS books_category_position ON books (category, position);
CREATE TABLE IF NOT EXISTS category_versions (
    category TEXT PRIMARY KEY,
    version INTEGER NOT NULL
);
";

const SELECT_ENTRY: &str =
    "SELECT id, title, author, isbn, category, position, tags, added_at FROM books";

impl ToSql for Category {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Category {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: anyhow::Error| FromSqlError::Other(e.into()))
    }
}

/// Peers of a candidate as read at one version of the category
#[derive(Debug, Clone)]
pub struct PeerSnapshot {
    pub category: Category,
    pub version: u64,
    /// Ordered by ascending position, exact duplicates of the candidate removed
    pub peers: Vec<Entry>,
}

/// Dense per-category position store
pub struct PositionStore {
    conn: Connection,
}

impl PositionStore {
    /// Open (or create) the store at the given path
    pub fn open(path: &Path) -> ShelfResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    /// Open a throwaway in-memory store
    pub fn open_in_memory() -> ShelfResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> ShelfResult<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Every entry, grouped by category and ordered by position
    pub fn list_all(&self) -> ShelfResult<Shelves> {
        let mut stmt = self
            .conn
            .prepare(&format!("{} ORDER BY category, position", SELECT_ENTRY))?;
        let entries = stmt
            .query_map([], row_to_entry)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Shelves::from_entries(entries))
    }

    /// Entries of one category, ordered by position
    pub fn entries_in(&self, category: Category) -> ShelfResult<Vec<Entry>> {
        entries_in(&self.conn, category)
    }

    pub fn get(&self, id: EntryId) -> ShelfResult<Entry> {
        get_entry(&self.conn, id)?.ok_or(ShelfError::NotFound(id))
    }

    pub fn count(&self, category: Category) -> ShelfResult<usize> {
        count_in(&self.conn, category)
    }

    /// Current version of a category (bumped by every position mutation)
    pub fn version(&self, category: Category) -> ShelfResult<u64> {
        read_version(&self.conn, category)
    }

    pub fn contains_book(&self, title: &str, author: &str) -> ShelfResult<bool> {
        contains_book(&self.conn, title, author)
    }

    /// Read the peers of a candidate and the version they belong to, consistently
    pub fn peers(&self, category: Category, candidate: &NewEntry) -> ShelfResult<PeerSnapshot> {
        let tx = self.conn.unchecked_transaction()?;
        let version = read_version(&tx, category)?;
        let peers = entries_in(&tx, category)?
            .into_iter()
            .filter(|e| !e.same_book(&candidate.title, &candidate.author))
            .collect();
        tx.commit()?;

        Ok(PeerSnapshot {
            category,
            version,
            peers,
        })
    }

    /// Insert at `position`, shifting everything at or after it up by one
    pub fn insert_at(
        &mut self,
        category: Category,
        position: usize,
        entry: &NewEntry,
    ) -> ShelfResult<Entry> {
        self.insert(category, Some(position), entry, None)
    }

    /// Like `insert_at`, but fails with `StaleSnapshot` if the category moved past `expected_version`
    pub fn insert_at_version(
        &mut self,
        category: Category,
        position: usize,
        entry: &NewEntry,
        expected_version: u64,
    ) -> ShelfResult<Entry> {
        self.insert(category, Some(position), entry, Some(expected_version))
    }

    /// Insert after the last entry of the category
    pub fn append(&mut self, category: Category, entry: &NewEntry) -> ShelfResult<Entry> {
        self.insert(category, None, entry, None)
    }

    fn insert(
        &mut self,
        category: Category,
        position: Option<usize>,
        entry: &NewEntry,
        expected_version: Option<u64>,
    ) -> ShelfResult<Entry> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        if let Some(expected) = expected_version {
            let found = read_version(&tx, category)?;
            if found != expected {
                return Err(ShelfError::StaleSnapshot {
                    category,
                    expected,
                    found,
                });
            }
        }

        if contains_book(&tx, &entry.title, &entry.author)? {
            return Err(ShelfError::Duplicate {
                title: entry.title.clone(),
                author: entry.author.clone(),
            });
        }

        let count = count_in(&tx, category)?;
        let position = position.unwrap_or(count);
        if position > count {
            return Err(ShelfError::InvalidPosition {
                category,
                position,
                count,
            });
        }

        let shifted = tx.execute(
            "UPDATE books SET position = position + 1 WHERE category = ?1 AND position >= ?2",
            params![category, position as i64],
        )?;

        let added_at = Utc::now();
        tx.execute(
            "INSERT INTO books (title, author, isbn, category, position, tags, added_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                entry.title,
                entry.author,
                entry.isbn,
                category,
                position as i64,
                entry.tags.to_stored(),
                added_at.to_rfc3339(),
            ],
        )?;
        let id = EntryId(tx.last_insert_rowid());

        bump_version(&tx, category)?;
        verify_density(&tx, category)?;
        tx.commit()?;

        info!(%id, %category, position, shifted, "Inserted entry");

        Ok(Entry {
            id,
            title: entry.title.clone(),
            author: entry.author.clone(),
            isbn: entry.isbn.clone(),
            category,
            position,
            tags: entry.tags.clone(),
            added_at,
        })
    }

    /// Remove the entry at `position`, shifting everything after it down by one
    pub fn delete_at(&mut self, category: Category, position: usize) -> ShelfResult<Entry> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let entry = tx
            .query_row(
                &format!("{} WHERE category = ?1 AND position = ?2", SELECT_ENTRY),
                params![category, position as i64],
                row_to_entry,
            )
            .optional()?;

        let Some(entry) = entry else {
            let count = count_in(&tx, category)?;
            return Err(ShelfError::InvalidPosition {
                category,
                position,
                count,
            });
        };

        remove_and_close_gap(&tx, &entry)?;
        tx.commit()?;

        info!(id = %entry.id, %category, position, "Deleted entry");
        Ok(entry)
    }

    /// Remove an entry by id
    pub fn delete(&mut self, id: EntryId) -> ShelfResult<Entry> {
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        let entry = get_entry(&tx, id)?.ok_or(ShelfError::NotFound(id))?;
        remove_and_close_gap(&tx, &entry)?;
        tx.commit()?;

        info!(%id, category = %entry.category, position = entry.position, "Deleted entry");
        Ok(entry)
    }

    /// Replace an entry's tags; positions are untouched
    pub fn update_tags(&mut self, id: EntryId, tags: &Tags) -> ShelfResult<()> {
        let changed = self.conn.execute(
            "UPDATE books SET tags = ?1 WHERE id = ?2",
            params![tags.to_stored(), id.0],
        )?;

        if changed == 0 {
            return Err(ShelfError::NotFound(id));
        }

        debug!(%id, %tags, "Updated tags");
        Ok(())
    }

    pub(crate) fn conn_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }
}

fn remove_and_close_gap(conn: &Connection, entry: &Entry) -> ShelfResult<()> {
    conn.execute("DELETE FROM books WHERE id = ?1", params![entry.id.0])?;
    conn.execute(
        "UPDATE books SET position = position - 1 WHERE category = ?1 AND position > ?2",
        params![entry.category, entry.position as i64],
    )?;
    bump_version(conn, entry.category)?;
    verify_density(conn, entry.category)
}

fn row_to_entry(row: &Row<'_>) -> rusqlite::Result<Entry> {
    let position: i64 = row.get(5)?;
    let tags: String = row.get(6)?;
    let added_at: String = row.get(7)?;
    let added_at = DateTime::parse_from_rfc3339(&added_at)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(7, rusqlite::types::Type::Text, Box::new(e)))?;

    Ok(Entry {
        id: EntryId(row.get(0)?),
        title: row.get(1)?,
        author: row.get(2)?,
        isbn: row.get(3)?,
        category: row.get(4)?,
        position: position as usize,
        tags: Tags::parse(&tags),
        added_at,
    })
}

pub(crate) fn entries_in(conn: &Connection, category: Category) -> ShelfResult<Vec<Entry>> {
    let mut stmt = conn.prepare(&format!(
        "{} WHERE category = ?1 ORDER BY position",
        SELECT_ENTRY
    ))?;
    let entries = stmt
        .query_map(params![category], row_to_entry)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(entries)
}

fn get_entry(conn: &Connection, id: EntryId) -> ShelfResult<Option<Entry>> {
    Ok(conn
        .query_row(
            &format!("{} WHERE id = ?1", SELECT_ENTRY),
            params![id.0],
            row_to_entry,
        )
        .optional()?)
}

fn contains_book(conn: &Connection, title: &str, author: &str) -> ShelfResult<bool> {
    Ok(conn
        .query_row(
            "SELECT 1 FROM books WHERE title = ?1 AND author = ?2",
            params![title, author],
            |_| Ok(()),
        )
        .optional()?
        .is_some())
}

pub(crate) fn count_in(conn: &Connection, category: Category) -> ShelfResult<usize> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM books WHERE category = ?1",
        params![category],
        |row| row.get(0),
    )?;
    Ok(count as usize)
}

pub(crate) fn read_version(conn: &Connection, category: Category) -> ShelfResult<u64> {
    let version: Option<i64> = conn
        .query_row(
            "SELECT version FROM category_versions WHERE category = ?1",
            params![category],
            |row| row.get(0),
        )
        .optional()?;
    Ok(version.unwrap_or(0) as u64)
}

pub(crate) fn bump_version(conn: &Connection, category: Category) -> ShelfResult<()> {
    conn.execute(
        "INSERT INTO category_versions (category, version) VALUES (?1, 1)
         ON CONFLICT (category) DO UPDATE SET version = version + 1",
        params![category],
    )?;
    Ok(())
}

/// Fails unless the category's positions are exactly `0..n`
pub(crate) fn verify_density(conn: &Connection, category: Category) -> ShelfResult<()> {
    let (count, distinct, min, max): (i64, i64, Option<i64>, Option<i64>) = conn.query_row(
        "SELECT COUNT(*), COUNT(DISTINCT position), MIN(position), MAX(position)
         FROM books WHERE category = ?1",
        params![category],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?)),
    )?;

    if count == 0 {
        return Ok(());
    }

    if distinct != count || min != Some(0) || max != Some(count - 1) {
        return Err(ShelfError::InvariantViolation {
            category,
            detail: format!(
                "{count} entries, {distinct} distinct positions, range {min:?}..={max:?}"
            ),
        });
    }

    Ok(())
}
