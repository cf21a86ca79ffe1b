//! Reading an external reading-history export (Goodreads-style CSV).
//!
//! Required columns: `Title`, `Author`, `My Rating`, `Exclusive Shelf`.
//! Optional: `Read Count` (defaults to 1). Quoting, escaped quotes and
//! newlines inside quoted fields are handled by the `csv` reader.

use std::collections::HashSet;
use std::io::Read;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::core::{ShelfError, ShelfResult};
use crate::domain::{Category, NewEntry, Shelves};

const TITLE: &str = "Title";
const AUTHOR: &str = "Author";
const RATING: &str = "My Rating";
const SHELF: &str = "Exclusive Shelf";
const READ_COUNT: &str = "Read Count";

/// Shelf name that maps to the to-be-read category
pub const TO_READ_SHELF: &str = "to-read";

/// One usable row of the export
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportRecord {
    pub title: String,
    pub author: String,
    /// 0 means unrated
    pub rating: u8,
    pub shelf: String,
    pub read_count: u32,
    /// Inferred category (confirmed by the user later)
    pub category: Category,
}

impl ImportRecord {
    pub fn to_new_entry(&self) -> NewEntry {
        NewEntry::new(self.title.clone(), self.author.clone())
    }
}

/// Result of parsing and reconciling an export
#[derive(Debug, Clone, Default)]
pub struct ImportReport {
    pub records: Vec<ImportRecord>,
    /// Rows that could not be read or lacked a title/author
    pub skipped_malformed: usize,
    /// Unrated rows outside the to-read shelf
    pub skipped_uncategorized: usize,
    /// Rows already on the shelf or repeated within the file
    pub skipped_duplicates: usize,
}

/// Category for a row: to-read shelf first, then by rating
pub fn infer_category(shelf: &str, rating: u8) -> Option<Category> {
    if shelf == TO_READ_SHELF {
        return Some(Category::Tbr);
    }
    Category::from_rating(rating)
}

struct Columns {
    title: usize,
    author: usize,
    rating: usize,
    shelf: usize,
    read_count: Option<usize>,
}

impl Columns {
    fn locate(headers: &csv::StringRecord) -> ShelfResult<Self> {
        let find = |name: &str| headers.iter().position(|h| h.trim() == name);

        let missing: Vec<&str> = [TITLE, AUTHOR, RATING, SHELF]
            .into_iter()
            .filter(|name| find(*name).is_none())
            .collect();
        if !missing.is_empty() {
            return Err(ShelfError::InvalidInput(format!(
                "export is missing required columns: {}",
                missing.join(", ")
            )));
        }

        Ok(Self {
            title: find(TITLE).unwrap_or_default(),
            author: find(AUTHOR).unwrap_or_default(),
            rating: find(RATING).unwrap_or_default(),
            shelf: find(SHELF).unwrap_or_default(),
            read_count: find(READ_COUNT),
        })
    }
}

/// Parse an export; unusable rows are counted, never fatal.
pub fn parse_export<R: Read>(reader: R, delimiter: u8) -> ShelfResult<ImportReport> {
    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr
        .headers()
        .map_err(|e| ShelfError::InvalidInput(format!("unreadable header: {}", e)))?
        .clone();
    let columns = Columns::locate(&headers)?;

    let mut report = ImportReport::default();
    for row in rdr.records() {
        let row = match row {
            Ok(row) => row,
            Err(e) => {
                debug!(error = %e, "Skipping unreadable row");
                report.skipped_malformed += 1;
                continue;
            }
        };

        let field = |idx: usize| row.get(idx).unwrap_or("").trim();
        let title = field(columns.title);
        let author = field(columns.author);
        if title.is_empty() || author.is_empty() {
            report.skipped_malformed += 1;
            continue;
        }

        let rating: u8 = field(columns.rating).parse().unwrap_or(0);
        let shelf = field(columns.shelf);
        let read_count = columns
            .read_count
            .and_then(|idx| field(idx).parse().ok())
            .unwrap_or(1);

        let Some(category) = infer_category(shelf, rating) else {
            report.skipped_uncategorized += 1;
            continue;
        };

        report.records.push(ImportRecord {
            title: title.to_string(),
            author: author.to_string(),
            rating,
            shelf: shelf.to_string(),
            read_count,
            category,
        });
    }

    Ok(report)
}

/// Drop records already on the shelf, and repeats within the export itself
pub fn dedup_against(report: &mut ImportReport, shelves: &Shelves) {
    let mut seen: HashSet<(String, String)> = shelves
        .entries()
        .map(|e| (e.title.clone(), e.author.clone()))
        .collect();

    let before = report.records.len();
    report
        .records
        .retain(|r| seen.insert((r.title.clone(), r.author.clone())));
    report.skipped_duplicates += before - report.records.len();
}
