//! Add flow: place a new book through comparisons, then commit it.
//!
//! Each call is a pure function of its arguments and the current store. The
//! comparison state travels with the caller inside `AddStep::Compare`, and is
//! handed back with the next judgment.

use tracing::{debug, info, instrument, warn};

use super::comparison::{ComparisonSession, Placement};
use super::error::{ShelfError, ShelfResult};
use super::position_store::PositionStore;
use crate::domain::{Category, Entry, NewEntry};

/// What the caller must do next
#[derive(Debug, Clone)]
pub enum AddStep {
    /// The book is stored
    Inserted(Entry),

    /// Ask the user whether `session.candidate` is better than `subject`
    Compare {
        session: ComparisonSession,
        subject: Entry,
    },
}

impl AddStep {
    pub fn inserted(&self) -> Option<&Entry> {
        match self {
            AddStep::Inserted(entry) => Some(entry),
            AddStep::Compare { .. } => None,
        }
    }
}

/// Answers comparisons for `Shelf::place`
pub trait Judge {
    /// Is `candidate` better than `subject`? `None` abandons the add.
    fn judge(&mut self, candidate: &NewEntry, subject: &Entry) -> ShelfResult<Option<bool>>;
}

impl<J: Judge + ?Sized> Judge for &mut J {
    fn judge(&mut self, candidate: &NewEntry, subject: &Entry) -> ShelfResult<Option<bool>> {
        (**self).judge(candidate, subject)
    }
}

/// Restarts tolerated before a stale session becomes an error
pub const MAX_RESTARTS: usize = 3;

/// The shelf: a position store plus the add flow on top of it
pub struct Shelf {
    store: PositionStore,
}

impl Shelf {
    pub fn new(store: PositionStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &PositionStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut PositionStore {
        &mut self.store
    }

    /// Start adding a book.
    ///
    /// `tbr` books go straight to the end of the list; ranked categories
    /// insert immediately when empty and otherwise return the first comparison.
    #[instrument(skip(self, candidate), fields(title = %candidate.title))]
    pub fn begin_add(&mut self, candidate: NewEntry, category: Category) -> ShelfResult<AddStep> {
        validate_candidate(&candidate)?;

        if self.store.contains_book(&candidate.title, &candidate.author)? {
            return Err(ShelfError::Duplicate {
                title: candidate.title,
                author: candidate.author,
            });
        }

        if !category.is_ranked() {
            let entry = self.store.append(category, &candidate)?;
            return Ok(AddStep::Inserted(entry));
        }

        let snapshot = self.store.peers(category, &candidate)?;
        let version = snapshot.version;

        match ComparisonSession::start(candidate.clone(), category, snapshot.peers.len(), version) {
            Placement::Settled(position) => {
                let entry = self
                    .store
                    .insert_at_version(category, position, &candidate, version)?;
                Ok(AddStep::Inserted(entry))
            }
            Placement::Compare(session) => {
                debug!(peers = session.peer_count, mid = session.mid, "Comparison started");
                let subject = subject_of(&session, &snapshot.peers)?;
                Ok(AddStep::Compare { session, subject })
            }
        }
    }

    /// Apply one judgment to a caller-held session.
    ///
    /// Fails with `StaleSnapshot` if the category changed since the session
    /// started; the caller restarts with `begin_add`.
    #[instrument(skip(self, session), fields(title = %session.candidate.title, category = %session.category))]
    pub fn record_judgment(
        &mut self,
        session: ComparisonSession,
        candidate_better: bool,
    ) -> ShelfResult<AddStep> {
        let snapshot = self.store.peers(session.category, &session.candidate)?;
        check_snapshot(&session, snapshot.version, snapshot.peers.len())?;

        let candidate = session.candidate.clone();
        let category = session.category;
        let version = session.version;

        match session.judge(candidate_better) {
            Placement::Settled(position) => {
                let entry = self
                    .store
                    .insert_at_version(category, position, &candidate, version)?;
                info!(id = %entry.id, position, "Comparison settled");
                Ok(AddStep::Inserted(entry))
            }
            Placement::Compare(next) => {
                debug!(low = next.low, high = next.high, mid = next.mid, "Next comparison");
                let subject = subject_of(&next, &snapshot.peers)?;
                Ok(AddStep::Compare {
                    session: next,
                    subject,
                })
            }
        }
    }

    /// Run the whole add flow, asking `judge` for each comparison.
    ///
    /// Returns `None` when the judge abandons; nothing is stored in that case.
    /// A session made stale by a concurrent change restarts from scratch.
    pub fn place(
        &mut self,
        candidate: NewEntry,
        category: Category,
        judge: &mut impl Judge,
    ) -> ShelfResult<Option<Entry>> {
        let mut restarts = 0;

        'restart: loop {
            let mut step = self.begin_add(candidate.clone(), category)?;

            loop {
                match step {
                    AddStep::Inserted(entry) => return Ok(Some(entry)),
                    AddStep::Compare { session, subject } => {
                        let Some(better) = judge.judge(&session.candidate, &subject)? else {
                            debug!(title = %candidate.title, "Add abandoned");
                            return Ok(None);
                        };

                        match self.record_judgment(session, better) {
                            Ok(next) => step = next,
                            Err(e) if e.needs_restart() && restarts < MAX_RESTARTS => {
                                restarts += 1;
                                warn!(error = %e, restarts, "Category changed mid-comparison, restarting");
                                continue 'restart;
                            }
                            Err(e) => return Err(e),
                        }
                    }
                }
            }
        }
    }
}

fn validate_candidate(candidate: &NewEntry) -> ShelfResult<()> {
    if candidate.title.trim().is_empty() {
        return Err(ShelfError::InvalidInput("title is required".to_string()));
    }
    if candidate.author.trim().is_empty() {
        return Err(ShelfError::InvalidInput("author is required".to_string()));
    }
    Ok(())
}

fn check_snapshot(session: &ComparisonSession, version: u64, peer_count: usize) -> ShelfResult<()> {
    if version != session.version {
        return Err(ShelfError::StaleSnapshot {
            category: session.category,
            expected: session.version,
            found: version,
        });
    }
    if !session.is_consistent_with(peer_count) {
        return Err(ShelfError::InvalidInput(format!(
            "session bounds low={} mid={} high={} do not fit {} peers",
            session.low, session.mid, session.high, peer_count
        )));
    }
    Ok(())
}

fn subject_of(session: &ComparisonSession, peers: &[Entry]) -> ShelfResult<Entry> {
    session
        .subject(peers)
        .cloned()
        .ok_or_else(|| ShelfError::InvalidInput(format!("no peer at index {}", session.mid)))
}
