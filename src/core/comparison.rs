//! Binary-search placement driven by pairwise human judgments.
//!
//! A session decides where a candidate belongs among the peers of a ranked
//! category (lower position = preferred). Each round trip shows the user the
//! peer at `mid` and takes one answer: is the candidate better?
//!
//! The session is a plain value. Whoever drives the interaction carries it
//! between round trips; nothing is remembered server-side. It records the
//! category version its peer snapshot was read at, so a commit against a
//! category that changed in the meantime can be refused instead of landing at
//! a stale index.

use serde::{Deserialize, Serialize};

use crate::domain::{Category, Entry, NewEntry};

/// Outcome of starting or advancing a session
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Placement {
    /// Insertion position is fixed
    Settled(usize),

    /// Another judgment is needed
    Compare(ComparisonSession),
}

/// In-flight comparison state, carried by the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComparisonSession {
    pub candidate: NewEntry,
    pub category: Category,
    pub low: usize,
    pub high: usize,
    pub mid: usize,
    /// Peer count the bounds were computed against
    pub peer_count: usize,
    /// Category version the peers were read at
    pub version: u64,
}

impl ComparisonSession {
    /// Start placing `candidate` among `peer_count` ordered peers.
    ///
    /// With no peers the answer is position 0 and no comparison is needed.
    pub fn start(
        candidate: NewEntry,
        category: Category,
        peer_count: usize,
        version: u64,
    ) -> Placement {
        if peer_count == 0 {
            return Placement::Settled(0);
        }

        Placement::Compare(Self {
            candidate,
            category,
            low: 0,
            high: peer_count,
            mid: peer_count / 2,
            peer_count,
            version,
        })
    }

    /// Index of the peer the candidate must be judged against
    pub fn subject_index(&self) -> usize {
        self.mid
    }

    /// The current comparison subject within a peer list
    pub fn subject<'a>(&self, peers: &'a [Entry]) -> Option<&'a Entry> {
        peers.get(self.mid)
    }

    /// Apply one judgment.
    ///
    /// `candidate_better = false` moves past `mid`, so an equally liked
    /// candidate lands after the existing peer.
    pub fn judge(mut self, candidate_better: bool) -> Placement {
        if candidate_better {
            self.high = self.mid;
        } else {
            self.low = self.mid + 1;
        }

        if self.low >= self.high {
            return Placement::Settled(self.low);
        }

        self.mid = (self.low + self.high) / 2;
        Placement::Compare(self)
    }

    /// Whether bounds are coherent for the given peer count and `mid` is
    /// the midpoint the search itself would pick
    pub fn is_consistent_with(&self, peer_count: usize) -> bool {
        self.peer_count == peer_count
            && self.low < self.high
            && self.high <= peer_count
            && self.mid == (self.low + self.high) / 2
    }
}

/// Worst-case number of judgments for `n` peers: `ceil(log2(n + 1))`
pub fn max_comparisons(n: usize) -> u32 {
    usize::BITS - n.leading_zeros()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(n: usize) -> ComparisonSession {
        match ComparisonSession::start(NewEntry::new("Candidate", "Anon"), Category::LikedIt, n, 0) {
            Placement::Compare(s) => s,
            Placement::Settled(p) => panic!("expected a comparison, settled at {}", p),
        }
    }

    /// Drive a session where the candidate loses to peers `0..k` and beats the rest
    fn run(n: usize, k: usize) -> (usize, u32) {
        let mut placement = ComparisonSession::start(
            NewEntry::new("Candidate", "Anon"),
            Category::LikedIt,
            n,
            0,
        );
        let mut asked = 0;
        loop {
            match placement {
                Placement::Settled(pos) => return (pos, asked),
                Placement::Compare(s) => {
                    asked += 1;
                    let better = s.subject_index() >= k;
                    placement = s.judge(better);
                }
            }
        }
    }

    #[test]
    fn test_no_peers_settles_at_zero() {
        let placement =
            ComparisonSession::start(NewEntry::new("Dune", "Herbert"), Category::LikedIt, 0, 0);
        assert_eq!(placement, Placement::Settled(0));
    }

    #[test]
    fn test_single_peer_better() {
        let s = session(1);
        assert_eq!((s.low, s.high, s.mid), (0, 1, 0));
        assert_eq!(s.judge(true), Placement::Settled(0));
    }

    #[test]
    fn test_single_peer_worse_goes_after() {
        assert_eq!(session(1).judge(false), Placement::Settled(1));
    }

    #[test]
    fn test_mid_recomputed() {
        let s = session(7);
        assert_eq!(s.mid, 3);
        match s.judge(false) {
            Placement::Compare(s) => assert_eq!((s.low, s.high, s.mid), (4, 7, 5)),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_converges_to_rank_for_every_split() {
        for n in 0..40 {
            for k in 0..=n {
                let (pos, asked) = run(n, k);
                assert_eq!(pos, k, "n={} k={}", n, k);
                assert!(asked <= max_comparisons(n), "n={} k={} asked={}", n, k, asked);
            }
        }
    }

    #[test]
    fn test_max_comparisons() {
        assert_eq!(max_comparisons(0), 0);
        assert_eq!(max_comparisons(1), 1);
        assert_eq!(max_comparisons(2), 2);
        assert_eq!(max_comparisons(3), 2);
        assert_eq!(max_comparisons(4), 3);
        assert_eq!(max_comparisons(7), 3);
        assert_eq!(max_comparisons(8), 4);
    }

    #[test]
    fn test_session_round_trips_through_json() {
        let s = session(5);
        let json = serde_json::to_string(&s).unwrap();
        let back: ComparisonSession = serde_json::from_str(&json).unwrap();
        assert_eq!(back, s);
        assert!(back.is_consistent_with(5));
        assert!(!back.is_consistent_with(4));
    }

    #[test]
    fn test_shifted_mid_is_inconsistent() {
        let mut s = session(3);
        assert_eq!(s.mid, 1);

        s.mid = 0;
        assert!(!s.is_consistent_with(3));
        s.mid = 2;
        assert!(!s.is_consistent_with(3));
    }
}
