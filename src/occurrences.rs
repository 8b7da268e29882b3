//! The inverted index from nodes to path occurrences.
//!
//! For every node, the index lists the (path identifier, step rank) pairs
//! that visit it. The pairs live in two aligned [`WaveletTree`]s organized as
//! per-node records in internal-rank order: record `r` opens at the position
//! of the r-th `0` and runs to the next `0`. Entries are stored plus-one so
//! that `0` stays a unique record delimiter. Within a record, entries appear
//! in insertion order.
//!
//! The index must hold exactly one pair per live path step. Step ranks shift
//! when a path is edited in the middle, so the graph facade removes the pairs
//! for the tail of the edited path before the edit and re-adds them after.

use crate::WaveletTree;
use crate::support::PathId;

//-----------------------------------------------------------------------------

/// An index of the path steps visiting each node.
#[derive(Clone, Debug, Default)]
pub struct OccurrenceIndex {
    path_ids: WaveletTree,
    step_ranks: WaveletTree,
}

impl OccurrenceIndex {
    /// Creates an empty index.
    pub fn new() -> OccurrenceIndex {
        OccurrenceIndex::default()
    }

    /// Adds an empty record for a new node at the end of the index.
    pub fn push_record(&mut self) {
        if self.path_ids.is_empty() {
            self.path_ids.push_back(0);
            self.step_ranks.push_back(0);
        }
        self.path_ids.push_back(0);
        self.step_ranks.push_back(0);
    }

    /// Removes the record of the node with the given internal rank.
    ///
    /// The record should be empty; any remaining entries are dropped with it.
    pub fn remove_record(&mut self, rank: usize) {
        let start = self.path_ids.select(rank, 0).unwrap();
        self.path_ids.remove(start);
        self.step_ranks.remove(start);
        while start < self.path_ids.len() && self.path_ids.at(start) != 0 {
            self.path_ids.remove(start);
            self.step_ranks.remove(start);
        }
    }

    /// Adds an occurrence to the end of a node's record.
    pub fn append(&mut self, rank: usize, path: PathId, step: usize) {
        let end = self.path_ids.select(rank + 1, 0).unwrap();
        self.path_ids.insert(end, path as u64 + 1);
        self.step_ranks.insert(end, step as u64 + 1);
    }

    /// Removes an occurrence from a node's record.
    ///
    /// # Panics
    ///
    /// Panics if the record does not contain the occurrence.
    pub fn remove(&mut self, rank: usize, path: PathId, step: usize) {
        let mut i = self.path_ids.select(rank, 0).unwrap() + 1;
        loop {
            let p = self.path_ids.at(i);
            assert!(p != 0, "OccurrenceIndex: node {} has no occurrence (path {}, step {})", rank, path, step);
            if p == path as u64 + 1 && self.step_ranks.at(i) == step as u64 + 1 {
                self.path_ids.remove(i);
                self.step_ranks.remove(i);
                return;
            }
            i += 1;
        }
    }

    /// Iterates over the occurrences on the node with the given internal
    /// rank, in insertion order. Stops early if the visitor returns `false`;
    /// returns `true` if the iteration completed.
    pub fn for_each<F: FnMut(PathId, usize) -> bool>(&self, rank: usize, mut visit: F) -> bool {
        let mut i = self.path_ids.select(rank, 0).unwrap() + 1;
        while i < self.path_ids.len() {
            let p = self.path_ids.at(i);
            if p == 0 {
                break;
            }
            let step = self.step_ranks.at(i);
            if !visit((p - 1) as PathId, (step - 1) as usize) {
                return false;
            }
            i += 1;
        }
        true
    }

    /// Returns the occurrences on the node with the given internal rank.
    pub fn record(&self, rank: usize) -> Vec<(PathId, usize)> {
        let mut result = Vec::new();
        self.for_each(rank, |path, step| {
            result.push((path, step));
            true
        });
        result
    }
}

//-----------------------------------------------------------------------------
