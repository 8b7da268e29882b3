//! Storage for one embedded path.
//!
//! A path is a named, ordered sequence of steps, each visiting a node on one
//! strand. Steps record the external identifier of the node rather than its
//! internal rank, so they stay valid when deletions elsewhere in the graph
//! renumber the ranks. The identifiers are kept in a [`WaveletTree`] and the
//! strands in a parallel [`BitVector`], which makes access and edits at
//! arbitrary step ranks logarithmic in the path length.

use crate::{BitVector, WaveletTree};


//-----------------------------------------------------------------------------

/// The steps of a single path.
///
/// Step ranks are 0-based and shift under insertions and removals, exactly
/// like positions in a vector. The caller is responsible for keeping any
/// derived indexes in sync.
#[derive(Clone, Debug)]
pub struct PathStore {
    name: String,
    // External node identifiers, one per step.
    ids: WaveletTree,
    // Set when the step visits the node on the reverse strand.
    strands: BitVector,
    // Sequences of nodes that were destroyed under this path.
    removed: Vec<Vec<u8>>,
}

impl PathStore {
    /// Creates an empty path with the given name.
    pub fn new(name: &str) -> PathStore {
        PathStore {
            name: String::from(name),
            ids: WaveletTree::new(),
            strands: BitVector::new(),
            removed: Vec::new(),
        }
    }

    /// Returns the name of the path.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the number of steps on the path.
    #[inline]
    pub fn step_count(&self) -> usize {
        self.ids.len()
    }

    /// Returns `true` if the path has no steps.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Returns the step at the given rank as (node identifier, reverse flag).
    ///
    /// # Panics
    ///
    /// Panics if `rank >= self.step_count()`.
    #[inline]
    pub fn step(&self, rank: usize) -> (u64, bool) {
        (self.ids.at(rank), self.strands.get(rank))
    }

    /// Appends a step and returns its rank.
    pub fn append(&mut self, id: u64, reverse: bool) -> usize {
        self.ids.push_back(id);
        self.strands.push(reverse);
        self.ids.len() - 1
    }

    /// Inserts a step before the given rank.
    ///
    /// # Panics
    ///
    /// Panics if `rank > self.step_count()`.
    pub fn insert(&mut self, rank: usize, id: u64, reverse: bool) {
        self.ids.insert(rank, id);
        self.strands.insert(rank, reverse);
    }

    /// Removes the step at the given rank and returns it.
    ///
    /// # Panics
    ///
    /// Panics if `rank >= self.step_count()`.
    pub fn remove(&mut self, rank: usize) -> (u64, bool) {
        let id = self.ids.remove(rank);
        let reverse = self.strands.remove(rank);
        (id, reverse)
    }

    /// Removes the step at the given rank, retaining the sequence of the
    /// node it visited.
    ///
    /// This is the path half of node destruction: the node's bases are kept
    /// as a trace of what was deleted out from under the path. See
    /// [`PathStore::removed_sequences`].
    ///
    /// # Panics
    ///
    /// Panics if `rank >= self.step_count()`.
    pub fn unlink(&mut self, rank: usize, sequence: Vec<u8>) -> (u64, bool) {
        self.removed.push(sequence);
        self.remove(rank)
    }

    /// Replaces the step at the given rank in place, preserving its rank.
    ///
    /// # Panics
    ///
    /// Panics if `rank >= self.step_count()`.
    pub fn rewrite(&mut self, rank: usize, id: u64, reverse: bool) {
        self.ids.remove(rank);
        self.ids.insert(rank, id);
        self.strands.remove(rank);
        self.strands.insert(rank, reverse);
    }

    /// Returns the sequences of nodes destroyed under this path, in the
    /// order the destructions happened.
    #[inline]
    pub fn removed_sequences(&self) -> &[Vec<u8>] {
        &self.removed
    }

    /// Removes all steps and the removed-sequence trace.
    pub fn clear(&mut self) {
        self.ids = WaveletTree::new();
        self.strands = BitVector::new();
        self.removed.clear();
    }
}

//-----------------------------------------------------------------------------
