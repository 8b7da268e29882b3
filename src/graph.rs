//! A mutable pangenome variation graph with embedded paths.
//!
//! [`PanGraph`] is a bidirected sequence graph. Every node carries a DNA
//! sequence and an external identifier; every edge connects two node sides
//! and is aware of reverse complementation; every path is a named walk over
//! oriented nodes. The graph supports random-access queries and mutation,
//! including node splitting, in-place reorientation, and chain contraction
//! (see [`crate::unchop`]).
//!
//! The representation is a small constellation of dynamic succinct
//! structures. External identifiers, node sequences, and adjacency lists
//! live in [`WaveletTree`]s; per-edge orientation-flip flags live in
//! [`BitVector`]s parallel to the adjacency lists; the inverted index from
//! nodes to path steps is an [`OccurrenceIndex`]. Record stores delimit
//! per-node variable-length records with `0` sentinels, so the record of the
//! node with internal rank `r` opens at the position of the r-th `0`.
//!
//! Adjacency entries and path steps refer to nodes by their external
//! identifiers. Identifiers are stable for the life of a node, while
//! internal ranks shift when an earlier node is destroyed; storing
//! identifiers keeps every record valid across deletions at the cost of one
//! extra dictionary lookup when the entries are turned back into handles.
//!
//! The graph is single-writer, multi-reader, with no synchronization of its
//! own. [`PanGraph::for_each_handle_parallel`] fans read-only work out over
//! worker threads; no mutation may run concurrently with it.

use crate::{BitVector, NameIndex, OccurrenceIndex, PathStore, WaveletTree};
use crate::support::{self, Handle, Orientation, PathId, StepHandle};

use std::collections::BTreeMap;
use std::mem;
use std::ops::Range;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;


//-----------------------------------------------------------------------------

/// A mutable bidirected sequence graph with embedded paths.
///
/// Nodes are addressed either by their external identifiers (positive,
/// unique, not necessarily contiguous) or by [`Handle`]s packing the internal
/// rank and an orientation. Internal ranks are contiguous and renumbered when
/// a node is destroyed, so mutations invalidate handles as documented on each
/// operation.
///
/// # Examples
///
/// ```
/// use pangraph::PanGraph;
///
/// let mut graph = PanGraph::new();
/// let first = graph.create_handle_with_id(b"GAT", 1).unwrap();
/// let second = graph.create_handle_with_id(b"TACA", 2).unwrap();
/// graph.create_edge(first, second);
///
/// assert_eq!(graph.node_count(), 2);
/// assert_eq!(graph.edge_count(), 1);
/// assert_eq!(graph.get_sequence(first), b"GAT");
/// assert_eq!(graph.get_sequence(second.flip()), b"TGTA");
///
/// let path = graph.create_path_handle("sample").unwrap();
/// graph.append_occurrence(path, first);
/// graph.append_occurrence(path, second);
/// assert_eq!(graph.path_sequence(path), b"GATTACA");
/// ```
#[derive(Clone, Debug, Default)]
pub struct PanGraph {
    // External identifiers in internal-rank order.
    ids: WaveletTree,

    // Concatenated node sequences as 0-terminated records.
    sequences: WaveletTree,

    // Adjacency records for the forward side of each node, and the
    // orientation-flip flag of each entry.
    edges_fwd: WaveletTree,
    inv_fwd: BitVector,

    // The same for the reverse side.
    edges_rev: WaveletTree,
    inv_rev: BitVector,

    // Path steps visiting each node.
    occurrences: OccurrenceIndex,

    // Path name catalog and path slots in creation order.
    names: NameIndex,
    paths: Vec<PathStore>,

    edge_count: usize,
    min_node_id: u64,
    max_node_id: u64,
}

//-----------------------------------------------------------------------------

// Construction and counts.

impl PanGraph {
    /// Creates an empty graph.
    pub fn new() -> PanGraph {
        PanGraph::default()
    }

    /// Returns the number of live nodes in the graph.
    #[inline]
    pub fn node_count(&self) -> usize {
        self.ids.len()
    }

    /// Returns the number of edges in the graph.
    #[inline]
    pub fn edge_count(&self) -> usize {
        self.edge_count
    }

    /// Returns the smallest node identifier in the graph, or a smaller
    /// number. The value is unspecified if the graph is empty.
    #[inline]
    pub fn min_node_id(&self) -> u64 {
        self.min_node_id
    }

    /// Returns the largest node identifier ever used in the graph, or a
    /// larger number. The value is unspecified if the graph is empty.
    #[inline]
    pub fn max_node_id(&self) -> u64 {
        self.max_node_id
    }

    /// Returns `true` if the graph contains a node with the given
    /// identifier.
    #[inline]
    pub fn has_node(&self, id: u64) -> bool {
        self.ids.contains(id)
    }
}

//-----------------------------------------------------------------------------

// The handle graph interface.

impl PanGraph {
    /// Returns the handle for the node with the given identifier in the
    /// given orientation.
    ///
    /// # Panics
    ///
    /// Panics if there is no node with the identifier.
    pub fn get_handle(&self, id: u64, orientation: Orientation) -> Handle {
        match self.ids.select(0, id) {
            Some(rank) => Handle::pack(rank, orientation),
            None => panic!("PanGraph: node {} does not exist", id),
        }
    }

    /// Returns the identifier of the node the handle refers to.
    ///
    /// # Panics
    ///
    /// Panics if the handle does not refer to a live node.
    #[inline]
    pub fn get_id(&self, handle: Handle) -> u64 {
        self.ids.at(handle.rank())
    }

    /// Returns `true` if the handle views its node in reverse orientation.
    #[inline]
    pub fn get_is_reverse(&self, handle: Handle) -> bool {
        handle.is_reverse()
    }

    /// Returns the handle for the same node in the opposite orientation.
    #[inline]
    pub fn flip(&self, handle: Handle) -> Handle {
        handle.flip()
    }

    /// Returns the handle for the same node in forward orientation.
    #[inline]
    pub fn forward(&self, handle: Handle) -> Handle {
        handle.forward()
    }

    /// Returns the length of the node sequence.
    pub fn get_length(&self, handle: Handle) -> usize {
        let rank = handle.rank();
        let start = self.sequences.select(rank, 0).unwrap();
        let end = self.sequences.select(rank + 1, 0).unwrap();
        end - start - 1
    }

    /// Returns the node sequence in the handle's local forward orientation.
    ///
    /// For a reverse handle this is the reverse complement of the stored
    /// sequence.
    pub fn get_sequence(&self, handle: Handle) -> Vec<u8> {
        let sequence = self.node_sequence(handle.rank());
        if handle.is_reverse() {
            support::reverse_complement(&sequence)
        } else {
            sequence
        }
    }

    /// Iterates over the handles adjacent to the given handle.
    ///
    /// With `go_left == false` the neighbors are the handles reachable by
    /// leaving the handle's right side; with `go_left == true` its left
    /// side. Stops early if the visitor returns `false`; returns `true` if
    /// the iteration completed.
    pub fn follow_edges<F: FnMut(Handle) -> bool>(&self, handle: Handle, go_left: bool, mut visit: F) -> bool {
        let rank = handle.rank();
        let reverse = handle.is_reverse();
        // Edges are stored relative to the forward orientation of the node.
        let (record, flags) = if go_left == reverse {
            (&self.edges_fwd, &self.inv_fwd)
        } else {
            (&self.edges_rev, &self.inv_rev)
        };
        let mut i = record.select(rank, 0).unwrap() + 1;
        while i < record.len() {
            let id = record.at(i);
            if id == 0 {
                break;
            }
            let orientation = Orientation::from_reverse(flags.get(i) != reverse);
            let neighbor = Handle::pack(self.rank_of(id), orientation);
            if !visit(neighbor) {
                return false;
            }
            i += 1;
        }
        true
    }

    /// Returns the number of edges on the right (`go_left == false`) or left
    /// (`go_left == true`) side of the handle.
    pub fn get_degree(&self, handle: Handle, go_left: bool) -> usize {
        let mut result = 0;
        self.follow_edges(handle, go_left, |_| {
            result += 1;
            true
        });
        result
    }

    /// Iterates over all live nodes in internal-rank order, passing a
    /// forward handle for each to the visitor. Stops early if the visitor
    /// returns `false`; returns `true` if the iteration completed.
    pub fn for_each_handle<F: FnMut(Handle) -> bool>(&self, mut visit: F) -> bool {
        for rank in 0..self.ids.len() {
            if !visit(Handle::pack(rank, Orientation::Forward)) {
                return false;
            }
        }
        true
    }

    /// Visits every live node once from a pool of worker threads, in
    /// unspecified order.
    ///
    /// Early termination is best-effort: when a visitor returns `false`, the
    /// workers stop at the next node they would visit. Returns `true` if no
    /// visitor asked to stop. The graph may not be mutated while the
    /// iteration runs.
    pub fn for_each_handle_parallel<F>(&self, threads: usize, visit: &F) -> bool
    where
        F: Fn(Handle) -> bool + Sync,
    {
        let total = self.ids.len();
        if total == 0 {
            return true;
        }
        let threads = threads.max(1);
        let chunk = (total + threads - 1) / threads;
        let stop = AtomicBool::new(false);
        thread::scope(|scope| {
            for thread in 0..threads {
                let low = thread * chunk;
                let high = ((thread + 1) * chunk).min(total);
                if low >= high {
                    break;
                }
                let stop = &stop;
                scope.spawn(move || {
                    for rank in low..high {
                        if stop.load(Ordering::Relaxed) {
                            return;
                        }
                        if !visit(Handle::pack(rank, Orientation::Forward)) {
                            stop.store(true, Ordering::Relaxed);
                            return;
                        }
                    }
                });
            }
        });
        !stop.load(Ordering::Relaxed)
    }
}

//-----------------------------------------------------------------------------

// The path interface.

impl PanGraph {
    /// Returns `true` if the graph contains a path with the given name.
    pub fn has_path(&self, name: &str) -> bool {
        self.names.find(name).is_some()
    }

    /// Returns the identifier of the path with the given name, or [`None`]
    /// if there is no such path.
    pub fn get_path_handle(&self, name: &str) -> Option<PathId> {
        self.names.find(name)
    }

    /// Returns the name of the path.
    ///
    /// # Panics
    ///
    /// Panics if the path does not exist.
    pub fn get_path_name(&self, path: PathId) -> &str {
        self.paths[path].name()
    }

    /// Returns the number of steps on the path.
    ///
    /// # Panics
    ///
    /// Panics if the path does not exist.
    #[inline]
    pub fn get_occurrence_count(&self, path: PathId) -> usize {
        self.paths[path].step_count()
    }

    /// Returns the number of path slots in the graph, including destroyed
    /// paths.
    #[inline]
    pub fn get_path_count(&self) -> usize {
        self.paths.len()
    }

    /// Returns `true` if the path has no steps.
    ///
    /// # Panics
    ///
    /// Panics if the path does not exist.
    #[inline]
    pub fn is_empty(&self, path: PathId) -> bool {
        self.paths[path].is_empty()
    }

    /// Iterates over the nonempty paths in identifier order. Stops early if
    /// the visitor returns `false`; returns `true` if the iteration
    /// completed.
    pub fn for_each_path_handle<F: FnMut(PathId) -> bool>(&self, mut visit: F) -> bool {
        for path in 0..self.paths.len() {
            if self.paths[path].is_empty() {
                continue;
            }
            if !visit(path) {
                return false;
            }
        }
        true
    }

    /// Iterates over the path steps visiting the node, in insertion order.
    /// Stops early if the visitor returns `false`; returns `true` if the
    /// iteration completed.
    pub fn for_each_occurrence_on_handle<F: FnMut(StepHandle) -> bool>(&self, handle: Handle, mut visit: F) -> bool {
        self.occurrences.for_each(handle.rank(), |path, rank| visit(StepHandle::new(path, rank)))
    }

    /// Iterates over the steps of the path from first to last. Stops early
    /// if the visitor returns `false`; returns `true` if the iteration
    /// completed.
    pub fn for_each_occurrence_in_path<F: FnMut(StepHandle) -> bool>(&self, path: PathId, mut visit: F) -> bool {
        for rank in 0..self.paths[path].step_count() {
            if !visit(StepHandle::new(path, rank)) {
                return false;
            }
        }
        true
    }

    /// Returns the handle the step visits.
    ///
    /// # Panics
    ///
    /// Panics if the step does not exist.
    pub fn get_occurrence(&self, step: StepHandle) -> Handle {
        let (id, reverse) = self.paths[step.path()].step(step.rank());
        Handle::pack(self.rank_of(id), Orientation::from_reverse(reverse))
    }

    /// Returns a handle to the first step of the path.
    ///
    /// # Panics
    ///
    /// Panics if the path is empty.
    pub fn get_first_occurrence(&self, path: PathId) -> StepHandle {
        assert!(!self.paths[path].is_empty(), "PanGraph: path {} is empty", path);
        StepHandle::new(path, 0)
    }

    /// Returns a handle to the last step of the path.
    ///
    /// # Panics
    ///
    /// Panics if the path is empty.
    pub fn get_last_occurrence(&self, path: PathId) -> StepHandle {
        assert!(!self.paths[path].is_empty(), "PanGraph: path {} is empty", path);
        StepHandle::new(path, self.paths[path].step_count() - 1)
    }

    /// Returns `true` if the step is not the last one on its path.
    #[inline]
    pub fn has_next_occurrence(&self, step: StepHandle) -> bool {
        step.rank() + 1 < self.paths[step.path()].step_count()
    }

    /// Returns `true` if the step is not the first one on its path.
    #[inline]
    pub fn has_previous_occurrence(&self, step: StepHandle) -> bool {
        step.rank() > 0
    }

    /// Returns a handle to the next step on the path.
    ///
    /// # Panics
    ///
    /// Panics if the step is the last one on its path.
    pub fn get_next_occurrence(&self, step: StepHandle) -> StepHandle {
        assert!(self.has_next_occurrence(step), "PanGraph: step {} is the last one on its path", step);
        StepHandle::new(step.path(), step.rank() + 1)
    }

    /// Returns a handle to the previous step on the path.
    ///
    /// # Panics
    ///
    /// Panics if the step is the first one on its path.
    pub fn get_previous_occurrence(&self, step: StepHandle) -> StepHandle {
        assert!(self.has_previous_occurrence(step), "PanGraph: step {} is the first one on its path", step);
        StepHandle::new(step.path(), step.rank() - 1)
    }

    /// Returns the identifier of the path the step is on.
    #[inline]
    pub fn get_path_handle_of_occurrence(&self, step: StepHandle) -> PathId {
        step.path()
    }

    /// Returns the 0-based ordinal rank of the step on its path.
    #[inline]
    pub fn get_ordinal_rank_of_occurrence(&self, step: StepHandle) -> usize {
        step.rank()
    }

    /// Returns the sequences of nodes destroyed under the path, in the order
    /// the destructions happened. See [`PathStore::removed_sequences`].
    ///
    /// # Panics
    ///
    /// Panics if the path does not exist.
    #[inline]
    pub fn removed_sequences(&self, path: PathId) -> &[Vec<u8>] {
        self.paths[path].removed_sequences()
    }

    /// Returns the concatenation of the strand-oriented sequences of the
    /// steps of the path.
    ///
    /// # Panics
    ///
    /// Panics if the path does not exist.
    pub fn path_sequence(&self, path: PathId) -> Vec<u8> {
        let mut result = Vec::new();
        self.for_each_occurrence_in_path(path, |step| {
            result.extend_from_slice(&self.get_sequence(self.get_occurrence(step)));
            true
        });
        result
    }
}

//-----------------------------------------------------------------------------

// The mutation interface.

impl PanGraph {
    /// Creates a new node with the given sequence and the smallest unused
    /// identifier above all identifiers ever used, and returns a handle to
    /// it. Invalidates nothing.
    pub fn create_handle(&mut self, sequence: &[u8]) -> Handle {
        self.create_handle_with_id(sequence, self.max_node_id + 1).unwrap()
    }

    /// Creates a new node with the given sequence and identifier, and
    /// returns a handle to it. Invalidates nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if the identifier is zero or already in use.
    pub fn create_handle_with_id(&mut self, sequence: &[u8], id: u64) -> Result<Handle, String> {
        if id == 0 {
            return Err(String::from("Node identifiers must be positive"));
        }
        if self.has_node(id) {
            return Err(format!("Node {} already exists", id));
        }

        // Record stores need a leading sentinel before the first record.
        if self.sequences.is_empty() {
            self.sequences.push_back(0);
            self.edges_fwd.push_back(0);
            self.inv_fwd.push(false);
            self.edges_rev.push_back(0);
            self.inv_rev.push(false);
        }

        self.ids.push_back(id);
        for c in sequence {
            self.sequences.push_back(*c as u64);
        }
        self.sequences.push_back(0);
        self.edges_fwd.push_back(0);
        self.inv_fwd.push(false);
        self.edges_rev.push_back(0);
        self.inv_rev.push(false);
        self.occurrences.push_record();

        self.max_node_id = self.max_node_id.max(id);
        if self.ids.len() == 1 {
            self.min_node_id = id;
        } else {
            self.min_node_id = self.min_node_id.min(id);
        }
        Ok(Handle::pack(self.ids.len() - 1, Orientation::Forward))
    }

    /// Destroys the node the handle refers to, together with all of its
    /// edges.
    ///
    /// Every path visiting the node loses the corresponding steps; the
    /// sequence of the node is retained on those paths as a removed-sequence
    /// trace (see [`PathStore::removed_sequences`]). Invalidates all handles
    /// to the node, all step handles on the affected paths, and all handles
    /// with a larger internal rank.
    ///
    /// May not be called while edges of the node are being followed or while
    /// a parallel iteration is running.
    pub fn destroy_handle(&mut self, handle: Handle) {
        let rank = handle.rank();
        let id = self.ids.at(rank);
        let sequence = self.node_sequence(rank);

        // Unlink the visiting steps path by path, keeping the inverted index
        // in sync with the shifting step ranks.
        let mut by_path: BTreeMap<PathId, Vec<usize>> = BTreeMap::new();
        for (path, step) in self.occurrences.record(rank) {
            by_path.entry(path).or_default().push(step);
        }
        for (path, mut ranks) in by_path {
            ranks.sort_unstable();
            let from = ranks[0];
            self.unindex_path_tail(path, from);
            for step in ranks.iter().rev() {
                self.paths[path].unlink(*step, sequence.clone());
            }
            self.index_path_tail(path, from);
        }

        self.destroy_node_structure(rank, id);
    }

    /// Creates an edge between the right side of `left` and the left side of
    /// `right`. Creating an existing edge is a no-op. Invalidates nothing.
    pub fn create_edge(&mut self, left: Handle, right: Handle) {
        if self.has_edge(left, right) {
            return;
        }
        let (left_id, left_rev, right_id, right_rev, inv) = self.canonical_edge(left, right);

        let left_rank = self.rank_of(left_id);
        let (record, flags) = if left_rev {
            (&mut self.edges_rev, &mut self.inv_rev)
        } else {
            (&mut self.edges_fwd, &mut self.inv_fwd)
        };
        let pos = record.select(left_rank, 0).unwrap() + 1;
        record.insert(pos, right_id);
        flags.insert(pos, inv);

        let right_rank = self.rank_of(right_id);
        let (record, flags) = if right_rev {
            (&mut self.edges_fwd, &mut self.inv_fwd)
        } else {
            (&mut self.edges_rev, &mut self.inv_rev)
        };
        let pos = record.select(right_rank, 0).unwrap() + 1;
        record.insert(pos, left_id);
        flags.insert(pos, inv);

        self.edge_count += 1;
    }

    /// Returns `true` if the graph contains an edge between the right side
    /// of `left` and the left side of `right`.
    pub fn has_edge(&self, left: Handle, right: Handle) -> bool {
        let mut found = false;
        self.follow_edges(left, false, |next| {
            if next == right {
                found = true;
            }
            !found
        });
        found
    }

    /// Removes the edge between the right side of `left` and the left side
    /// of `right`. Destroying a nonexistent edge is a no-op. Invalidates
    /// nothing.
    pub fn destroy_edge(&mut self, left: Handle, right: Handle) {
        let (left_id, left_rev, right_id, right_rev, inv) = self.canonical_edge(left, right);

        let left_rank = self.rank_of(left_id);
        let (record, flags) = if left_rev {
            (&mut self.edges_rev, &mut self.inv_rev)
        } else {
            (&mut self.edges_fwd, &mut self.inv_fwd)
        };
        let pos = match find_in_record(record, flags, left_rank, right_id, inv) {
            Some(pos) => pos,
            None => return,
        };
        record.remove(pos);
        flags.remove(pos);

        let right_rank = self.rank_of(right_id);
        let (record, flags) = if right_rev {
            (&mut self.edges_fwd, &mut self.inv_fwd)
        } else {
            (&mut self.edges_rev, &mut self.inv_rev)
        };
        let pos = find_in_record(record, flags, right_rank, left_id, inv).unwrap();
        record.remove(pos);
        flags.remove(pos);

        self.edge_count -= 1;
    }

    /// Removes all nodes, edges, and paths.
    pub fn clear(&mut self) {
        *self = PanGraph::new();
    }

    /// Makes the orientation indicated by the handle the local forward
    /// orientation of the node. A forward handle is a no-op.
    ///
    /// The node is rebuilt under a fresh identifier with the
    /// reverse-complement sequence; its edges are rewired and every visiting
    /// step is rewritten in place with its strand inverted. Returns a valid
    /// forward handle to the rebuilt node. Invalidates all handles to the
    /// node and all step handles on the paths visiting it.
    pub fn apply_orientation(&mut self, handle: Handle) -> Handle {
        if !handle.is_reverse() {
            return handle;
        }
        let rank = handle.rank();
        let id = self.ids.at(rank);

        // Snapshots by identifier: the ranks shift when the node dies.
        let mut left_neighbors: Vec<(u64, Orientation)> = Vec::new();
        self.follow_edges(handle, true, |n| {
            left_neighbors.push((self.ids.at(n.rank()), n.orientation()));
            true
        });
        let mut right_neighbors: Vec<(u64, Orientation)> = Vec::new();
        self.follow_edges(handle, false, |n| {
            right_neighbors.push((self.ids.at(n.rank()), n.orientation()));
            true
        });
        let sequence = self.get_sequence(handle);
        let steps: Vec<(PathId, usize, bool)> = self
            .occurrences
            .record(rank)
            .into_iter()
            .map(|(path, step)| {
                let (_, reverse) = self.paths[path].step(step);
                (path, step, reverse)
            })
            .collect();

        self.destroy_node_structure(rank, id);
        let new_handle = self.create_handle(&sequence);
        let new_id = self.ids.at(new_handle.rank());

        // The new forward orientation is the orientation the handle viewed,
        // so self-references flip and everything else reconnects as seen.
        for (neighbor, orientation) in left_neighbors {
            let n = if neighbor == id {
                Handle::pack(new_handle.rank(), orientation.flip())
            } else {
                self.get_handle(neighbor, orientation)
            };
            self.create_edge(n, new_handle);
        }
        for (neighbor, orientation) in right_neighbors {
            let n = if neighbor == id {
                Handle::pack(new_handle.rank(), orientation.flip())
            } else {
                self.get_handle(neighbor, orientation)
            };
            self.create_edge(new_handle, n);
        }

        // Step ranks are preserved, so the index pairs only move records.
        for (path, step, reverse) in steps {
            self.paths[path].rewrite(step, new_id, !reverse);
            self.occurrences.append(new_handle.rank(), path, step);
        }
        new_handle
    }

    /// Splits the node at the given offsets, interpreted in the handle's
    /// orientation.
    ///
    /// Offsets of zero, past the end, or repeated are ignored. The pieces
    /// keep the node's local forward orientation; the returned handles come
    /// in the order and orientation matching the handle passed in. The first
    /// piece keeps the left-side edges of the node and the last piece the
    /// right-side edges, with a chain of edges connecting consecutive
    /// pieces. Every visiting step is rewritten into the piece chain on its
    /// own strand. Invalidates all handles to the node and all step handles
    /// on the paths visiting it.
    pub fn divide_handle(&mut self, handle: Handle, offsets: &[usize]) -> Vec<Handle> {
        let rank = handle.rank();
        let id = self.ids.at(rank);
        let sequence = self.node_sequence(rank);
        let node_len = sequence.len();

        let mut cuts: Vec<usize> = offsets
            .iter()
            .filter(|o| **o > 0 && **o < node_len)
            .map(|o| if handle.is_reverse() { node_len - o } else { *o })
            .collect();
        cuts.sort_unstable();
        cuts.dedup();
        if cuts.is_empty() {
            return vec![handle];
        }

        let mut left_neighbors: Vec<(u64, Orientation)> = Vec::new();
        self.follow_edges(handle.forward(), true, |n| {
            left_neighbors.push((self.ids.at(n.rank()), n.orientation()));
            true
        });
        let mut right_neighbors: Vec<(u64, Orientation)> = Vec::new();
        self.follow_edges(handle.forward(), false, |n| {
            right_neighbors.push((self.ids.at(n.rank()), n.orientation()));
            true
        });
        let occurrences = self.occurrences.record(rank);

        // Materialize the pieces and the chain of edges between them.
        let mut boundaries: Vec<usize> = Vec::with_capacity(cuts.len() + 2);
        boundaries.push(0);
        boundaries.extend_from_slice(&cuts);
        boundaries.push(node_len);
        let mut pieces: Vec<Handle> = Vec::with_capacity(boundaries.len() - 1);
        for window in boundaries.windows(2) {
            let piece = self.create_handle(&sequence[window[0]..window[1]]);
            pieces.push(piece);
        }
        for window in pieces.windows(2) {
            self.create_edge(window[0], window[1]);
        }
        let piece_ids: Vec<u64> = pieces.iter().map(|piece| self.ids.at(piece.rank())).collect();

        // External edges: the first piece takes over the left side of the
        // node and the last piece the right side.
        let first = pieces[0];
        let last = *pieces.last().unwrap();
        for (neighbor, orientation) in left_neighbors {
            let n = if neighbor == id {
                if orientation.is_reverse() { first.flip() } else { last }
            } else {
                self.get_handle(neighbor, orientation)
            };
            self.create_edge(n, first);
        }
        for (neighbor, orientation) in right_neighbors {
            let n = if neighbor == id {
                if orientation.is_reverse() { last.flip() } else { first }
            } else {
                self.get_handle(neighbor, orientation)
            };
            self.create_edge(last, n);
        }

        // One step through the node becomes a run of steps through the
        // pieces, on the strand of the original step.
        let mut by_path: BTreeMap<PathId, Vec<usize>> = BTreeMap::new();
        for (path, step) in occurrences {
            by_path.entry(path).or_default().push(step);
        }
        for (path, mut ranks) in by_path {
            ranks.sort_unstable();
            let from = ranks[0];
            self.unindex_path_tail(path, from);
            for step in ranks.iter().rev() {
                let (_, reverse) = self.paths[path].step(*step);
                self.paths[path].remove(*step);
                if reverse {
                    for (offset, piece) in piece_ids.iter().rev().enumerate() {
                        self.paths[path].insert(step + offset, *piece, true);
                    }
                } else {
                    for (offset, piece) in piece_ids.iter().enumerate() {
                        self.paths[path].insert(step + offset, *piece, false);
                    }
                }
            }
            self.index_path_tail(path, from);
        }

        self.destroy_node_structure(rank, id);

        if handle.is_reverse() {
            piece_ids.iter().rev().map(|piece| self.get_handle(*piece, Orientation::Reverse)).collect()
        } else {
            piece_ids.iter().map(|piece| self.get_handle(*piece, Orientation::Forward)).collect()
        }
    }

    /// Creates an empty path with the given name and returns its identifier.
    /// Invalidates nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if the name contains the reserved delimiter `$` or a
    /// path with the name already exists.
    pub fn create_path_handle(&mut self, name: &str) -> Result<PathId, String> {
        if name.as_bytes().contains(&crate::names::DELIMITER) {
            return Err(format!("Path name {} contains the reserved delimiter", name));
        }
        if self.has_path(name) {
            return Err(format!("Path {} already exists", name));
        }
        let id = self.names.append(name);
        debug_assert_eq!(id, self.paths.len());
        self.paths.push(PathStore::new(name));
        Ok(id)
    }

    /// Removes all steps of the path but keeps its slot and name.
    /// Invalidates the step handles on the path.
    ///
    /// # Panics
    ///
    /// Panics if the path does not exist.
    pub fn destroy_path(&mut self, path: PathId) {
        self.unindex_path_tail(path, 0);
        self.paths[path].clear();
    }

    /// Appends a visit to the given handle to the path and returns a handle
    /// to the new step. Step handles on this and other paths remain valid.
    ///
    /// # Panics
    ///
    /// Panics if the path does not exist or the handle does not refer to a
    /// live node.
    pub fn append_occurrence(&mut self, path: PathId, handle: Handle) -> StepHandle {
        let id = self.ids.at(handle.rank());
        let rank = self.paths[path].append(id, handle.is_reverse());
        self.occurrences.append(handle.rank(), path, rank);
        StepHandle::new(path, rank)
    }

    /// Replaces the steps `range` of the path with visits to the given
    /// handles. Invalidates the step handles on the path from the start of
    /// the range onwards.
    ///
    /// # Panics
    ///
    /// Panics if the range is out of bounds or a handle does not refer to a
    /// live node.
    pub fn rewrite_segment(&mut self, path: PathId, range: Range<usize>, new_steps: &[Handle]) {
        assert!(
            range.start <= range.end && range.end <= self.paths[path].step_count(),
            "PanGraph: step range {}..{} is out of bounds for path {}",
            range.start, range.end, path
        );
        let replacements: Vec<(u64, bool)> = new_steps
            .iter()
            .map(|handle| (self.ids.at(handle.rank()), handle.is_reverse()))
            .collect();
        let from = range.start;
        self.unindex_path_tail(path, from);
        for rank in range.rev() {
            self.paths[path].remove(rank);
        }
        for (offset, (id, reverse)) in replacements.iter().enumerate() {
            self.paths[path].insert(from + offset, *id, *reverse);
        }
        self.index_path_tail(path, from);
    }
}

//-----------------------------------------------------------------------------

// Internals.

impl PanGraph {
    // Internal rank of the node with the given identifier.
    fn rank_of(&self, id: u64) -> usize {
        match self.ids.select(0, id) {
            Some(rank) => rank,
            None => panic!("PanGraph: node {} does not exist", id),
        }
    }

    // Stored (forward-orientation) sequence of the node at the given rank.
    fn node_sequence(&self, rank: usize) -> Vec<u8> {
        let mut result = Vec::new();
        let mut i = self.sequences.select(rank, 0).unwrap() + 1;
        loop {
            let c = self.sequences.at(i);
            if c == 0 {
                break;
            }
            result.push(c as u8);
            i += 1;
        }
        result
    }

    // Canonical storage direction of an edge: when both endpoints are
    // reverse, the dual form with both endpoints forward is stored instead.
    // Returns (left id, left reverse, right id, right reverse, inverting).
    fn canonical_edge(&self, left: Handle, right: Handle) -> (u64, bool, u64, bool, bool) {
        let mut left_id = self.ids.at(left.rank());
        let mut right_id = self.ids.at(right.rank());
        let mut left_rev = left.is_reverse();
        let mut right_rev = right.is_reverse();
        if left_rev && right_rev {
            mem::swap(&mut left_id, &mut right_id);
            left_rev = false;
            right_rev = false;
        }
        let inv = left_rev != right_rev;
        (left_id, left_rev, right_id, right_rev, inv)
    }

    // Removes the inverted-index pairs for the steps of the path from rank
    // `from` onwards.
    fn unindex_path_tail(&mut self, path: PathId, from: usize) {
        let steps: Vec<(u64, usize)> = (from..self.paths[path].step_count())
            .map(|rank| (self.paths[path].step(rank).0, rank))
            .collect();
        for (id, rank) in steps {
            let node_rank = self.ids.select(0, id).unwrap();
            self.occurrences.remove(node_rank, path, rank);
        }
    }

    // Re-adds the inverted-index pairs for the steps of the path from rank
    // `from` onwards.
    fn index_path_tail(&mut self, path: PathId, from: usize) {
        let steps: Vec<(u64, usize)> = (from..self.paths[path].step_count())
            .map(|rank| (self.paths[path].step(rank).0, rank))
            .collect();
        for (id, rank) in steps {
            let node_rank = self.ids.select(0, id).unwrap();
            self.occurrences.append(node_rank, path, rank);
        }
    }

    // Removes the node from every structure except the paths. The caller is
    // responsible for rewriting or unlinking the visiting steps first.
    fn destroy_node_structure(&mut self, rank: usize, id: u64) {
        // Adjacency entries referencing the node, wherever they live.
        let mut removed = 0;
        while let Some(i) = self.edges_fwd.select(0, id) {
            self.edges_fwd.remove(i);
            self.inv_fwd.remove(i);
            removed += 1;
        }
        while let Some(i) = self.edges_rev.select(0, id) {
            self.edges_rev.remove(i);
            self.inv_rev.remove(i);
            removed += 1;
        }

        // The node's own adjacency records.
        let start = self.edges_fwd.select(rank, 0).unwrap();
        self.edges_fwd.remove(start);
        self.inv_fwd.remove(start);
        while start < self.edges_fwd.len() && self.edges_fwd.at(start) != 0 {
            self.edges_fwd.remove(start);
            self.inv_fwd.remove(start);
            removed += 1;
        }
        let start = self.edges_rev.select(rank, 0).unwrap();
        self.edges_rev.remove(start);
        self.inv_rev.remove(start);
        while start < self.edges_rev.len() && self.edges_rev.at(start) != 0 {
            self.edges_rev.remove(start);
            self.inv_rev.remove(start);
            removed += 1;
        }

        // Every edge contributes exactly two adjacency entries.
        debug_assert!(removed % 2 == 0, "Odd number of adjacency entries for node {}", id);
        self.edge_count -= removed / 2;

        // The sequence record.
        let start = self.sequences.select(rank, 0).unwrap();
        self.sequences.remove(start);
        while start < self.sequences.len() && self.sequences.at(start) != 0 {
            self.sequences.remove(start);
        }

        self.occurrences.remove_record(rank);
        self.ids.remove(rank);
    }
}

//-----------------------------------------------------------------------------

fn find_in_record(record: &WaveletTree, flags: &BitVector, rank: usize, value: u64, inv: bool) -> Option<usize> {
    let mut i = record.select(rank, 0).unwrap() + 1;
    while i < record.len() {
        let v = record.at(i);
        if v == 0 {
            return None;
        }
        if v == value && flags.get(i) == inv {
            return Some(i);
        }
        i += 1;
    }
    None
}

//-----------------------------------------------------------------------------
