//! Chain contraction: merging simple chains of nodes into single nodes.
//!
//! A *mergeable chain* is a maximal run of handles where every consecutive
//! pair is connected by the only edge on the facing sides, and every path
//! crossing the run visits both handles consecutively on the same strand.
//! Contracting such a chain into one node with the concatenated sequence
//! changes neither the local topology of the graph nor the sequence of any
//! embedded path.
//!
//! [`unchop`] contracts every mergeable chain in the graph. The operation is
//! idempotent: running it on its own output finds nothing left to merge.

use crate::PanGraph;
use crate::support::{Handle, Orientation};

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

#[cfg(test)]
mod tests;

//-----------------------------------------------------------------------------

/// Parameters for [`unchop_with_parameters`].
#[derive(Clone, Debug)]
pub struct UnchopParameters {
    /// Number of worker threads for validating the discovered chains.
    pub threads: usize,

    /// Print progress information to stderr.
    pub progress: bool,
}

impl Default for UnchopParameters {
    fn default() -> Self {
        UnchopParameters { threads: 1, progress: false }
    }
}

//-----------------------------------------------------------------------------

// The unique right-hand neighbor of the handle, if the degree is exactly 1.
fn unique_right_neighbor(graph: &PanGraph, handle: Handle) -> Option<Handle> {
    let mut result = None;
    let mut count = 0;
    graph.follow_edges(handle, false, |next| {
        result = Some(next);
        count += 1;
        count < 2
    });
    if count == 1 { result } else { None }
}

fn unique_left_neighbor(graph: &PanGraph, handle: Handle) -> Option<Handle> {
    let mut result = None;
    let mut count = 0;
    graph.follow_edges(handle, true, |next| {
        result = Some(next);
        count += 1;
        count < 2
    });
    if count == 1 { result } else { None }
}

// True if every path crossing `left` continues directly to `right` and the
// two handles are visited by the same number of steps. Together with the
// degree conditions this makes the pair safe to merge.
fn perfect_path_neighbors(graph: &PanGraph, left: Handle, right: Handle) -> bool {
    let mut expected = 0;
    let complete = graph.for_each_occurrence_on_handle(left, |step| {
        let handle = graph.get_occurrence(step);
        // A step on the opposite strand crosses the pair right to left.
        if handle == left {
            if !graph.has_next_occurrence(step) {
                return false;
            }
            if graph.get_occurrence(graph.get_next_occurrence(step)) != right {
                return false;
            }
        } else {
            if !graph.has_previous_occurrence(step) {
                return false;
            }
            if graph.get_occurrence(graph.get_previous_occurrence(step)) != right.flip() {
                return false;
            }
        }
        expected += 1;
        true
    });
    if !complete {
        return false;
    }

    let mut on_right = 0;
    graph.for_each_occurrence_on_handle(right, |_| {
        on_right += 1;
        true
    });
    on_right == expected
}

// True if the pair is safe to merge: the only edge on the facing sides and
// perfectly matching path traversals.
fn mergeable_pair(graph: &PanGraph, left: Handle, right: Handle) -> bool {
    if unique_right_neighbor(graph, left) != Some(right) {
        return false;
    }
    if unique_left_neighbor(graph, right) != Some(left) {
        return false;
    }
    perfect_path_neighbors(graph, left, right)
}

//-----------------------------------------------------------------------------

/// Enumerates the maximal mergeable chains of at least `min_size` handles,
/// in internal-rank order of their starting handles.
///
/// Every node belongs to at most one chain. A fully circular chain has no
/// canonical start; it is cut at its smallest-rank node.
pub fn simple_components(graph: &PanGraph, min_size: usize) -> Vec<Vec<Handle>> {
    let mut result = Vec::new();
    let mut visited: HashSet<u64> = HashSet::new();

    graph.for_each_handle(|handle| {
        let id = graph.get_id(handle);
        if visited.contains(&id) {
            return true;
        }
        let mut chain: Vec<Handle> = vec![handle];
        let mut members: HashSet<u64> = HashSet::new();
        members.insert(id);

        // Extend to the right, then to the left.
        loop {
            let last = *chain.last().unwrap();
            let next = match unique_right_neighbor(graph, last) {
                Some(next) => next,
                None => break,
            };
            if members.contains(&graph.get_id(next)) || !mergeable_pair(graph, last, next) {
                break;
            }
            members.insert(graph.get_id(next));
            chain.push(next);
        }
        loop {
            let first = chain[0];
            let prev = match unique_left_neighbor(graph, first) {
                Some(prev) => prev,
                None => break,
            };
            if members.contains(&graph.get_id(prev)) || !mergeable_pair(graph, prev, first) {
                break;
            }
            members.insert(graph.get_id(prev));
            chain.insert(0, prev);
        }

        visited.extend(members.iter());
        if chain.len() >= min_size {
            result.push(chain);
        }
        true
    });

    result
}

//-----------------------------------------------------------------------------

/// Concatenates a chain of handles into a single new node and returns a
/// forward handle to it.
///
/// The new node's sequence is the concatenation of the strand-oriented
/// sequences of the handles. External edges of the chain ends are rewired to
/// the new node, every path crossing the chain is rewritten to visit the new
/// node once, and the old nodes are destroyed.
///
/// The caller must ensure that the handles form a mergeable chain; see
/// [`simple_components`].
pub fn concat_nodes(graph: &mut PanGraph, nodes: &[Handle]) -> Handle {
    assert!(!nodes.is_empty(), "Cannot concatenate an empty chain");
    let first = nodes[0];
    let last = *nodes.last().unwrap();
    let node_ids: Vec<u64> = nodes.iter().map(|handle| graph.get_id(*handle)).collect();

    let mut sequence: Vec<u8> = Vec::new();
    for handle in nodes {
        sequence.extend_from_slice(&graph.get_sequence(*handle));
    }

    // External neighbors of the chain ends, by identifier: creating the new
    // node does not disturb them, but destroying the chain will.
    let mut left_neighbors: Vec<(u64, Orientation)> = Vec::new();
    graph.follow_edges(first, true, |next| {
        left_neighbors.push((graph.get_id(next), next.orientation()));
        true
    });
    let mut right_neighbors: Vec<(u64, Orientation)> = Vec::new();
    graph.follow_edges(last, false, |next| {
        right_neighbors.push((graph.get_id(next), next.orientation()));
        true
    });

    let new_handle = graph.create_handle(&sequence);
    let new_id = graph.get_id(new_handle);

    // References into the chain come from circular chains and from loops at
    // the chain ends; they map onto the corresponding side of the new node.
    let first_id = node_ids[0];
    let last_id = *node_ids.last().unwrap();
    for (id, orientation) in left_neighbors {
        let resolved = if id == last_id && orientation == last.orientation() {
            new_handle
        } else if id == first_id && orientation == first.orientation().flip() {
            new_handle.flip()
        } else {
            graph.get_handle(id, orientation)
        };
        graph.create_edge(resolved, new_handle);
    }
    for (id, orientation) in right_neighbors {
        let resolved = if id == first_id && orientation == first.orientation() {
            new_handle
        } else if id == last_id && orientation == last.orientation().flip() {
            new_handle.flip()
        } else {
            graph.get_handle(id, orientation)
        };
        graph.create_edge(new_handle, resolved);
    }

    // Rewrite the crossing paths. A path visits the chain either through the
    // first handle on its strand (a forward run) or through the flip of the
    // first handle as the last step of a backward run.
    let mut runs: Vec<(usize, usize, bool)> = Vec::new();
    graph.for_each_occurrence_on_handle(first, |step| {
        let handle = graph.get_occurrence(step);
        if handle == first {
            runs.push((step.path(), step.rank(), false));
        } else {
            runs.push((step.path(), step.rank() + 1 - nodes.len(), true));
        }
        true
    });
    runs.sort_unstable();
    for (path, start, reverse) in runs.into_iter().rev() {
        let replacement = if reverse { new_handle.flip() } else { new_handle };
        graph.rewrite_segment(path, start..start + nodes.len(), &[replacement]);
    }

    // The paths no longer visit the chain, so destruction is structural.
    for id in node_ids {
        let handle = graph.get_handle(id, Orientation::Forward);
        graph.destroy_handle(handle);
    }

    graph.get_handle(new_id, Orientation::Forward)
}

//-----------------------------------------------------------------------------

/// Contracts every mergeable chain in the graph and returns the number of
/// chains merged.
pub fn unchop(graph: &mut PanGraph) -> usize {
    unchop_with_parameters(graph, &UnchopParameters::default())
}

/// Contracts every mergeable chain in the graph and returns the number of
/// chains merged.
///
/// Chain discovery and merging are sequential; the discovered chains are
/// re-validated pairwise using the worker threads before any mutation.
pub fn unchop_with_parameters(graph: &mut PanGraph, parameters: &UnchopParameters) -> usize {
    let components = simple_components(graph, 2);
    if parameters.progress {
        let nodes: usize = components.iter().map(|chain| chain.len()).sum();
        eprintln!("Found {} mergeable chains covering {} nodes", components.len(), nodes);
    }
    if components.is_empty() {
        return 0;
    }

    validate_chains(graph, &components, parameters.threads);

    // Merging a chain renumbers the internal ranks behind the destroyed
    // nodes, so the remaining chains are re-resolved by identifier.
    let by_id: Vec<Vec<(u64, Orientation)>> = components
        .iter()
        .map(|chain| chain.iter().map(|handle| (graph.get_id(*handle), handle.orientation())).collect())
        .collect();

    let mut merged = 0;
    for chain in by_id.iter() {
        let handles: Vec<Handle> = chain
            .iter()
            .map(|(id, orientation)| graph.get_handle(*id, *orientation))
            .collect();
        concat_nodes(graph, &handles);
        merged += 1;
    }
    if parameters.progress {
        eprintln!("Merged {} chains", merged);
    }
    merged
}

// Re-checks every consecutive pair of every chain before mutation starts.
// The workers only read the graph.
fn validate_chains(graph: &PanGraph, chains: &[Vec<Handle>], threads: usize) {
    let threads = threads.max(1);
    let chunk = (chains.len() + threads - 1) / threads;
    let failed = AtomicBool::new(false);
    thread::scope(|scope| {
        for thread in 0..threads {
            let low = thread * chunk;
            let high = ((thread + 1) * chunk).min(chains.len());
            if low >= high {
                break;
            }
            let failed = &failed;
            scope.spawn(move || {
                for chain in &chains[low..high] {
                    for pair in chain.windows(2) {
                        if !mergeable_pair(graph, pair[0], pair[1]) {
                            failed.store(true, Ordering::Relaxed);
                            return;
                        }
                    }
                }
            });
        }
    });
    assert!(!failed.load(Ordering::Relaxed), "Chain validation failed; the graph changed during unchop");
}

//-----------------------------------------------------------------------------
