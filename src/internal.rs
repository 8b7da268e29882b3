use crate::{PanGraph, Handle, Orientation, PathId};

use std::collections::HashMap;

//-----------------------------------------------------------------------------

// Graph construction utilities.

pub(crate) fn create_node(graph: &mut PanGraph, id: u64, sequence: &[u8]) -> Handle {
    let handle = graph.create_handle_with_id(sequence, id);
    assert!(handle.is_ok(), "Failed to create node {}: {}", id, handle.unwrap_err());
    handle.unwrap()
}

pub(crate) fn create_path(graph: &mut PanGraph, name: &str, steps: &[(u64, Orientation)]) -> PathId {
    let path = graph.create_path_handle(name);
    assert!(path.is_ok(), "Failed to create path {}: {}", name, path.unwrap_err());
    let path = path.unwrap();
    for (id, orientation) in steps {
        let handle = graph.get_handle(*id, *orientation);
        graph.append_occurrence(path, handle);
    }
    path
}

//-----------------------------------------------------------------------------

// Observation utilities.

pub(crate) fn neighbors(graph: &PanGraph, handle: Handle, go_left: bool) -> Vec<(u64, Orientation)> {
    let mut result = Vec::new();
    graph.follow_edges(handle, go_left, |next| {
        result.push((graph.get_id(next), next.orientation()));
        true
    });
    result
}

pub(crate) fn path_steps(graph: &PanGraph, path: PathId) -> Vec<(u64, Orientation)> {
    let mut result = Vec::new();
    graph.for_each_occurrence_in_path(path, |step| {
        let handle = graph.get_occurrence(step);
        result.push((graph.get_id(handle), handle.orientation()));
        true
    });
    result
}

pub(crate) fn node_ids(graph: &PanGraph) -> Vec<u64> {
    let mut result = Vec::new();
    graph.for_each_handle(|handle| {
        result.push(graph.get_id(handle));
        true
    });
    result
}

//-----------------------------------------------------------------------------

// Invariant checks.

// Every edge is visible from both endpoints with mirrored orientations.
pub(crate) fn check_edge_symmetry(graph: &PanGraph) {
    graph.for_each_handle(|forward| {
        for handle in [forward, forward.flip()] {
            for go_left in [false, true] {
                graph.follow_edges(handle, go_left, |next| {
                    // The dual view must list the handle among its neighbors.
                    let mut found = false;
                    graph.follow_edges(next, !go_left, |back| {
                        if back == handle {
                            found = true;
                        }
                        !found
                    });
                    assert!(found, "Edge from {} (left: {}) to {} is not mirrored", handle, go_left, next);
                    true
                });
            }
        }
        true
    });
}

// The degree of every side matches the number of neighbors listed for it.
pub(crate) fn check_degrees(graph: &PanGraph) {
    graph.for_each_handle(|forward| {
        for handle in [forward, forward.flip()] {
            for go_left in [false, true] {
                let listed = neighbors(graph, handle, go_left).len();
                assert_eq!(
                    graph.get_degree(handle, go_left), listed,
                    "Wrong degree for handle {} (left: {})", handle, go_left
                );
            }
        }
        true
    });
}

// The node-to-step index and the path stores agree exactly.
pub(crate) fn check_occurrences(graph: &PanGraph) {
    let mut pairs: HashMap<(PathId, usize), u64> = HashMap::new();
    graph.for_each_handle(|handle| {
        let id = graph.get_id(handle);
        graph.for_each_occurrence_on_handle(handle, |step| {
            let visited = graph.get_occurrence(step);
            assert_eq!(
                graph.get_id(visited), id,
                "Step {} indexed on node {} visits node {}", step, id, graph.get_id(visited)
            );
            let previous = pairs.insert((step.path(), step.rank()), id);
            assert!(previous.is_none(), "Step {} is indexed twice", step);
            true
        });
        true
    });

    let mut total_steps = 0;
    for path in 0..graph.get_path_count() {
        graph.for_each_occurrence_in_path(path, |step| {
            total_steps += 1;
            let handle = graph.get_occurrence(step);
            assert_eq!(
                pairs.get(&(path, step.rank())), Some(&graph.get_id(handle)),
                "Step {} is not indexed on the node it visits", step
            );
            true
        });
    }
    assert_eq!(pairs.len(), total_steps, "The occurrence index contains stale pairs");
}

pub(crate) fn check_graph(graph: &PanGraph) {
    check_edge_symmetry(graph);
    check_degrees(graph);
    check_occurrences(graph);
}

//-----------------------------------------------------------------------------
