use super::*;

use crate::internal;
use crate::support::PathId;

//-----------------------------------------------------------------------------

fn path_sequences(graph: &PanGraph) -> Vec<(PathId, Vec<u8>)> {
    let mut result = Vec::new();
    graph.for_each_path_handle(|path| {
        result.push((path, graph.path_sequence(path)));
        true
    });
    result
}

fn node_sequences(graph: &PanGraph) -> Vec<Vec<u8>> {
    let mut result = Vec::new();
    graph.for_each_handle(|handle| {
        result.push(graph.get_sequence(handle));
        true
    });
    result.sort();
    result
}

//-----------------------------------------------------------------------------

#[test]
fn merge_a_chain() {
    let mut graph = PanGraph::new();
    let first = internal::create_node(&mut graph, 1, b"ACG");
    let second = internal::create_node(&mut graph, 2, b"TT");
    let third = internal::create_node(&mut graph, 3, b"GCA");
    graph.create_edge(first, second);
    graph.create_edge(second, third);
    let path = internal::create_path(&mut graph, "p1", &[
        (1, Orientation::Forward), (2, Orientation::Forward), (3, Orientation::Forward),
    ]);

    assert_eq!(unchop(&mut graph), 1, "Wrong number of merged chains");
    assert_eq!(graph.node_count(), 1, "Wrong node count after merging");
    assert_eq!(graph.edge_count(), 0, "Wrong edge count after merging");
    assert_eq!(node_sequences(&graph), vec![b"ACGTTGCA".to_vec()], "Wrong merged sequence");
    assert_eq!(graph.get_occurrence_count(path), 1, "Wrong step count after merging");
    assert_eq!(graph.path_sequence(path), b"ACGTTGCA".to_vec(), "Merging changed the path sequence");
    let step = graph.get_first_occurrence(path);
    assert!(!graph.get_occurrence(step).is_reverse(), "The merged step is not forward");
    internal::check_graph(&graph);
}

#[test]
fn bubble_is_unchanged() {
    // Both sides of a bubble end in nodes with degree 2, so nothing merges.
    let mut graph = PanGraph::new();
    let first = internal::create_node(&mut graph, 1, b"A");
    let second = internal::create_node(&mut graph, 2, b"C");
    let third = internal::create_node(&mut graph, 3, b"G");
    let fourth = internal::create_node(&mut graph, 4, b"T");
    graph.create_edge(first, second);
    graph.create_edge(first, third);
    graph.create_edge(second, fourth);
    graph.create_edge(third, fourth);
    let path = internal::create_path(&mut graph, "p", &[
        (1, Orientation::Forward), (2, Orientation::Forward), (4, Orientation::Forward),
    ]);

    assert_eq!(unchop(&mut graph), 0, "Merged a chain in a bubble");
    assert_eq!(graph.node_count(), 4, "The bubble lost nodes");
    assert_eq!(graph.edge_count(), 4, "The bubble lost edges");
    assert_eq!(graph.path_sequence(path), b"ACT".to_vec(), "The bubble path changed");
    internal::check_graph(&graph);
}

#[test]
fn merge_across_strands() {
    // The middle node participates in the chain in reverse orientation.
    let mut graph = PanGraph::new();
    let first = internal::create_node(&mut graph, 1, b"AC");
    let second = internal::create_node(&mut graph, 2, b"GT");
    let third = internal::create_node(&mut graph, 3, b"AA");
    graph.create_edge(first, second.flip());
    graph.create_edge(second.flip(), third);
    let forward = internal::create_path(&mut graph, "fw", &[
        (1, Orientation::Forward), (2, Orientation::Reverse), (3, Orientation::Forward),
    ]);
    let backward = internal::create_path(&mut graph, "bw", &[
        (3, Orientation::Reverse), (2, Orientation::Forward), (1, Orientation::Reverse),
    ]);
    let forward_before = graph.path_sequence(forward);
    let backward_before = graph.path_sequence(backward);
    assert_eq!(forward_before, b"ACACAA".to_vec(), "Wrong forward path sequence before merging");

    assert_eq!(unchop(&mut graph), 1, "Wrong number of merged chains");
    assert_eq!(graph.node_count(), 1, "Wrong node count after merging");
    assert_eq!(graph.path_sequence(forward), forward_before, "Merging changed the forward path sequence");
    assert_eq!(graph.path_sequence(backward), backward_before, "Merging changed the backward path sequence");
    assert_eq!(graph.get_occurrence_count(forward), 1, "Wrong forward step count");
    assert_eq!(graph.get_occurrence_count(backward), 1, "Wrong backward step count");
    let step = graph.get_occurrence(graph.get_first_occurrence(backward));
    assert!(step.is_reverse(), "The backward path does not visit the merged node in reverse");
    internal::check_graph(&graph);
}

#[test]
fn diverging_paths_block_merging() {
    // The node pair is connected by the only edge on the facing sides, but
    // one path ends between them.
    let mut graph = PanGraph::new();
    let first = internal::create_node(&mut graph, 1, b"AC");
    let second = internal::create_node(&mut graph, 2, b"GT");
    graph.create_edge(first, second);
    internal::create_path(&mut graph, "through", &[
        (1, Orientation::Forward), (2, Orientation::Forward),
    ]);
    internal::create_path(&mut graph, "ending", &[(1, Orientation::Forward)]);

    assert_eq!(unchop(&mut graph), 0, "Merged a chain with diverging paths");
    assert_eq!(graph.node_count(), 2, "The graph lost nodes");
    internal::check_graph(&graph);
}

#[test]
fn circular_chain() {
    let mut graph = PanGraph::new();
    let first = internal::create_node(&mut graph, 1, b"A");
    let second = internal::create_node(&mut graph, 2, b"C");
    graph.create_edge(first, second);
    graph.create_edge(second, first);

    assert_eq!(unchop(&mut graph), 1, "Wrong number of merged chains");
    assert_eq!(graph.node_count(), 1, "Wrong node count after merging a circle");
    assert_eq!(graph.edge_count(), 1, "Wrong edge count after merging a circle");
    assert_eq!(node_sequences(&graph), vec![b"AC".to_vec()], "Wrong merged sequence");
    let mut handle = None;
    graph.for_each_handle(|h| {
        handle = Some(h);
        true
    });
    let handle = handle.unwrap();
    assert!(graph.has_edge(handle, handle), "The circular chain did not merge into a self-loop");
    internal::check_graph(&graph);
}

#[test]
fn unchop_is_idempotent() {
    let mut graph = PanGraph::new();
    for (id, sequence) in [(1, b"AC".as_slice()), (2, b"G"), (3, b"T"), (4, b"AA"), (5, b"CG")] {
        internal::create_node(&mut graph, id, sequence);
    }
    // Two chains: 1-2 and 4-5, with a branch at 3.
    let handles: Vec<Handle> = (1..=5).map(|id| graph.get_handle(id, Orientation::Forward)).collect();
    graph.create_edge(handles[0], handles[1]);
    graph.create_edge(handles[1], handles[2]);
    graph.create_edge(handles[1], handles[3]);
    graph.create_edge(handles[3], handles[4]);
    let path = internal::create_path(&mut graph, "p", &[
        (1, Orientation::Forward), (2, Orientation::Forward), (4, Orientation::Forward), (5, Orientation::Forward),
    ]);
    let before = graph.path_sequence(path);

    let merged = unchop(&mut graph);
    assert!(merged > 0, "Nothing was merged");
    let nodes = node_sequences(&graph);
    let paths = path_sequences(&graph);
    assert_eq!(paths, vec![(path, before)], "Merging changed the path sequence");
    internal::check_graph(&graph);

    assert_eq!(unchop(&mut graph), 0, "The second pass merged more chains");
    assert_eq!(node_sequences(&graph), nodes, "The second pass changed the nodes");
    assert_eq!(path_sequences(&graph), paths, "The second pass changed the paths");
    internal::check_graph(&graph);
}

#[test]
fn concat_nodes_directly() {
    let mut graph = PanGraph::new();
    let first = internal::create_node(&mut graph, 1, b"GAT");
    let second = internal::create_node(&mut graph, 2, b"TACA");
    graph.create_edge(first, second);

    let merged = concat_nodes(&mut graph, &[first, second]);
    assert_eq!(graph.get_sequence(merged), b"GATTACA".to_vec(), "Wrong concatenated sequence");
    assert_eq!(graph.node_count(), 1, "Wrong node count after concatenation");
    internal::check_graph(&graph);
}

#[test]
fn component_discovery() {
    let mut graph = PanGraph::new();
    for (id, sequence) in [(1, b"A".as_slice()), (2, b"C"), (3, b"G"), (4, b"T")] {
        internal::create_node(&mut graph, id, sequence);
    }
    let handles: Vec<Handle> = (1..=4).map(|id| graph.get_handle(id, Orientation::Forward)).collect();
    graph.create_edge(handles[0], handles[1]);
    graph.create_edge(handles[1], handles[2]);
    graph.create_edge(handles[2], handles[3]);

    let components = simple_components(&graph, 2);
    assert_eq!(components.len(), 1, "Wrong number of components");
    assert_eq!(components[0], handles, "Wrong component members");

    // The same chain is found when singletons are allowed.
    let singletons = simple_components(&graph, 1);
    assert_eq!(singletons, components, "Wrong components with singletons allowed");
}

#[test]
fn threaded_unchop() {
    let mut graph = PanGraph::new();
    let mut previous: Option<Handle> = None;
    for id in 1..=20 {
        let handle = internal::create_node(&mut graph, id, b"ACGT");
        if let Some(prev) = previous {
            graph.create_edge(prev, handle);
        }
        previous = Some(handle);
    }
    let params = UnchopParameters { threads: 4, progress: false };
    assert_eq!(unchop_with_parameters(&mut graph, &params), 1, "Wrong number of merged chains");
    assert_eq!(graph.node_count(), 1, "Wrong node count after threaded merging");
    assert_eq!(node_sequences(&graph), vec![b"ACGT".repeat(20)], "Wrong merged sequence");
    internal::check_graph(&graph);
}

//-----------------------------------------------------------------------------
