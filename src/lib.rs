//! # Pangraph: a mutable in-memory pangenome variation graph
//!
//! This crate stores a bidirected sequence graph with embedded paths and
//! keeps it mutable. Every node carries a DNA sequence and a stable external
//! identifier; every edge connects two node sides and understands reverse
//! complementation; every path is a named walk over oriented nodes. The
//! store answers random-access queries (handle to sequence, handle to
//! neighbors, path to steps, step to handle, node to the steps visiting it)
//! and supports mutation: adding and removing nodes, edges, and paths,
//! splitting a node, reverse-complementing a node in place, and contracting
//! chains of nodes.
//!
//! The graph lives in a constellation of dynamic succinct structures. A
//! growing, mutable graph does not fit the usual static rank/select
//! dictionaries, so the crate brings its own dynamic variants:
//!
//! * [`BitVector`]: a packed bit sequence with rank, select, insert, and
//!   remove in logarithmic time.
//! * [`WaveletTree`]: an integer sequence with the same operations, built
//!   from bitvectors, one per symbol bit.
//! * [`NameIndex`]: a searchable catalog of path names.
//!
//! On top of these, [`PanGraph`] packs external identifiers, node sequences,
//! and adjacency lists into sentinel-delimited records, and keeps an
//! inverted index ([`OccurrenceIndex`]) from every node to the path steps
//! visiting it. All mutations keep the structures consistent, so path
//! queries stay cheap no matter how the graph was edited.
//!
//! See [`unchop`] for the chain-contraction algorithm built on the public
//! interface.
//!
//! ### Basic concepts
//!
//! Nodes are accessed by [`Handle`]s packing an internal rank and an
//! [`Orientation`]. Internal ranks stay contiguous, so they are renumbered
//! when a node is destroyed; the documentation of each mutating operation
//! lists the handles it invalidates. Path steps are accessed by
//! [`StepHandle`]s, which stay valid until the path is next mutated or a
//! node it visits is destroyed.
//!
//! The store is single-writer, multi-reader, and does no locking of its
//! own. Parallel iteration over the nodes is read-only; callers must keep
//! mutations out of it.

pub mod bitvector;
pub mod graph;
pub mod names;
pub mod occurrences;
pub mod path;
pub mod support;
pub mod unchop;
pub mod wavelet;

pub use bitvector::BitVector;
pub use graph::PanGraph;
pub use names::NameIndex;
pub use occurrences::OccurrenceIndex;
pub use path::PathStore;
pub use support::{Handle, Orientation, PathId, StepHandle};
pub use wavelet::WaveletTree;

#[cfg(test)]
mod internal;
