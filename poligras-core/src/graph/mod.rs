//! Graph store (C1): adjacency-indexed storage for supernodes and the
//! materialized edges between them.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::error::{PoligrasError, Result};
use crate::ids::NodeId;

/// A single edge's weight and materialization state.
///
/// `materialized` mirrors `curr_graph`'s `if_true` flag in the original
/// reference: a materialized edge is drawn in the summary graph as a
/// superedge or kept as a plain edge; a non-materialized edge exists only
/// to carry an accumulated weight pending a future merge decision.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EdgeRecord {
    /// Accumulated edge weight (the number of original edges this entry
    /// represents, after zero or more merges).
    pub weight: u64,
    /// Whether this edge is drawn in the current summary.
    pub materialized: bool,
}

impl EdgeRecord {
    /// Builds a new materialized edge record with the given weight.
    #[rustfmt::skip]
    #[must_use]
    pub const fn new(weight: u64) -> Self { Self { weight, materialized: true } }
}

fn canonical_pair(directed: bool, a: NodeId, b: NodeId) -> (NodeId, NodeId) {
    if directed || a <= b { (a, b) } else { (b, a) }
}

/// Adjacency-indexed graph of supernodes, supporting O(1) edge lookup,
/// insertion, removal, and neighbor enumeration.
///
/// Undirected graphs canonicalize each edge key so `(a, b)` and `(b, a)`
/// refer to the same stored entry; directed graphs key on the exact
/// `(source, target)` pair.
#[derive(Clone, Debug)]
pub struct GraphStore {
    directed: bool,
    edges: HashMap<(NodeId, NodeId), EdgeRecord>,
    adjacency: HashMap<NodeId, HashSet<NodeId>>,
}

impl GraphStore {
    /// Creates an empty graph store.
    #[must_use]
    pub fn new(directed: bool) -> Self {
        Self {
            directed,
            edges: HashMap::new(),
            adjacency: HashMap::new(),
        }
    }

    /// Returns whether this store treats edges as directed.
    #[rustfmt::skip]
    #[must_use]
    pub const fn is_directed(&self) -> bool { self.directed }

    /// Ensures `node` has an adjacency entry, even if it has no edges yet.
    pub fn ensure_node(&mut self, node: NodeId) {
        self.adjacency.entry(node).or_default();
    }

    /// Returns the set of nodes with an adjacency entry.
    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.adjacency.keys().copied()
    }

    /// Number of distinct nodes known to the store.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.adjacency.len()
    }

    /// Looks up the edge record between `a` and `b`, if present.
    #[must_use]
    pub fn edge(&self, a: NodeId, b: NodeId) -> Option<&EdgeRecord> {
        self.edges.get(&canonical_pair(self.directed, a, b))
    }

    /// Looks up the edge record between `a` and `b`, mutably.
    pub fn edge_mut(&mut self, a: NodeId, b: NodeId) -> Option<&mut EdgeRecord> {
        self.edges.get_mut(&canonical_pair(self.directed, a, b))
    }

    /// Returns whether an edge between `a` and `b` exists.
    #[must_use]
    pub fn has_edge(&self, a: NodeId, b: NodeId) -> bool {
        self.edges.contains_key(&canonical_pair(self.directed, a, b))
    }

    /// Returns whether `a` carries a self-loop.
    #[must_use]
    pub fn has_self_loop(&self, a: NodeId) -> bool {
        self.has_edge(a, a)
    }

    /// Inserts a new edge. Returns [`PoligrasError::EdgeAlreadyExists`] if
    /// the edge is already present; callers must use [`Self::edge_mut`] to
    /// update an existing edge in place.
    pub fn insert_edge(&mut self, a: NodeId, b: NodeId, record: EdgeRecord) -> Result<()> {
        let key = canonical_pair(self.directed, a, b);
        if self.edges.contains_key(&key) {
            return Err(PoligrasError::EdgeAlreadyExists { a, b });
        }
        self.edges.insert(key, record);
        self.adjacency.entry(a).or_default().insert(b);
        if a != b {
            self.adjacency.entry(b).or_default().insert(a);
        } else {
            self.adjacency.entry(a).or_default();
        }
        if !self.directed {
            self.adjacency.entry(b).or_default();
        }
        Ok(())
    }

    /// Removes the edge between `a` and `b`, if present, returning its
    /// record.
    pub fn remove_edge(&mut self, a: NodeId, b: NodeId) -> Option<EdgeRecord> {
        let key = canonical_pair(self.directed, a, b);
        let removed = self.edges.remove(&key)?;
        if let Some(set) = self.adjacency.get_mut(&a) {
            set.remove(&b);
        }
        if a != b {
            if let Some(set) = self.adjacency.get_mut(&b) {
                set.remove(&a);
            }
        }
        Some(removed)
    }

    /// Removes `node` entirely, dropping every incident edge.
    pub fn remove_node(&mut self, node: NodeId) {
        let Some(neighbors) = self.adjacency.remove(&node) else {
            return;
        };
        for neighbor in neighbors {
            self.edges.remove(&canonical_pair(self.directed, node, neighbor));
            if let Some(set) = self.adjacency.get_mut(&neighbor) {
                set.remove(&node);
            }
        }
        self.edges.remove(&canonical_pair(self.directed, node, node));
    }

    /// Returns the neighbors of `node`, excluding any self-loop.
    pub fn neighbors(&self, node: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        self.adjacency
            .get(&node)
            .into_iter()
            .flatten()
            .copied()
            .filter(move |&n| n != node)
    }

    /// Iterates every stored edge as `(a, b, record)`.
    pub fn iter_edges(&self) -> impl Iterator<Item = (NodeId, NodeId, &EdgeRecord)> {
        self.edges.iter().map(|(&(a, b), record)| (a, b, record))
    }

    /// Number of distinct edge entries, including self-loops.
    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }
}
