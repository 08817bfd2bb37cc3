//! Graph/feature file loading and summary-snapshot persistence (§7).
//!
//! Input graph and feature files are `serde`-deserializable JSON containers
//! rather than the Python reference's `pickle` blobs. The
//! `{dataset}_graph_summary` snapshot persisted between the merge/encode
//! pipeline (C5/C6) and the dynamic update engine (C7) uses `bincode`
//! instead, since it is a large repeated binary artifact rather than a
//! human-inspectable document.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::InputError;
use crate::graph::{EdgeRecord, GraphStore};
use crate::ids::NodeId;
use crate::merge::MergeState;

/// A raw node id as it appears in a [`GraphFile`], before dense reindexing.
pub type RawNodeId = u64;

/// A raw edge as it appears in a [`GraphFile`].
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct RawEdge {
    /// Source endpoint, in the file's own id space.
    pub source: RawNodeId,
    /// Target endpoint, in the file's own id space.
    pub target: RawNodeId,
    /// Edge weight; defaults to 1 when omitted by the loader.
    #[serde(default = "default_weight")]
    pub weight: u64,
}

const fn default_weight() -> u64 {
    1
}

/// The `{dataset}_graph` input file: nodes, edges, and self-loops.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GraphFile {
    /// Whether the graph is directed.
    pub directed: bool,
    /// Node ids, in the order dense [`NodeId`]s are assigned.
    pub nodes: Vec<RawNodeId>,
    /// Edges between distinct nodes.
    pub edges: Vec<RawEdge>,
    /// Self-loop node ids, tracked separately (count only, never
    /// summarized).
    #[serde(default)]
    pub self_loops: Vec<RawNodeId>,
}

/// The `{dataset}_feat` input file: one feature row per node.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FeatureFile {
    /// Width of every row.
    pub dim: usize,
    /// Feature rows, in the same order as `GraphFile::nodes`.
    pub rows: Vec<Vec<f64>>,
}

fn read_to_string(path: &Path) -> Result<String, InputError> {
    fs::read_to_string(path).map_err(|_| InputError::NotFound {
        path: path.display().to_string(),
    })
}

/// Loads and validates a `{dataset}_graph` JSON file, assigning dense
/// [`NodeId`]s in the order nodes appear in `GraphFile::nodes`.
pub fn load_graph(path: &Path) -> Result<(GraphStore, Vec<RawNodeId>), InputError> {
    let text = read_to_string(path)?;
    let file: GraphFile = serde_json::from_str(&text).map_err(|err| InputError::Malformed {
        path: path.display().to_string(),
        reason: err.to_string(),
    })?;

    let mut store = GraphStore::new(file.directed);
    let index: std::collections::HashMap<RawNodeId, NodeId> = file
        .nodes
        .iter()
        .enumerate()
        .map(|(i, &raw)| (raw, NodeId::new(i as u64)))
        .collect();
    for &raw in &file.nodes {
        let Some(&id) = index.get(&raw) else {
            continue;
        };
        store.ensure_node(id);
    }

    for edge in &file.edges {
        let source = *index
            .get(&edge.source)
            .ok_or_else(|| InputError::Malformed {
                path: path.display().to_string(),
                reason: format!("edge references unknown node {}", edge.source),
            })?;
        let target = *index
            .get(&edge.target)
            .ok_or_else(|| InputError::Malformed {
                path: path.display().to_string(),
                reason: format!("edge references unknown node {}", edge.target),
            })?;
        if store.has_edge(source, target) {
            continue;
        }
        store
            .insert_edge(source, target, EdgeRecord::new(edge.weight))
            .map_err(|err| InputError::Malformed {
                path: path.display().to_string(),
                reason: err.to_string(),
            })?;
    }

    for &raw in &file.self_loops {
        if let Some(&id) = index.get(&raw)
            && !store.has_edge(id, id)
        {
            let _ = store.insert_edge(id, id, EdgeRecord::new(1));
        }
    }

    Ok((store, file.nodes))
}

/// Loads a `{dataset}_feat` JSON file and validates its row count against
/// the loaded graph's node count.
pub fn load_features(path: &Path, node_count: usize) -> Result<FeatureFile, InputError> {
    let text = read_to_string(path)?;
    let file: FeatureFile = serde_json::from_str(&text).map_err(|err| InputError::Malformed {
        path: path.display().to_string(),
        reason: err.to_string(),
    })?;
    if file.rows.len() != node_count {
        return Err(InputError::DimensionMismatch {
            rows: file.rows.len(),
            nodes: node_count,
        });
    }
    Ok(file)
}

/// On-disk snapshot format for the `{dataset}_graph_summary` file, read
/// by the dynamic update engine to resume from a prior merge/encode run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SummarySnapshot {
    /// Supergraph edges, keyed by the `(a, b)` supernode pair.
    pub edges: Vec<((u64, u64), EdgeRecord)>,
    /// Supernode membership, keyed by supernode id.
    pub members: Vec<(u64, Vec<u64>)>,
    /// Accumulated feature rows, keyed by supernode id.
    pub features: Vec<(u64, Vec<f64>)>,
    /// Feature row width.
    pub feat_dim: usize,
    /// Whether the supergraph is directed.
    pub directed: bool,
}

impl SummarySnapshot {
    /// Captures a [`MergeState`] into its serializable snapshot form.
    #[must_use]
    pub fn from_state(state: &MergeState) -> Self {
        Self {
            edges: state
                .graph
                .iter_edges()
                .filter(|&(a, b, _)| a <= b)
                .map(|(a, b, record)| ((a.get(), b.get()), record))
                .collect(),
            members: state
                .members
                .iter()
                .map(|(&id, members)| (id.get(), members.iter().map(NodeId::get).collect()))
                .collect(),
            features: state
                .features
                .iter()
                .map(|(&id, row)| (id.get(), row.clone()))
                .collect(),
            feat_dim: state.feat_dim,
            directed: state.graph.is_directed(),
        }
    }

    /// Rebuilds a [`MergeState`] from a deserialized snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`crate::error::PoligrasError`] if the snapshot's edge list
    /// contains a duplicate pair.
    pub fn into_state(self) -> crate::error::Result<MergeState> {
        let mut graph = GraphStore::new(self.directed);
        for ((a, b), record) in self.edges {
            let (a, b) = (NodeId::new(a), NodeId::new(b));
            graph.ensure_node(a);
            graph.ensure_node(b);
            graph.insert_edge(a, b, record)?;
        }
        let members = self
            .members
            .into_iter()
            .map(|(id, members)| {
                (
                    NodeId::new(id),
                    members.into_iter().map(NodeId::new).collect(),
                )
            })
            .collect();
        let features = self
            .features
            .into_iter()
            .map(|(id, row)| (NodeId::new(id), row))
            .collect();
        Ok(MergeState {
            graph,
            members,
            features,
            feat_dim: self.feat_dim,
        })
    }
}

/// Writes a [`MergeState`] to a `bincode`-encoded snapshot file, replacing
/// any prior snapshot at `path` only after the new one has been fully
/// written (write-to-temp-then-rename, so a crash mid-write never leaves a
/// truncated snapshot behind).
pub fn write_summary_snapshot(path: &Path, state: &MergeState) -> Result<(), InputError> {
    let snapshot = SummarySnapshot::from_state(state);
    let bytes = bincode::serialize(&snapshot).map_err(|err| InputError::Malformed {
        path: path.display().to_string(),
        reason: err.to_string(),
    })?;
    let tmp_path = path.with_extension("tmp");
    fs::write(&tmp_path, bytes).map_err(|_| InputError::NotFound {
        path: tmp_path.display().to_string(),
    })?;
    fs::rename(&tmp_path, path).map_err(|_| InputError::NotFound {
        path: path.display().to_string(),
    })?;
    Ok(())
}

/// Reads a `bincode`-encoded snapshot file back into a [`MergeState`].
pub fn read_summary_snapshot(path: &Path) -> Result<MergeState, InputError> {
    let bytes = fs::read(path).map_err(|_| InputError::NotFound {
        path: path.display().to_string(),
    })?;
    let snapshot: SummarySnapshot =
        bincode::deserialize(&bytes).map_err(|err| InputError::Malformed {
            path: path.display().to_string(),
            reason: err.to_string(),
        })?;
    snapshot.into_state().map_err(|err| InputError::Malformed {
        path: path.display().to_string(),
        reason: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn load_graph_rejects_unknown_edge_endpoints() {
        let dir = std::env::temp_dir();
        let path = dir.join("poligras_io_test_unknown_endpoint.json");
        fs::write(
            &path,
            r#"{"directed":false,"nodes":[0,1],"edges":[{"source":0,"target":5}]}"#,
        )
        .expect("write temp file");
        let err = load_graph(&path).expect_err("rejects unknown endpoint");
        assert!(matches!(err, InputError::Malformed { .. }));
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn load_features_rejects_row_count_mismatch() {
        let dir = std::env::temp_dir();
        let path = dir.join("poligras_io_test_feat_mismatch.json");
        fs::write(&path, r#"{"dim":1,"rows":[[0.0],[1.0]]}"#).expect("write temp file");
        let err = load_features(&path, 3).expect_err("rejects mismatch");
        assert!(matches!(err, InputError::DimensionMismatch { rows: 2, nodes: 3 }));
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn snapshot_round_trips_through_bincode() {
        let mut graph = GraphStore::new(false);
        let (a, b) = (NodeId::new(0), NodeId::new(1));
        graph.ensure_node(a);
        graph.ensure_node(b);
        graph
            .insert_edge(a, b, EdgeRecord::new(2))
            .expect("insert");
        let mut members = HashMap::new();
        members.insert(a, vec![a, b]);
        let mut features = HashMap::new();
        features.insert(a, vec![1.0, 2.0]);
        let state = MergeState {
            graph,
            members,
            features,
            feat_dim: 2,
        };

        let dir = std::env::temp_dir();
        let path = dir.join("poligras_io_test_snapshot.bin");
        write_summary_snapshot(&path, &state).expect("writes");
        let restored = read_summary_snapshot(&path).expect("reads");
        assert_eq!(restored.members.len(), 1);
        assert_eq!(restored.feat_dim, 2);
        let _ = fs::remove_file(&path);
    }
}
