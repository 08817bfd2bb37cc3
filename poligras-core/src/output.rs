//! Output types (§6): the exact `output.json` / `output_dynamic.json` shape
//! produced by the summary encoder (C6) and the dynamic update engine (C7).

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Run metadata and the hyperparameters used to produce this summary.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Meta {
    /// Dataset name, as given on the CLI.
    pub dataset: String,
    /// Always `"Poligras"`.
    pub algorithm: String,
    /// UTC ISO-8601 timestamp of the run.
    pub run_id: String,
    /// Hyperparameters used for this run.
    pub parameters: Parameters,
}

/// Hyperparameters recorded in [`Meta`].
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct Parameters {
    /// Number of outer merge-engine iterations (`--counts`).
    pub counts: u64,
    /// Bucket size used by the group partitioner (`--group_size`).
    pub group_size: usize,
    /// Policy network's first hidden layer width.
    pub hidden_size1: usize,
    /// Policy network's second hidden layer width.
    pub hidden_size2: usize,
    /// Adam learning rate.
    pub lr: f64,
    /// Dropout probability applied to the pairwise score matrix.
    pub dropout: f64,
}

/// Node and edge counts plus derived summary-quality metrics.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Stats {
    /// Node/edge counts of the original graph.
    pub initial: NodeEdgeCount,
    /// Supernode/superedge/correction-edge counts of the summary.
    pub summary: SummaryCount,
    /// `(supernodes + superedges + corrections) / (|V0| + |E0|)`.
    pub compression_ratio: f64,
    /// Sum of every accepted merge's reward.
    pub total_reward: i64,
    /// Mean number of original nodes per supernode.
    pub avg_supernode_size: f64,
    /// Count of positive/negative correction entries.
    pub correction_breakdown: CorrectionBreakdown,
}

/// A plain node/edge count pair.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct NodeEdgeCount {
    /// Node count.
    pub nodes: usize,
    /// Edge count.
    pub edges: usize,
}

/// Supernode/superedge/correction-edge counts for the summary graph.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct SummaryCount {
    /// Number of supernodes remaining after merging.
    pub supernodes: usize,
    /// Number of materialized superedges.
    pub superedges: usize,
    /// Total correction entries (positive + negative).
    pub correction_edges: usize,
}

/// Positive/negative correction-set sizes.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct CorrectionBreakdown {
    /// Number of must-add correction entries.
    pub positive: usize,
    /// Number of must-subtract correction entries.
    pub negative: usize,
}

/// A node in the initial graph view, with its original degree.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct InitialNode {
    /// Dense node index.
    pub id: u64,
    /// Degree in the original graph.
    pub degree: usize,
}

/// An edge in the initial graph view.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct InitialEdge {
    /// Source node index.
    pub source: u64,
    /// Target node index.
    pub target: u64,
    /// Edge weight (defaults to 1.0 if the input graph was unweighted).
    pub weight: f64,
}

/// The `graphs.initial` view: the original graph as loaded.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InitialGraph {
    /// Whether the original graph is directed.
    pub directed: bool,
    /// Whether this view was down-sampled for display (always `false` here;
    /// the core does not sample).
    pub sampled: bool,
    /// Node count.
    pub node_count: usize,
    /// Edge count.
    pub edge_count: usize,
    /// Node entries.
    pub nodes: Vec<InitialNode>,
    /// Edge entries.
    pub edges: Vec<InitialEdge>,
}

/// A supernode in the summary graph view.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SummaryNode {
    /// Supernode id, stringified.
    pub id: String,
    /// Number of original nodes this supernode represents.
    pub size: usize,
}

/// A materialized superedge in the summary graph view.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SummaryEdge {
    /// Source supernode id, stringified.
    pub source: String,
    /// Target supernode id, stringified.
    pub target: String,
    /// Number of original edges this superedge represents.
    pub weight: u64,
    /// `weight / possible_edges` for this supernode pair.
    pub density: f64,
}

/// The `graphs.summary` view: the compressed graph.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SummaryGraph {
    /// Whether the summary graph is directed.
    pub directed: bool,
    /// Always `false`; the summary is never sampled.
    pub sampled: bool,
    /// Supernode count.
    pub node_count: usize,
    /// Superedge count.
    pub edge_count: usize,
    /// Total correction-set entry count.
    pub correction_edge_count: usize,
    /// Supernode entries.
    pub nodes: Vec<SummaryNode>,
    /// Superedge entries.
    pub edges: Vec<SummaryEdge>,
}

/// Per-merge or per-batch statistics recorded in a [`TimelineEntry`].
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct TimelineStats {
    /// Zero-based index of this entry within the timeline.
    pub step_index: usize,
    /// The reward this merge realized.
    pub reward: i64,
    /// `(supernode_count + edge_count) / (node_count + edge_count_at_start)`.
    pub summarisation_ratio: f64,
    /// Original node count (constant across the timeline).
    pub node_count: usize,
    /// Current supergraph edge count.
    pub edge_count: usize,
    /// Current supernode count.
    pub supernode_count: usize,
    /// `2 * edge_count / supernode_count`.
    pub avg_degree: f64,
}

/// A single accepted merge, recorded for the frontend timeline view.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TimelineEntry {
    /// Root id of the absorbing supernode.
    pub n1: String,
    /// Root id of the absorbed supernode (no longer present afterward).
    pub n2: String,
    /// Snapshot statistics taken immediately after this merge.
    pub stats: TimelineStats,
}

/// The `artifacts.supernodes` block: full membership bookkeeping.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SupernodeMembership {
    /// Supernode id (stringified) to member original-node ids (stringified).
    pub members: HashMap<String, Vec<String>>,
    /// Original-node id (stringified) to owning supernode id (stringified).
    pub node_to_supernode: HashMap<String, String>,
}

/// A single correction-set entry.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CorrectionEdge {
    /// Source original-node id, stringified.
    pub source: String,
    /// Target original-node id, stringified.
    pub target: String,
}

/// The `artifacts.corrections` block: exact reconstruction bookkeeping.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CorrectionSets {
    /// Must-add edges (present in `G0`, absent from the materialized
    /// superedge).
    pub positive: Vec<CorrectionEdge>,
    /// Must-subtract edges (absent from `G0`, implied by a materialized
    /// superedge).
    pub negative: Vec<CorrectionEdge>,
}

/// The `artifacts` block.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Artifacts {
    /// Supernode membership bookkeeping.
    pub supernodes: SupernodeMembership,
    /// Positive/negative correction sets.
    pub corrections: CorrectionSets,
    /// Count of original self-loop edges (tracked but never summarized).
    pub self_loops: usize,
}

/// The complete `output.json` / `output_dynamic.json` document.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PoligrasOutput {
    /// Run metadata.
    pub meta: Meta,
    /// Summary-quality statistics.
    pub stats: Stats,
    /// Initial and summary graph views.
    pub graphs: Graphs,
    /// Per-merge timeline entries.
    pub timeline: Vec<TimelineEntry>,
    /// Membership, correction, and self-loop bookkeeping.
    pub artifacts: Artifacts,
}

/// The `graphs` block: both graph views side by side.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Graphs {
    /// The original graph, as loaded.
    pub initial: InitialGraph,
    /// The compressed summary graph.
    pub summary: SummaryGraph,
}
