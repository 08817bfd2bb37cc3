//! Poligras core library: graph summarization via reinforcement-learned
//! supernode merging, with lossless reconstruction and incremental
//! maintenance under a dynamic edge stream.

pub mod dynamic;
pub mod encode;
pub mod error;
pub mod graph;
pub mod ids;
pub mod io;
pub mod merge;
pub mod output;
pub mod partition;
pub mod policy;
pub mod reward;
pub mod rng;

pub use crate::dynamic::{EdgeUpdate, UpdateOperation, apply_edge_updates, parse_update_stream};
pub use crate::encode::SummaryEncoder;
pub use crate::error::{
    InputError, InputErrorCode, PoligrasError, PoligrasErrorCode, Result, UpdateStreamError,
    UpdateStreamErrorCode,
};
pub use crate::graph::{EdgeRecord, GraphStore};
pub use crate::ids::NodeId;
pub use crate::io::{
    FeatureFile, GraphFile, RawEdge, RawNodeId, SummarySnapshot, load_features, load_graph,
    read_summary_snapshot, write_summary_snapshot,
};
pub use crate::merge::{MergeConfig, MergeEngine, MergeState};
pub use crate::output::{
    Artifacts, CorrectionBreakdown, CorrectionEdge, CorrectionSets, Graphs, InitialEdge,
    InitialGraph, InitialNode, Meta, NodeEdgeCount, Parameters, PoligrasOutput, Stats,
    SummaryCount, SummaryEdge, SummaryGraph, SummaryNode, SupernodeMembership, TimelineEntry,
    TimelineStats,
};
pub use crate::partition::partition_supernodes;
pub use crate::policy::{PolicyNetwork, Selection};
pub use crate::reward::{MergeOutcome, MergePatch, evaluate_merge};
pub use crate::rng::{RngPurpose, derive_seed, rng_for};
