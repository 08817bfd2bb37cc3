//! Summary encoder (C6): materializes superedges and correction sets from
//! the final supernode partition, and assembles the full output document.

use std::collections::{HashMap, HashSet};

use crate::graph::GraphStore;
use crate::ids::NodeId;
use crate::merge::MergeState;
use crate::output::{
    Artifacts, CorrectionBreakdown, CorrectionEdge, CorrectionSets, Graphs, InitialEdge,
    InitialGraph, InitialNode, Meta, NodeEdgeCount, Parameters, PoligrasOutput, Stats,
    SummaryCount, SummaryEdge, SummaryGraph, SummaryNode, SupernodeMembership, TimelineEntry,
};

fn canonical(a: NodeId, b: NodeId) -> (NodeId, NodeId) {
    if a <= b { (a, b) } else { (b, a) }
}

/// One materialized superedge or intra-cluster self-loop decision.
struct PairDecision {
    a: NodeId,
    b: NodeId,
    materialized_weight: Option<u64>,
    positives: Vec<(NodeId, NodeId)>,
    negatives: usize,
    possible: u64,
}

/// Applies the `m ≤ M/2` vs `m > M/2` density rule to one supernode pair.
fn decide_pair(
    a: NodeId,
    b: NodeId,
    original_edges: &[(NodeId, NodeId)],
    possible: u64,
) -> PairDecision {
    let m = original_edges.len() as u64;
    if 2 * m <= possible {
        PairDecision {
            a,
            b,
            materialized_weight: None,
            positives: original_edges.to_vec(),
            negatives: 0,
            possible,
        }
    } else {
        PairDecision {
            a,
            b,
            materialized_weight: Some(m),
            positives: Vec::new(),
            negatives: (possible - m) as usize,
            possible,
        }
    }
}

/// Encodes the final partition into the complete output document.
///
/// `original_graph` is `G0`; `state` holds the final supergraph/membership
/// after the merge engine halts; `dataset`/`run_id`/`parameters` populate
/// the `meta` block.
pub struct SummaryEncoder;

impl SummaryEncoder {
    /// Scans each supernode's members and their original neighbors to
    /// collect candidate partner supernodes, then applies the density rule
    /// to every inter-cluster pair and every intra-cluster (self-loop) set.
    #[tracing::instrument(skip(original_graph, state, timeline))]
    #[must_use]
    pub fn encode(
        original_graph: &GraphStore,
        state: &MergeState,
        dataset: String,
        run_id: String,
        parameters: Parameters,
        timeline: Vec<TimelineEntry>,
        total_reward: i64,
        self_loop_count: usize,
    ) -> PoligrasOutput {
        let node_to_super: HashMap<NodeId, NodeId> = state
            .members
            .iter()
            .flat_map(|(&root, members)| members.iter().map(move |&m| (m, root)))
            .collect();

        let mut inter_edges: HashMap<(NodeId, NodeId), Vec<(NodeId, NodeId)>> = HashMap::new();
        let mut intra_edges: HashMap<NodeId, Vec<(NodeId, NodeId)>> = HashMap::new();

        for node in original_graph.nodes() {
            let Some(&owner) = node_to_super.get(&node) else {
                continue;
            };
            for neighbor in original_graph.neighbors(node) {
                if neighbor < node {
                    continue;
                }
                let Some(&other_owner) = node_to_super.get(&neighbor) else {
                    continue;
                };
                if owner == other_owner {
                    intra_edges
                        .entry(owner)
                        .or_default()
                        .push(canonical(node, neighbor));
                } else {
                    inter_edges
                        .entry(canonical(owner, other_owner))
                        .or_default()
                        .push((node, neighbor));
                }
            }
        }

        let size_of = |id: NodeId| state.members.get(&id).map_or(0, |m| m.len() as u64);

        let mut superedges: Vec<SummaryEdge> = Vec::new();
        let mut positives: Vec<CorrectionEdge> = Vec::new();
        let mut negatives_count = 0_usize;
        let mut negatives: Vec<CorrectionEdge> = Vec::new();

        for (&(a, b), edges) in &inter_edges {
            let possible = size_of(a) * size_of(b);
            if possible == 0 {
                continue;
            }
            let decision = decide_pair(a, b, edges, possible);
            apply_inter_decision(
                &decision,
                &mut superedges,
                &mut positives,
                &mut negatives,
                &mut negatives_count,
                original_graph,
                &state.members,
            );
        }

        for (&owner, edges) in &intra_edges {
            let size = size_of(owner);
            let possible = size * (size.saturating_sub(1)) / 2;
            if possible == 0 {
                continue;
            }
            let decision = decide_pair(owner, owner, edges, possible);
            apply_intra_decision(
                &decision,
                &mut superedges,
                &mut positives,
                &mut negatives_count,
            );
        }

        let supernode_count = state.members.len();
        let initial_node_count = original_graph.node_count();
        let initial_edge_count = original_graph.edge_count();

        let stats = Stats {
            initial: NodeEdgeCount {
                nodes: initial_node_count,
                edges: initial_edge_count,
            },
            summary: SummaryCount {
                supernodes: supernode_count,
                superedges: superedges.len(),
                correction_edges: positives.len() + negatives_count,
            },
            compression_ratio: if initial_node_count + initial_edge_count == 0 {
                0.0
            } else {
                (supernode_count + superedges.len()) as f64
                    / (initial_node_count + initial_edge_count) as f64
            },
            total_reward,
            avg_supernode_size: if supernode_count == 0 {
                0.0
            } else {
                initial_node_count as f64 / supernode_count as f64
            },
            correction_breakdown: CorrectionBreakdown {
                positive: positives.len(),
                negative: negatives_count,
            },
        };

        let initial = InitialGraph {
            directed: original_graph.is_directed(),
            sampled: false,
            node_count: initial_node_count,
            edge_count: initial_edge_count,
            nodes: original_graph
                .nodes()
                .map(|n| InitialNode {
                    id: n.get(),
                    degree: original_graph.neighbors(n).count(),
                })
                .collect(),
            edges: original_graph
                .iter_edges()
                .filter(|&(a, b, _)| a <= b)
                .map(|(a, b, record)| InitialEdge {
                    source: a.get(),
                    target: b.get(),
                    weight: record.weight as f64,
                })
                .collect(),
        };

        let summary_nodes: Vec<SummaryNode> = state
            .members
            .iter()
            .map(|(&id, members)| SummaryNode {
                id: id.to_string(),
                size: members.len(),
            })
            .collect();

        let summary = SummaryGraph {
            directed: original_graph.is_directed(),
            sampled: false,
            node_count: supernode_count,
            edge_count: superedges.len(),
            correction_edge_count: positives.len() + negatives_count,
            nodes: summary_nodes,
            edges: superedges,
        };

        let members_out: HashMap<String, Vec<String>> = state
            .members
            .iter()
            .map(|(&id, members)| {
                (
                    id.to_string(),
                    members.iter().map(ToString::to_string).collect(),
                )
            })
            .collect();
        let node_to_supernode_out: HashMap<String, String> = node_to_super
            .iter()
            .map(|(&n, &s)| (n.to_string(), s.to_string()))
            .collect();

        PoligrasOutput {
            meta: Meta {
                dataset,
                algorithm: "Poligras".to_owned(),
                run_id,
                parameters,
            },
            stats,
            graphs: Graphs { initial, summary },
            timeline,
            artifacts: Artifacts {
                supernodes: SupernodeMembership {
                    members: members_out,
                    node_to_supernode: node_to_supernode_out,
                },
                corrections: CorrectionSets { positive: positives, negative: negatives },
                self_loops: self_loop_count,
            },
        }
    }
}

fn apply_inter_decision(
    decision: &PairDecision,
    superedges: &mut Vec<SummaryEdge>,
    positives: &mut Vec<CorrectionEdge>,
    negatives: &mut Vec<CorrectionEdge>,
    negatives_count: &mut usize,
    original_graph: &GraphStore,
    members: &HashMap<NodeId, Vec<NodeId>>,
) {
    if let Some(weight) = decision.materialized_weight {
        let density = weight as f64 / decision.possible as f64;
        superedges.push(SummaryEdge {
            source: decision.a.to_string(),
            target: decision.b.to_string(),
            weight,
            density,
        });
        let member_a = members.get(&decision.a).cloned().unwrap_or_default();
        let member_b = members.get(&decision.b).cloned().unwrap_or_default();
        let mut present_pairs: HashSet<(NodeId, NodeId)> = HashSet::new();
        for &u in &member_a {
            for v in original_graph.neighbors(u) {
                if member_b.contains(&v) {
                    present_pairs.insert(canonical(u, v));
                }
            }
        }
        *negatives_count += decision.negatives;
        for &u in &member_a {
            for &v in &member_b {
                let pair = canonical(u, v);
                if !present_pairs.contains(&pair) {
                    negatives.push(CorrectionEdge {
                        source: pair.0.to_string(),
                        target: pair.1.to_string(),
                    });
                }
            }
        }
    } else {
        for &(u, v) in &decision.positives {
            positives.push(CorrectionEdge {
                source: u.to_string(),
                target: v.to_string(),
            });
        }
    }
}

fn apply_intra_decision(
    decision: &PairDecision,
    superedges: &mut Vec<SummaryEdge>,
    positives: &mut Vec<CorrectionEdge>,
    negatives_count: &mut usize,
) {
    if let Some(weight) = decision.materialized_weight {
        let density = weight as f64 / decision.possible as f64;
        superedges.push(SummaryEdge {
            source: decision.a.to_string(),
            target: decision.a.to_string(),
            weight,
            density,
        });
        *negatives_count += decision.negatives;
    } else {
        for &(u, v) in &decision.positives {
            positives.push(CorrectionEdge {
                source: u.to_string(),
                target: v.to_string(),
            });
        }
    }
}
