//! Dynamic update engine (C7): incremental maintenance of a materialized
//! summary as edges are added to or removed from the original graph, without
//! re-running the merge engine.

use std::collections::{HashMap, HashSet};

use serde_json::Value;
use tracing::info;

use crate::error::UpdateStreamError;
use crate::output::{
    CorrectionEdge, CorrectionSets, PoligrasOutput, Stats, SummaryEdge,
};

/// A single validated edge update.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct EdgeUpdate {
    /// Whether this update adds or removes the edge.
    pub operation: UpdateOperation,
    /// Source original-node id, as given in the stream.
    pub source: String,
    /// Target original-node id, as given in the stream.
    pub target: String,
}

/// The kind of edge update.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
#[non_exhaustive]
pub enum UpdateOperation {
    /// The edge is newly present in the original graph.
    Add,
    /// The edge is no longer present in the original graph.
    Remove,
}

const OPERATION_KEYS: [&str; 4] = ["operation", "op", "action", "type"];
const SOURCE_KEYS: [&str; 3] = ["source", "u", "from"];
const TARGET_KEYS: [&str; 3] = ["target", "v", "to"];

fn field<'a>(entry: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|key| entry.get(key))
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Parses a JSON update stream into normalized [`EdgeUpdate`] records.
///
/// Accepts either a bare JSON array or an object with an `updates` field.
/// Operation and endpoint field names accept several common aliases.
pub fn parse_update_stream(raw: &str) -> Result<Vec<EdgeUpdate>, UpdateStreamError> {
    let payload: Value = serde_json::from_str(raw).map_err(|err| UpdateStreamError::Malformed {
        reason: err.to_string(),
    })?;

    let entries = match &payload {
        Value::Object(map) if map.contains_key("updates") => map
            .get("updates")
            .and_then(Value::as_array)
            .ok_or_else(|| UpdateStreamError::Malformed {
                reason: "'updates' field is not a JSON array".to_owned(),
            })?,
        Value::Array(items) => items,
        _ => {
            return Err(UpdateStreamError::Malformed {
                reason: "expected a JSON array or an object with an 'updates' list".to_owned(),
            });
        }
    };

    let mut updates = Vec::with_capacity(entries.len());
    for (index, entry) in entries.iter().enumerate() {
        if !entry.is_object() {
            return Err(UpdateStreamError::Malformed {
                reason: format!("update #{index} is not an object"),
            });
        }

        let op_token = field(entry, &OPERATION_KEYS)
            .and_then(Value::as_str)
            .ok_or(UpdateStreamError::MissingOperation { index })?;
        let operation = match op_token.trim().to_lowercase().as_str() {
            "add" | "addition" | "insert" | "insertion" => UpdateOperation::Add,
            "remove" | "removal" | "delete" | "deletion" => UpdateOperation::Remove,
            _ => {
                return Err(UpdateStreamError::UnknownOperation {
                    index,
                    token: op_token.to_owned(),
                });
            }
        };

        let source = field(entry, &SOURCE_KEYS)
            .and_then(scalar_to_string)
            .ok_or(UpdateStreamError::MissingEndpoint { index })?;
        let target = field(entry, &TARGET_KEYS)
            .and_then(scalar_to_string)
            .ok_or(UpdateStreamError::MissingEndpoint { index })?;

        updates.push(EdgeUpdate {
            operation,
            source,
            target,
        });
    }

    Ok(updates)
}

type PairKey = (String, String);
type EdgeKey = (String, String);

/// Mutable helper tracking summary state while a batch of updates is
/// applied; mirrors the membership/correction bookkeeping carried in
/// [`crate::output::Artifacts`].
struct DynamicState {
    members: HashMap<String, Vec<String>>,
    node_to_super: HashMap<String, String>,
    directed: bool,
    self_loops: usize,
    correction_plus: HashMap<PairKey, HashSet<EdgeKey>>,
    correction_minus: HashMap<PairKey, HashSet<EdgeKey>>,
    superedges: HashSet<PairKey>,
}

impl DynamicState {
    fn from_output(output: &PoligrasOutput) -> Self {
        let members = output.artifacts.supernodes.members.clone();
        let node_to_super = output.artifacts.supernodes.node_to_supernode.clone();
        let directed = output.graphs.initial.directed;
        let self_loops = output.artifacts.self_loops;

        let mut correction_plus = HashMap::new();
        for edge in &output.artifacts.corrections.positive {
            if let (Some(su), Some(sv)) = (
                node_to_super.get(&edge.source),
                node_to_super.get(&edge.target),
            ) {
                let pair = pair_key(directed, su, sv);
                correction_plus
                    .entry(pair)
                    .or_insert_with(HashSet::new)
                    .insert(edge_key(directed, &edge.source, &edge.target));
            }
        }

        let mut correction_minus = HashMap::new();
        for edge in &output.artifacts.corrections.negative {
            if let (Some(su), Some(sv)) = (
                node_to_super.get(&edge.source),
                node_to_super.get(&edge.target),
            ) {
                let pair = pair_key(directed, su, sv);
                correction_minus
                    .entry(pair)
                    .or_insert_with(HashSet::new)
                    .insert(edge_key(directed, &edge.source, &edge.target));
            }
        }

        let superedges = output
            .graphs
            .summary
            .edges
            .iter()
            .map(|edge| pair_key(directed, &edge.source, &edge.target))
            .collect();

        Self {
            members,
            node_to_super,
            directed,
            self_loops,
            correction_plus,
            correction_minus,
            superedges,
        }
    }

    fn possible_edges(&self, super_u: &str, super_v: &str) -> u64 {
        let size_u = self.members.get(super_u).map_or(0, Vec::len) as u64;
        let size_v = self.members.get(super_v).map_or(0, Vec::len) as u64;
        if super_u == super_v {
            if size_u < 2 {
                return 0;
            }
            if self.directed {
                size_u * (size_u - 1)
            } else {
                size_u * (size_u - 1) / 2
            }
        } else {
            size_u * size_v
        }
    }

    fn iterate_pairs(&self, super_u: &str, super_v: &str) -> Vec<EdgeKey> {
        let empty = Vec::new();
        let nodes_u = self.members.get(super_u).unwrap_or(&empty);
        let nodes_v = self.members.get(super_v).unwrap_or(&empty);
        let mut out = Vec::new();
        if super_u == super_v {
            for (i, u) in nodes_u.iter().enumerate() {
                for v in nodes_u.iter().skip(i + 1) {
                    out.push(edge_key(self.directed, u, v));
                }
            }
        } else {
            for u in nodes_u {
                for v in nodes_v {
                    out.push(edge_key(self.directed, u, v));
                }
            }
        }
        out
    }

    fn apply(&mut self, update: &EdgeUpdate, index: usize) -> Result<(), UpdateStreamError> {
        if update.source == update.target {
            return Err(UpdateStreamError::SelfLoopUpdate { index });
        }
        let super_u = self
            .node_to_super
            .get(&update.source)
            .cloned()
            .ok_or_else(|| UpdateStreamError::UnknownNode {
                index,
                node: update.source.clone(),
            })?;
        let super_v = self
            .node_to_super
            .get(&update.target)
            .cloned()
            .ok_or_else(|| UpdateStreamError::UnknownNode {
                index,
                node: update.target.clone(),
            })?;

        let pair = pair_key(self.directed, &super_u, &super_v);
        let edge = edge_key(self.directed, &update.source, &update.target);

        match update.operation {
            UpdateOperation::Add => self.apply_addition(&pair, &edge, &super_u, &super_v),
            UpdateOperation::Remove => self.apply_removal(&pair, &edge, &super_u, &super_v),
        }
        Ok(())
    }

    fn apply_addition(&mut self, pair: &PairKey, edge: &EdgeKey, super_u: &str, super_v: &str) {
        if self.superedges.contains(pair) {
            if let Some(neg_edges) = self.correction_minus.get_mut(pair) {
                if neg_edges.remove(edge) {
                    info!(
                        pair = ?pair,
                        remaining = neg_edges.len(),
                        "resolved missing edge for superedge"
                    );
                    if neg_edges.is_empty() {
                        self.correction_minus.remove(pair);
                    }
                }
            }
            return;
        }

        let pos_edges = self.correction_plus.entry(pair.clone()).or_default();
        if !pos_edges.insert(edge.clone()) {
            return;
        }
        let count = pos_edges.len() as u64;
        info!(pair = ?pair, total_positives = count, "recorded positive correction");

        let possible = self.possible_edges(super_u, super_v);
        if possible > 0 && 2 * count > possible {
            self.promote_to_superedge(pair, super_u, super_v);
        }
    }

    fn apply_removal(&mut self, pair: &PairKey, edge: &EdgeKey, super_u: &str, super_v: &str) {
        if self.superedges.contains(pair) {
            let neg_edges = self.correction_minus.entry(pair.clone()).or_default();
            if !neg_edges.insert(edge.clone()) {
                return;
            }
            let missing = neg_edges.len() as u64;
            let possible = self.possible_edges(super_u, super_v);
            info!(pair = ?pair, missing, possible, "marked missing edge for superedge");

            if possible == 0 {
                return;
            }
            let actual = possible.saturating_sub(missing);
            if 2 * actual <= possible {
                self.demote_superedge(pair, super_u, super_v);
            }
            return;
        }

        let Some(pos_edges) = self.correction_plus.get_mut(pair) else {
            return;
        };
        if !pos_edges.remove(edge) {
            return;
        }
        info!(pair = ?pair, remaining = pos_edges.len(), "removed positive correction");
        if pos_edges.is_empty() {
            self.correction_plus.remove(pair);
        }
    }

    fn promote_to_superedge(&mut self, pair: &PairKey, super_u: &str, super_v: &str) {
        self.superedges.insert(pair.clone());
        let positive_lookup = self
            .correction_plus
            .get(pair)
            .cloned()
            .unwrap_or_default();
        let missing: HashSet<EdgeKey> = self
            .iterate_pairs(super_u, super_v)
            .into_iter()
            .filter(|candidate| !positive_lookup.contains(candidate))
            .collect();
        if missing.is_empty() {
            self.correction_minus.remove(pair);
        } else {
            self.correction_minus.insert(pair.clone(), missing);
        }
        self.correction_plus.remove(pair);
        info!(
            pair = ?pair,
            superedges = self.superedges.len(),
            "promoted pair to superedge"
        );
    }

    fn demote_superedge(&mut self, pair: &PairKey, super_u: &str, super_v: &str) {
        self.superedges.remove(pair);
        let negative_lookup = self
            .correction_minus
            .get(pair)
            .cloned()
            .unwrap_or_default();
        let positives: HashSet<EdgeKey> = self
            .iterate_pairs(super_u, super_v)
            .into_iter()
            .filter(|candidate| !negative_lookup.contains(candidate))
            .collect();
        if positives.is_empty() {
            self.correction_plus.remove(pair);
        } else {
            self.correction_plus.insert(pair.clone(), positives);
        }
        self.correction_minus.remove(pair);
        info!(
            pair = ?pair,
            superedges = self.superedges.len(),
            "demoted superedge to correction sets"
        );
    }

    fn build_summary_edges(&self) -> Vec<SummaryEdge> {
        let mut pairs: Vec<&PairKey> = self.superedges.iter().collect();
        pairs.sort();
        let mut edges = Vec::with_capacity(pairs.len());
        for pair in pairs {
            let possible = self.possible_edges(&pair.0, &pair.1);
            if possible == 0 {
                continue;
            }
            let missing = self.correction_minus.get(pair).map_or(0, HashSet::len) as u64;
            let actual = possible.saturating_sub(missing);
            edges.push(SummaryEdge {
                source: pair.0.clone(),
                target: pair.1.clone(),
                weight: actual,
                density: actual as f64 / possible as f64,
            });
        }
        edges
    }

    fn build_stats(&self, previous: &Stats) -> Stats {
        let positive_count: usize = self.correction_plus.values().map(HashSet::len).sum();
        let negative_count: usize = self.correction_minus.values().map(HashSet::len).sum();
        let correction_total = positive_count + negative_count;
        let supernode_count = self.members.len();
        let superedge_count = self.superedges.len();

        let denominator = previous.initial.nodes + previous.initial.edges;
        let compression_ratio = if denominator == 0 {
            0.0
        } else {
            (supernode_count + superedge_count) as f64 / denominator as f64
        };
        let total_reward = previous.initial.edges as i64
            - self.self_loops as i64
            - superedge_count as i64
            - correction_total as i64;

        Stats {
            initial: previous.initial,
            summary: crate::output::SummaryCount {
                supernodes: supernode_count,
                superedges: superedge_count,
                correction_edges: correction_total,
            },
            compression_ratio,
            total_reward,
            avg_supernode_size: if supernode_count == 0 {
                0.0
            } else {
                previous.initial.nodes as f64 / supernode_count as f64
            },
            correction_breakdown: crate::output::CorrectionBreakdown {
                positive: positive_count,
                negative: negative_count,
            },
        }
    }

    fn materialise(&self, mut output: PoligrasOutput) -> PoligrasOutput {
        let edges = self.build_summary_edges();
        output.graphs.summary.edge_count = edges.len();
        output.graphs.summary.node_count = self.members.len();
        output.graphs.summary.edges = edges;

        let stats = self.build_stats(&output.stats);
        output.graphs.summary.correction_edge_count = stats.summary.correction_edges;
        output.stats = stats;

        output.artifacts.supernodes.members = self.members.clone();
        output.artifacts.supernodes.node_to_supernode = self.node_to_super.clone();
        output.artifacts.corrections = CorrectionSets {
            positive: serialise_edges(&self.correction_plus),
            negative: serialise_edges(&self.correction_minus),
        };
        output.artifacts.self_loops = self.self_loops;

        output
    }
}

fn pair_key(directed: bool, a: &str, b: &str) -> PairKey {
    if directed || a == b {
        (a.to_owned(), b.to_owned())
    } else if a <= b {
        (a.to_owned(), b.to_owned())
    } else {
        (b.to_owned(), a.to_owned())
    }
}

fn edge_key(directed: bool, source: &str, target: &str) -> EdgeKey {
    if directed || source <= target {
        (source.to_owned(), target.to_owned())
    } else {
        (target.to_owned(), source.to_owned())
    }
}

fn serialise_edges(index: &HashMap<PairKey, HashSet<EdgeKey>>) -> Vec<CorrectionEdge> {
    let mut out: Vec<CorrectionEdge> = index
        .values()
        .flat_map(|set| set.iter())
        .map(|(source, target)| CorrectionEdge {
            source: source.clone(),
            target: target.clone(),
        })
        .collect();
    out.sort_by(|a, b| (&a.source, &a.target).cmp(&(&b.source, &b.target)));
    out
}

/// Applies a batch of updates to an existing summary, validating the whole
/// batch before mutating any state (stricter than, but compatible with, a
/// streaming apply: a single bad entry rejects the entire batch up front
/// rather than leaving a partially-applied summary behind).
#[tracing::instrument(skip(output, updates))]
pub fn apply_edge_updates(
    output: &PoligrasOutput,
    updates: &[EdgeUpdate],
) -> Result<PoligrasOutput, UpdateStreamError> {
    if updates.is_empty() {
        return Ok(output.clone());
    }

    let node_to_super = &output.artifacts.supernodes.node_to_supernode;
    for (index, update) in updates.iter().enumerate() {
        if update.source == update.target {
            return Err(UpdateStreamError::SelfLoopUpdate { index });
        }
        if !node_to_super.contains_key(&update.source) {
            return Err(UpdateStreamError::UnknownNode {
                index,
                node: update.source.clone(),
            });
        }
        if !node_to_super.contains_key(&update.target) {
            return Err(UpdateStreamError::UnknownNode {
                index,
                node: update.target.clone(),
            });
        }
    }

    let mut state = DynamicState::from_output(output);
    for (index, update) in updates.iter().enumerate() {
        state.apply(update, index)?;
    }
    Ok(state.materialise(output.clone()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::{
        Artifacts, CorrectionSets, Graphs, InitialGraph, Meta, NodeEdgeCount, Parameters,
        SummaryCount, SummaryGraph, SummaryNode, SupernodeMembership,
    };
    use std::collections::HashMap as Map;

    fn toy_output() -> PoligrasOutput {
        let mut members = Map::new();
        members.insert(
            "0".to_owned(),
            vec!["0".to_owned(), "1".to_owned(), "2".to_owned()],
        );
        members.insert("3".to_owned(), vec!["3".to_owned(), "4".to_owned()]);
        let mut node_to_supernode = Map::new();
        for n in ["0", "1", "2"] {
            node_to_supernode.insert(n.to_owned(), "0".to_owned());
        }
        for n in ["3", "4"] {
            node_to_supernode.insert(n.to_owned(), "3".to_owned());
        }

        PoligrasOutput {
            meta: Meta {
                dataset: "toy".to_owned(),
                algorithm: "Poligras".to_owned(),
                run_id: "2026-07-28T00:00:00Z".to_owned(),
                parameters: Parameters {
                    counts: 1,
                    group_size: 2,
                    hidden_size1: 2,
                    hidden_size2: 2,
                    lr: 0.001,
                    dropout: 0.0,
                },
            },
            stats: Stats {
                initial: NodeEdgeCount { nodes: 5, edges: 3 },
                summary: SummaryCount {
                    supernodes: 2,
                    superedges: 0,
                    correction_edges: 0,
                },
                compression_ratio: 0.0,
                total_reward: 0,
                avg_supernode_size: 2.5,
                correction_breakdown: crate::output::CorrectionBreakdown {
                    positive: 0,
                    negative: 0,
                },
            },
            graphs: Graphs {
                initial: InitialGraph {
                    directed: false,
                    sampled: false,
                    node_count: 5,
                    edge_count: 3,
                    nodes: vec![],
                    edges: vec![],
                },
                summary: SummaryGraph {
                    directed: false,
                    sampled: false,
                    node_count: 2,
                    edge_count: 0,
                    correction_edge_count: 0,
                    nodes: vec![
                        SummaryNode {
                            id: "0".to_owned(),
                            size: 3,
                        },
                        SummaryNode {
                            id: "3".to_owned(),
                            size: 2,
                        },
                    ],
                    edges: vec![],
                },
            },
            timeline: vec![],
            artifacts: Artifacts {
                supernodes: SupernodeMembership {
                    members,
                    node_to_supernode,
                },
                corrections: CorrectionSets {
                    positive: vec![],
                    negative: vec![],
                },
                self_loops: 0,
            },
        }
    }

    #[test]
    fn parses_aliased_fields() {
        let raw = r#"{"updates":[{"type":"Addition","from":"0","to":"3"}]}"#;
        let updates = parse_update_stream(raw).expect("parses");
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].operation, UpdateOperation::Add);
    }

    #[test]
    fn rejects_self_loop_updates() {
        let output = toy_output();
        let updates = vec![EdgeUpdate {
            operation: UpdateOperation::Add,
            source: "0".to_owned(),
            target: "0".to_owned(),
        }];
        let err = apply_edge_updates(&output, &updates).expect_err("rejects");
        assert!(matches!(err, UpdateStreamError::SelfLoopUpdate { index: 0 }));
    }

    #[test]
    fn enough_positive_additions_promote_a_pair_to_a_superedge() {
        let output = toy_output();
        let updates = vec![
            EdgeUpdate {
                operation: UpdateOperation::Add,
                source: "0".to_owned(),
                target: "3".to_owned(),
            },
            EdgeUpdate {
                operation: UpdateOperation::Add,
                source: "1".to_owned(),
                target: "3".to_owned(),
            },
            EdgeUpdate {
                operation: UpdateOperation::Add,
                source: "1".to_owned(),
                target: "4".to_owned(),
            },
            EdgeUpdate {
                operation: UpdateOperation::Add,
                source: "2".to_owned(),
                target: "3".to_owned(),
            },
        ];
        let result = apply_edge_updates(&output, &updates).expect("applies");
        assert_eq!(result.graphs.summary.edges.len(), 1);
        let edge = &result.graphs.summary.edges[0];
        assert_eq!(edge.weight, 4);
    }

    #[test]
    fn unknown_node_rejects_the_whole_batch() {
        let output = toy_output();
        let updates = vec![EdgeUpdate {
            operation: UpdateOperation::Add,
            source: "0".to_owned(),
            target: "missing".to_owned(),
        }];
        let err = apply_edge_updates(&output, &updates).expect_err("rejects");
        assert!(matches!(err, UpdateStreamError::UnknownNode { index: 0, .. }));
    }
}
