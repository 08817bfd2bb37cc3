//! Integration tests for the dynamic update engine: round-trip, promotion,
//! demotion, and whole-batch rejection.

use std::collections::HashMap as Map;

use poligras_core::{
    Artifacts, CorrectionBreakdown, CorrectionSets, EdgeUpdate, Graphs, InitialGraph, Meta,
    NodeEdgeCount, Parameters, PoligrasOutput, Stats, SummaryCount, SummaryEdge, SummaryGraph,
    SummaryNode, SupernodeMembership, UpdateOperation, apply_edge_updates, parse_update_stream,
};

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
            run_id: "run-1".to_owned(),
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
            correction_breakdown: CorrectionBreakdown {
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

fn add(source: &str, target: &str) -> EdgeUpdate {
    EdgeUpdate {
        operation: UpdateOperation::Add,
        source: source.to_owned(),
        target: target.to_owned(),
    }
}

fn remove(source: &str, target: &str) -> EdgeUpdate {
    EdgeUpdate {
        operation: UpdateOperation::Remove,
        source: source.to_owned(),
        target: target.to_owned(),
    }
}

fn sorted_pairs(edges: &[poligras_core::CorrectionEdge]) -> Vec<(String, String)> {
    let mut pairs: Vec<(String, String)> = edges
        .iter()
        .map(|e| {
            let mut pair = [e.source.clone(), e.target.clone()];
            pair.sort();
            (pair[0].clone(), pair[1].clone())
        })
        .collect();
    pairs.sort();
    pairs
}

#[test]
fn adding_then_removing_the_same_edge_round_trips() {
    let output = toy_output();
    let added = apply_edge_updates(&output, &[add("0", "3")]).expect("add applies");
    let restored = apply_edge_updates(&added, &[remove("0", "3")]).expect("remove applies");

    assert_eq!(
        sorted_pairs(&restored.artifacts.corrections.positive),
        sorted_pairs(&output.artifacts.corrections.positive)
    );
    assert_eq!(
        sorted_pairs(&restored.artifacts.corrections.negative),
        sorted_pairs(&output.artifacts.corrections.negative)
    );
    assert_eq!(
        restored.graphs.summary.edges.len(),
        output.graphs.summary.edges.len()
    );
}

#[test]
fn enough_additions_promote_a_sparse_pair_to_a_superedge() {
    let output = toy_output();
    let updates = vec![add("0", "3"), add("1", "3"), add("1", "4"), add("2", "3")];
    let result = apply_edge_updates(&output, &updates).expect("applies");

    assert_eq!(result.graphs.summary.edges.len(), 1);
    let edge = &result.graphs.summary.edges[0];
    assert_eq!(edge.weight, 4);
    assert!(result.artifacts.corrections.positive.is_empty());
}

#[test]
fn removing_below_the_threshold_demotes_a_superedge_back_to_corrections() {
    let output = toy_output();
    let promoted = apply_edge_updates(
        &output,
        &[add("0", "3"), add("1", "3"), add("1", "4"), add("2", "3")],
    )
    .expect("promotes");
    assert_eq!(promoted.graphs.summary.edges.len(), 1);

    let demoted = apply_edge_updates(&promoted, &[remove("0", "3"), remove("1", "3")])
        .expect("demotes");

    assert!(
        demoted.graphs.summary.edges.is_empty(),
        "removing a materialized pair drops its actual density to M/2 or below"
    );
    assert_eq!(demoted.artifacts.corrections.positive.len(), 2);
}

#[test]
fn a_batch_with_one_unknown_node_is_rejected_wholesale() {
    let output = toy_output();
    let updates = vec![add("0", "3"), add("1", "missing")];
    let err = apply_edge_updates(&output, &updates).expect_err("whole batch rejected");
    assert_eq!(
        err.code(),
        poligras_core::UpdateStreamErrorCode::UnknownNode
    );

    // The caller's original output is untouched: Rust's shared-borrow
    // signature already guarantees this, but re-deriving and re-applying a
    // known-good update against the same `output` value demonstrates it was
    // never partially mutated.
    let applied = apply_edge_updates(&output, &[add("0", "3")]).expect("still applies cleanly");
    assert_eq!(applied.artifacts.corrections.positive.len(), 1);
}

#[test]
fn alias_and_canonical_operation_tokens_parse_identically() {
    let canonical = parse_update_stream(r#"[{"operation":"add","source":"0","target":"3"}]"#)
        .expect("parses");
    let aliased = parse_update_stream(r#"[{"type":"Addition","from":"0","to":"3"}]"#)
        .expect("parses");
    assert_eq!(canonical, aliased);
}
