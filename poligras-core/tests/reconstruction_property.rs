//! Property-based check of the reconstruction law and the `m <= M/2`
//! density rule over small randomly generated graphs and partitions.

use std::collections::{HashMap, HashSet};

use poligras_core::{EdgeRecord, GraphStore, MergeState, NodeId, Parameters, SummaryEncoder};
use proptest::prelude::*;

fn params() -> Parameters {
    Parameters {
        counts: 1,
        group_size: 4,
        hidden_size1: 2,
        hidden_size2: 2,
        lr: 0.001,
        dropout: 0.0,
    }
}

fn canon(a: u64, b: u64) -> (u64, u64) {
    if a <= b { (a, b) } else { (b, a) }
}

fn reconstruct(out: &poligras_core::PoligrasOutput) -> HashSet<(u64, u64)> {
    let members: HashMap<&str, Vec<u64>> = out
        .artifacts
        .supernodes
        .members
        .iter()
        .map(|(root, ms)| {
            (
                root.as_str(),
                ms.iter().map(|m| m.parse().expect("numeric id")).collect(),
            )
        })
        .collect();

    let negatives: HashSet<(u64, u64)> = out
        .artifacts
        .corrections
        .negative
        .iter()
        .map(|e| canon(e.source.parse().expect("numeric id"), e.target.parse().expect("numeric id")))
        .collect();

    let mut edges: HashSet<(u64, u64)> = out
        .artifacts
        .corrections
        .positive
        .iter()
        .map(|e| canon(e.source.parse().expect("numeric id"), e.target.parse().expect("numeric id")))
        .collect();

    for superedge in &out.graphs.summary.edges {
        let a = members.get(superedge.source.as_str()).expect("known supernode");
        if superedge.source == superedge.target {
            for i in 0..a.len() {
                for j in (i + 1)..a.len() {
                    let pair = canon(a[i], a[j]);
                    if !negatives.contains(&pair) {
                        edges.insert(pair);
                    }
                }
            }
        } else {
            let b = members.get(superedge.target.as_str()).expect("known supernode");
            for &u in a {
                for &v in b {
                    let pair = canon(u, v);
                    if !negatives.contains(&pair) {
                        edges.insert(pair);
                    }
                }
            }
        }
    }

    edges
}

/// Builds a small graph and a partition of its nodes from `n` (node count),
/// `edge_flags` (one bool per unordered pair, in lexicographic order), and
/// `group_of` (each node's group index, reduced modulo `n`).
fn build_fixture(n: usize, edge_flags: &[bool], group_of: &[usize]) -> (GraphStore, MergeState) {
    let mut original = GraphStore::new(false);
    for i in 0..n {
        original.ensure_node(NodeId::new(i as u64));
    }
    let mut flag_index = 0;
    for i in 0..n {
        for j in (i + 1)..n {
            let include = edge_flags.get(flag_index).copied().unwrap_or(false);
            flag_index += 1;
            if include {
                let _ = original.insert_edge(NodeId::new(i as u64), NodeId::new(j as u64), EdgeRecord::new(1));
            }
        }
    }

    let mut groups: HashMap<usize, Vec<NodeId>> = HashMap::new();
    for i in 0..n {
        let group = group_of.get(i).copied().unwrap_or(0) % n;
        groups.entry(group).or_default().push(NodeId::new(i as u64));
    }

    let mut members = HashMap::new();
    let mut features = HashMap::new();
    for nodes in groups.into_values() {
        let root = *nodes.iter().min().expect("non-empty group");
        features.insert(root, vec![0.0]);
        members.insert(root, nodes);
    }

    (
        original.clone(),
        MergeState {
            graph: GraphStore::new(false),
            members,
            features,
            feat_dim: 1,
        },
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn reconstruction_law_holds_for_any_partition(
        n in 3usize..10,
        edge_flags in prop::collection::vec(any::<bool>(), 0..45),
        group_of in prop::collection::vec(any::<usize>(), 0..10),
    ) {
        let (original, state) = build_fixture(n, &edge_flags, &group_of);
        let out = SummaryEncoder::encode(
            &original,
            &state,
            "prop".to_owned(),
            "run-1".to_owned(),
            params(),
            vec![],
            0,
            0,
        );

        let expected: HashSet<(u64, u64)> = original
            .iter_edges()
            .filter(|&(a, b, _)| a <= b)
            .map(|(a, b, _)| (a.get(), b.get()))
            .collect();

        prop_assert_eq!(reconstruct(&out), expected);
    }

    #[test]
    fn every_superedge_clears_the_density_threshold(
        n in 3usize..10,
        edge_flags in prop::collection::vec(any::<bool>(), 0..45),
        group_of in prop::collection::vec(any::<usize>(), 0..10),
    ) {
        let (original, state) = build_fixture(n, &edge_flags, &group_of);
        let out = SummaryEncoder::encode(
            &original,
            &state,
            "prop".to_owned(),
            "run-1".to_owned(),
            params(),
            vec![],
            0,
            0,
        );

        for edge in &out.graphs.summary.edges {
            prop_assert!(edge.density > 0.5, "materialized superedges must clear m > M/2");
        }
    }
}
