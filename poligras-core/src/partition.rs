//! Group partitioner (C2): assigns supernodes to buckets the merge engine
//! evaluates one at a time.

use rand::seq::SliceRandom;

use crate::graph::GraphStore;
use crate::ids::NodeId;
use crate::rng::{RngPurpose, rng_for};

/// Draws a fresh permutation of `node_count` dense indices and exposes it as
/// a lookup `h(u)`.
struct Permutation {
    rank_of: Vec<u64>,
}

impl Permutation {
    fn draw(node_count: usize, seed: u64, draw: u64) -> Self {
        let mut order: Vec<u64> = (0..node_count as u64).collect();
        let mut rng = rng_for(seed, RngPurpose::Partition, draw);
        order.shuffle(&mut rng);
        let mut rank_of = vec![0_u64; node_count];
        for (rank, &node) in order.iter().enumerate() {
            if let Some(slot) = rank_of.get_mut(node as usize) {
                *slot = rank as u64;
            }
        }
        Self { rank_of }
    }

    fn rank(&self, node: NodeId) -> u64 {
        self.rank_of
            .get(node.get() as usize)
            .copied()
            .unwrap_or(u64::MAX)
    }
}

/// Computes `F(A) = min_{v in members} min_{u in N(v) ∪ {v}} h(u)` for a
/// single supernode's member set, against the static original graph.
fn closed_neighbourhood_min(
    members: &[NodeId],
    original_graph: &GraphStore,
    h: &Permutation,
) -> u64 {
    members
        .iter()
        .flat_map(|&v| original_graph.neighbors(v).chain(std::iter::once(v)))
        .map(|u| h.rank(u))
        .min()
        .unwrap_or(u64::MAX)
}

/// Partitions supernodes into `floor(n / bucket_size)` contiguous, ordered
/// by `F(A)` so structurally similar supernodes land together. Any
/// remainder is spread proportionally across all buckets (bucket `i` spans
/// `i*len/n .. (i+1)*len/n`) rather than dumped into the last one.
///
/// `members[i]` lists the original nodes owned by supernode index `i`;
/// `original_graph` is the static, never-mutated input graph `G0`.
/// `draw` should be incremented by the caller each time partitioning is
/// re-triggered so `h` is freshly redrawn.
#[must_use]
pub fn partition_supernodes(
    members: &[Vec<NodeId>],
    original_graph: &GraphStore,
    bucket_size: usize,
    seed: u64,
    draw: u64,
) -> Vec<Vec<usize>> {
    if members.is_empty() || bucket_size == 0 {
        return Vec::new();
    }
    let h = Permutation::draw(original_graph.node_count(), seed, draw);

    let mut ranked: Vec<(u64, usize)> = members
        .iter()
        .enumerate()
        .map(|(idx, m)| (closed_neighbourhood_min(m, original_graph, &h), idx))
        .collect();
    ranked.sort_by_key(|&(rank, _)| rank);

    let bucket_count = ranked.len() / bucket_size;
    if bucket_count == 0 {
        return vec![ranked.into_iter().map(|(_, idx)| idx).collect()];
    }

    let len = ranked.len();
    let n = bucket_count;
    (0..n)
        .map(|i| {
            let start = i * len / n;
            let end = (i + 1) * len / n;
            ranked[start..end].iter().map(|&(_, idx)| idx).collect()
        })
        .collect()
}
