//! Merge engine (C5): the outer/inner REINFORCE training loop that drives
//! supernode merges to completion.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use rand::rngs::SmallRng;
use tracing::instrument;

use crate::graph::GraphStore;
use crate::ids::NodeId;
use crate::output::TimelineEntry;
use crate::partition::partition_supernodes;
use crate::policy::{PolicyNetwork, SelectionCache};
use crate::reward::evaluate_merge;
use crate::rng::{RngPurpose, rng_for};

/// Hyperparameters controlling one merge-engine run, named after the CLI
/// flags they come from.
#[derive(Clone, Debug)]
pub struct MergeConfig {
    /// Outer-loop iteration count (`--counts`).
    pub outer_iterations: u64,
    /// Target bucket size for the group partitioner (`--group_size`).
    pub bucket_size: usize,
    /// Policy network's first hidden layer width (`--hidden_size1`).
    pub hidden1: usize,
    /// Policy network's second hidden layer width (`--hidden_size2`).
    pub hidden2: usize,
    /// Adam learning rate (`--lr`).
    pub lr: f64,
    /// Dropout probability (`--dropout`).
    pub dropout: f64,
    /// Adam weight decay (`--weight-decay`).
    pub weight_decay: f64,
    /// Consecutive non-improving inner iterations tolerated before leaving
    /// the inner loop (`--bad_counter`).
    pub bad_counter_limit: u64,
    /// Base RNG seed for this run.
    pub seed: u64,
    /// Optional directory for durable checkpoints between outer iterations.
    pub checkpoint_dir: Option<PathBuf>,
}

/// The mutable supergraph state the merge engine evolves: the live
/// supergraph, per-supernode membership, and per-supernode feature rows.
#[derive(Clone, Debug)]
pub struct MergeState {
    /// The live supergraph `H`.
    pub graph: GraphStore,
    /// Supernode id to its current original-node members.
    pub members: HashMap<NodeId, Vec<NodeId>>,
    /// Supernode id to its current feature row (row-wise sum of absorbed
    /// members' original feature rows).
    pub features: HashMap<NodeId, Vec<f64>>,
    /// Feature row width.
    pub feat_dim: usize,
}

impl MergeState {
    fn size_of(&self, id: NodeId) -> u64 {
        self.members.get(&id).map_or(0, |m| m.len() as u64)
    }

    fn supernode_ids(&self) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self.members.keys().copied().collect();
        ids.sort();
        ids
    }
}

fn ratio_for_iteration(outer_index: u64) -> f64 {
    if outer_index < 5 { 0.001 } else { 0.01 }
}

fn standardize(rewards: &[i64]) -> Option<Vec<f64>> {
    if rewards.len() < 2 {
        return None;
    }
    let values: Vec<f64> = rewards.iter().map(|&r| r as f64).collect();
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    let stddev = variance.sqrt();
    if stddev == 0.0 {
        return None;
    }
    let shift = mean.max(0.0);
    Some(values.iter().map(|v| (v - shift) / stddev).collect())
}

/// Drives the outer/inner REINFORCE loop described in spec §4.5 to
/// completion, mutating `state` in place and returning the accepted-merge
/// timeline.
pub struct MergeEngine {
    config: MergeConfig,
    policy: PolicyNetwork,
}

impl MergeEngine {
    /// Builds a merge engine with a freshly initialized policy network.
    #[must_use]
    pub fn new(config: MergeConfig, feat_dim: usize) -> Self {
        let mut seed_rng = rng_for(config.seed, RngPurpose::Policy, 0);
        let policy = PolicyNetwork::new(
            feat_dim,
            config.hidden1,
            config.hidden2,
            config.dropout,
            &mut seed_rng,
        );
        Self { config, policy }
    }

    /// Runs the full outer/inner loop against `original_graph` (the static
    /// `G0`, used only by the partitioner) and `state` (the live, mutated
    /// supergraph). `stop` is polled cooperatively; on cancellation the last
    /// committed best state is kept and in-flight rewards are discarded.
    #[instrument(skip(self, original_graph, state, stop))]
    pub fn fit(
        &mut self,
        original_graph: &GraphStore,
        mut state: MergeState,
        stop: &Arc<AtomicBool>,
    ) -> (MergeState, Vec<TimelineEntry>) {
        let mut timeline = Vec::new();
        let mut max_reward_by_inner_iter: i64 = 0;
        let mut partition_draw: u64 = 0;
        let mut policy_rng = rng_for(self.config.seed, RngPurpose::Policy, 1);
        let initial_node_count = original_graph.node_count();
        let initial_edge_count = original_graph.edge_count();

        let mut ids = state.supernode_ids();
        let mut members_snapshot: Vec<Vec<NodeId>> =
            ids.iter().map(|id| state.members.get(id).cloned().unwrap_or_default()).collect();
        let mut buckets = build_buckets(
            &ids,
            &members_snapshot,
            original_graph,
            self.config.bucket_size,
            self.config.seed,
            partition_draw,
        );

        for outer_index in 0..self.config.outer_iterations {
            if stop.load(Ordering::Relaxed) {
                break;
            }

            let mut best_state = state.clone();
            let mut best = 0_i64;
            let mut bad_counter = 0_u64;
            let ratio = ratio_for_iteration(outer_index);

            loop {
                if stop.load(Ordering::Relaxed) {
                    break;
                }
                state = best_state.clone();
                let mut count_reward: i64 = 0;
                let mut steps: Vec<(SelectionCache, f64)> = Vec::new();
                let mut raw_rewards: Vec<i64> = Vec::new();
                let mut pending_log_probs: Vec<(SelectionCache, i64)> = Vec::new();

                for bucket in &mut buckets {
                    if stop.load(Ordering::Relaxed) {
                        break;
                    }
                    if bucket.len() < 3 {
                        continue;
                    }
                    let Some((reward, accepted_col, endpoints)) =
                        attempt_bucket_merge(&mut state, bucket, &self.policy, &mut policy_rng)
                    else {
                        continue;
                    };
                    raw_rewards.push(reward.0);
                    pending_log_probs.push((reward.1, reward.0));
                    if reward.0 > 0 {
                        count_reward += reward.0;
                        if let Some(pos) = accepted_col {
                            bucket.remove(pos);
                        }
                        if let Some((n1, n2)) = endpoints {
                            record_merge(
                                &mut timeline,
                                &state,
                                reward.0,
                                n1,
                                n2,
                                initial_node_count,
                                initial_edge_count,
                            );
                        }
                    }
                }

                if let Some(standardized) = standardize(&raw_rewards) {
                    for ((cache, _), r_hat) in pending_log_probs.into_iter().zip(standardized) {
                        steps.push((cache, r_hat));
                    }
                    self.policy
                        .update(&steps, self.config.lr, self.config.weight_decay);
                }

                if (count_reward as f64) > (best as f64) * (1.0 + ratio) {
                    bad_counter = 0;
                    best = count_reward;
                    best_state = state.clone();
                    checkpoint(&self.config, &best_state);
                } else {
                    bad_counter += 1;
                }

                if bad_counter >= self.config.bad_counter_limit.max(1) {
                    break;
                }
                if buckets.iter().all(|b| b.len() < 3) {
                    break;
                }
            }

            state = best_state;

            if best > max_reward_by_inner_iter {
                max_reward_by_inner_iter = best;
            } else if max_reward_by_inner_iter > 0 && best * 3 < max_reward_by_inner_iter {
                partition_draw += 1;
                ids = state.supernode_ids();
                members_snapshot = ids.iter().map(|id| state.members.get(id).cloned().unwrap_or_default()).collect();
                buckets = build_buckets(
                    &ids,
                    &members_snapshot,
                    original_graph,
                    self.config.bucket_size,
                    self.config.seed,
                    partition_draw,
                );
                max_reward_by_inner_iter = 0;
            }
        }

        (state, timeline)
    }
}

fn build_buckets(
    ids: &[NodeId],
    members: &[Vec<NodeId>],
    original_graph: &GraphStore,
    bucket_size: usize,
    seed: u64,
    draw: u64,
) -> Vec<Vec<NodeId>> {
    let index_buckets = partition_supernodes(members, original_graph, bucket_size, seed, draw);
    index_buckets
        .into_iter()
        .map(|bucket| {
            bucket
                .into_iter()
                .filter_map(|idx| ids.get(idx).copied())
                .collect()
        })
        .collect()
}

/// Attempts one pick-and-evaluate step within `bucket`, returning the
/// reward and selection-cache on success (so the caller can accumulate it
/// into the REINFORCE batch), along with the bucket position to remove if
/// the merge is accepted.
fn attempt_bucket_merge(
    state: &mut MergeState,
    bucket: &[NodeId],
    policy: &PolicyNetwork,
    rng: &mut SmallRng,
) -> Option<((i64, SelectionCache), Option<usize>, Option<(NodeId, NodeId)>)> {
    let features: Vec<Vec<f64>> = bucket
        .iter()
        .map(|id| state.features.get(id).cloned().unwrap_or_default())
        .collect();
    let selection = policy.select_action(&features, rng)?;
    let n1 = *bucket.get(selection.row)?;
    let n2 = *bucket.get(selection.col)?;

    let outcome = evaluate_merge(&state.graph, |id| state.size_of(id), n1, n2);
    if outcome.reward > 0 {
        apply_merge(state, n1, n2, &outcome.patch);
        Some((
            (outcome.reward, selection.cache),
            Some(selection.col),
            Some((n1, n2)),
        ))
    } else {
        Some(((outcome.reward, selection.cache), None, None))
    }
}

fn apply_merge(
    state: &mut MergeState,
    n1: NodeId,
    n2: NodeId,
    patch: &crate::reward::MergePatch,
) {
    for &((a, b), weight) in &patch.weight_updates {
        if let Some(edge) = state.graph.edge_mut(a, b) {
            edge.weight = weight;
        }
    }
    for &((a, b), materialized) in &patch.materialize_updates {
        if let Some(edge) = state.graph.edge_mut(a, b) {
            edge.materialized = materialized;
        }
    }
    for &(a, b, weight, materialized) in &patch.new_edges {
        if let Some(edge) = state.graph.edge_mut(a, b) {
            edge.weight = weight;
            edge.materialized = materialized;
        } else if let Err(err) =
            state
                .graph
                .insert_edge(a, b, crate::graph::EdgeRecord { weight, materialized })
        {
            tracing::warn!(error = %err, "merge patch named a new edge that could not be inserted");
        }
    }

    state.graph.remove_node(n2);

    if let Some(n2_feat) = state.features.remove(&n2) {
        let entry = state
            .features
            .entry(n1)
            .or_insert_with(|| vec![0.0; state.feat_dim]);
        for (slot, value) in entry.iter_mut().zip(n2_feat.iter()) {
            *slot += value;
        }
    }
    if let Some(mut n2_members) = state.members.remove(&n2) {
        state.members.entry(n1).or_default().append(&mut n2_members);
    }
}

fn record_merge(
    timeline: &mut Vec<TimelineEntry>,
    state: &MergeState,
    reward: i64,
    n1: NodeId,
    n2: NodeId,
    initial_node_count: usize,
    initial_edge_count: usize,
) {
    let supernode_count = state.members.len();
    let edge_count = state.graph.edge_count();
    let denominator = initial_node_count + initial_edge_count;
    let summarisation_ratio = if denominator == 0 {
        0.0
    } else {
        (supernode_count + edge_count) as f64 / denominator as f64
    };
    timeline.push(TimelineEntry {
        n1: n1.to_string(),
        n2: n2.to_string(),
        stats: crate::output::TimelineStats {
            step_index: timeline.len(),
            reward,
            summarisation_ratio,
            node_count: state.members.values().map(Vec::len).sum(),
            edge_count,
            supernode_count,
            avg_degree: if supernode_count == 0 {
                0.0
            } else {
                2.0 * edge_count as f64 / supernode_count as f64
            },
        },
    });
}

fn checkpoint(config: &MergeConfig, state: &MergeState) {
    let Some(dir) = &config.checkpoint_dir else {
        return;
    };
    if !dir.exists() && std::fs::create_dir_all(dir).is_err() {
        return;
    }
    let path = dir.join("checkpoint.bin");
    if let Err(err) = crate::io::write_summary_snapshot(&path, state) {
        tracing::warn!(error = %err, "failed to write merge-engine checkpoint");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::EdgeRecord;

    fn toy_state() -> (GraphStore, MergeState) {
        let mut original = GraphStore::new(false);
        original
            .insert_edge(NodeId::new(0), NodeId::new(1), EdgeRecord::new(1))
            .expect("insert");
        original
            .insert_edge(NodeId::new(1), NodeId::new(2), EdgeRecord::new(1))
            .expect("insert");

        let mut graph = GraphStore::new(false);
        graph
            .insert_edge(NodeId::new(0), NodeId::new(1), EdgeRecord::new(1))
            .expect("insert");
        graph
            .insert_edge(NodeId::new(1), NodeId::new(2), EdgeRecord::new(1))
            .expect("insert");

        let mut members = HashMap::new();
        members.insert(NodeId::new(0), vec![NodeId::new(0)]);
        members.insert(NodeId::new(1), vec![NodeId::new(1)]);
        members.insert(NodeId::new(2), vec![NodeId::new(2)]);

        let mut features = HashMap::new();
        features.insert(NodeId::new(0), vec![1.0, 0.0]);
        features.insert(NodeId::new(1), vec![0.0, 1.0]);
        features.insert(NodeId::new(2), vec![1.0, 1.0]);

        (
            original,
            MergeState {
                graph,
                members,
                features,
                feat_dim: 2,
            },
        )
    }

    #[test]
    fn fit_runs_without_panicking_and_keeps_node_count_invariant() {
        let (original, state) = toy_state();
        let config = MergeConfig {
            outer_iterations: 2,
            bucket_size: 3,
            hidden1: 4,
            hidden2: 2,
            lr: 0.01,
            dropout: 0.0,
            weight_decay: 0.0,
            bad_counter_limit: 3,
            seed: 11,
            checkpoint_dir: None,
        };
        let mut engine = MergeEngine::new(config, 2);
        let stop = Arc::new(AtomicBool::new(false));
        let (final_state, _timeline) = engine.fit(&original, state, &stop);
        let total_members: usize = final_state.members.values().map(Vec::len).sum();
        assert_eq!(total_members, 3);
    }

    #[test]
    fn cancellation_flag_stops_the_loop_early() {
        let (original, state) = toy_state();
        let config = MergeConfig {
            outer_iterations: 100,
            bucket_size: 3,
            hidden1: 4,
            hidden2: 2,
            lr: 0.01,
            dropout: 0.0,
            weight_decay: 0.0,
            bad_counter_limit: 3,
            seed: 11,
            checkpoint_dir: None,
        };
        let mut engine = MergeEngine::new(config, 2);
        let stop = Arc::new(AtomicBool::new(true));
        let (final_state, timeline) = engine.fit(&original, state, &stop);
        assert!(timeline.is_empty());
        assert_eq!(final_state.members.len(), 3);
    }
}
