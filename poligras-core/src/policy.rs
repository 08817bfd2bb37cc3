//! Policy network (C3): a two-layer projection over one bucket's feature
//! rows, producing a softmaxed pairwise selection distribution.
//!
//! The network has no tensor-library dependency; every matrix is a flat
//! `Vec<f64>` and every forward/backward pass is a handful of nested loops
//! over bucket-sized (at most a few hundred rows) matrices.

use rand::Rng;
use rand::rngs::SmallRng;

/// A single dense layer with bias, stored row-major (`in_dim` rows of
/// `out_dim` columns) plus matching Adam moment buffers.
#[derive(Clone, Debug)]
struct DenseLayer {
    in_dim: usize,
    out_dim: usize,
    weight: Vec<f64>,
    bias: Vec<f64>,
    m_weight: Vec<f64>,
    v_weight: Vec<f64>,
    m_bias: Vec<f64>,
    v_bias: Vec<f64>,
}

impl DenseLayer {
    fn new(in_dim: usize, out_dim: usize, rng: &mut SmallRng) -> Self {
        let scale = 1.0 / (in_dim.max(1) as f64).sqrt();
        let weight = (0..in_dim * out_dim)
            .map(|_| (rng.r#gen::<f64>() * 2.0 - 1.0) * scale)
            .collect();
        Self {
            in_dim,
            out_dim,
            weight,
            bias: vec![0.0; out_dim],
            m_weight: vec![0.0; in_dim * out_dim],
            v_weight: vec![0.0; in_dim * out_dim],
            m_bias: vec![0.0; out_dim],
            v_bias: vec![0.0; out_dim],
        }
    }

    fn weight_at(&self, row: usize, col: usize) -> f64 {
        self.weight
            .get(row * self.out_dim + col)
            .copied()
            .unwrap_or(0.0)
    }

    /// Runs the layer over every row of `x`, returning the pre-activation
    /// outputs (`rows` vectors of length `out_dim`).
    fn forward(&self, x: &[Vec<f64>]) -> Vec<Vec<f64>> {
        x.iter()
            .map(|row| {
                (0..self.out_dim)
                    .map(|o| {
                        let dot: f64 = (0..self.in_dim)
                            .map(|i| row.get(i).copied().unwrap_or(0.0) * self.weight_at(i, o))
                            .sum();
                        dot + self.bias.get(o).copied().unwrap_or(0.0)
                    })
                    .collect()
            })
            .collect()
    }

    /// Accumulates gradients for one bucket's forward pass and returns the
    /// upstream gradient with respect to this layer's input.
    fn backward(
        &self,
        x: &[Vec<f64>],
        grad_out: &[Vec<f64>],
        grad_weight: &mut [f64],
        grad_bias: &mut [f64],
    ) -> Vec<Vec<f64>> {
        for (row, grad_row) in x.iter().zip(grad_out.iter()) {
            for o in 0..self.out_dim {
                let g = grad_row.get(o).copied().unwrap_or(0.0);
                if let Some(slot) = grad_bias.get_mut(o) {
                    *slot += g;
                }
                for i in 0..self.in_dim {
                    if let Some(slot) = grad_weight.get_mut(i * self.out_dim + o) {
                        *slot += g * row.get(i).copied().unwrap_or(0.0);
                    }
                }
            }
        }
        grad_out
            .iter()
            .map(|grad_row| {
                (0..self.in_dim)
                    .map(|i| {
                        (0..self.out_dim)
                            .map(|o| {
                                grad_row.get(o).copied().unwrap_or(0.0) * self.weight_at(i, o)
                            })
                            .sum()
                    })
                    .collect()
            })
            .collect()
    }

    fn apply_adam(
        &mut self,
        grad_weight: &[f64],
        grad_bias: &[f64],
        lr: f64,
        weight_decay: f64,
        step: u64,
    ) {
        const BETA1: f64 = 0.9;
        const BETA2: f64 = 0.999;
        const EPS: f64 = 1e-8;
        let bias_correction1 = 1.0 - BETA1.powi(i32::try_from(step).unwrap_or(i32::MAX));
        let bias_correction2 = 1.0 - BETA2.powi(i32::try_from(step).unwrap_or(i32::MAX));

        for idx in 0..self.weight.len() {
            let g = grad_weight.get(idx).copied().unwrap_or(0.0)
                + weight_decay * self.weight.get(idx).copied().unwrap_or(0.0);
            let Some(m) = self.m_weight.get_mut(idx) else {
                continue;
            };
            *m = BETA1 * *m + (1.0 - BETA1) * g;
            let m_hat = *m / bias_correction1;
            let Some(v) = self.v_weight.get_mut(idx) else {
                continue;
            };
            *v = BETA2 * *v + (1.0 - BETA2) * g * g;
            let v_hat = *v / bias_correction2;
            if let Some(w) = self.weight.get_mut(idx) {
                *w -= lr * m_hat / (v_hat.sqrt() + EPS);
            }
        }
        for idx in 0..self.bias.len() {
            let g = grad_bias.get(idx).copied().unwrap_or(0.0);
            let Some(m) = self.m_bias.get_mut(idx) else {
                continue;
            };
            *m = BETA1 * *m + (1.0 - BETA1) * g;
            let m_hat = *m / bias_correction1;
            let Some(v) = self.v_bias.get_mut(idx) else {
                continue;
            };
            *v = BETA2 * *v + (1.0 - BETA2) * g * g;
            let v_hat = *v / bias_correction2;
            if let Some(b) = self.bias.get_mut(idx) {
                *b -= lr * m_hat / (v_hat.sqrt() + EPS);
            }
        }
    }
}

/// Snapshot of a single forward pass, retained so the corresponding
/// REINFORCE gradient can be computed once the reward is known.
#[derive(Clone, Debug)]
pub struct SelectionCache {
    input: Vec<Vec<f64>>,
    hidden1_pre: Vec<Vec<f64>>,
    hidden1: Vec<Vec<f64>>,
    hidden2: Vec<Vec<f64>>,
    probs: Vec<f64>,
    chosen_cell: (usize, usize),
    bucket_size: usize,
}

/// Outcome of [`PolicyNetwork::select_action`]: the pair actually selected
/// (after any diagonal fallback) and the log-probability to feed REINFORCE.
#[derive(Clone, Debug)]
pub struct Selection {
    /// Row index of the selected pair within the bucket.
    pub row: usize,
    /// Column index of the selected pair within the bucket.
    pub col: usize,
    /// Log-probability of the *chosen* softmax cell, before any fallback.
    pub log_prob: f64,
    /// Cached activations, needed to compute the REINFORCE gradient later.
    pub cache: SelectionCache,
}

/// Two-layer policy network over bucket feature rows.
#[derive(Clone, Debug)]
pub struct PolicyNetwork {
    layer1: DenseLayer,
    layer2: DenseLayer,
    dropout: f64,
    adam_step: u64,
}

impl PolicyNetwork {
    /// Builds a freshly initialized policy network.
    #[must_use]
    pub fn new(feat_dim: usize, hidden1: usize, hidden2: usize, dropout: f64, rng: &mut SmallRng) -> Self {
        Self {
            layer1: DenseLayer::new(feat_dim, hidden1, rng),
            layer2: DenseLayer::new(hidden1, hidden2, rng),
            dropout,
            adam_step: 0,
        }
    }

    /// Runs the forward pass over one bucket's feature rows and samples a
    /// pair under the policy contract from spec §4.3: diagonal is masked to
    /// `-∞` before softmax; if the raw argmax still lands on the diagonal
    /// (possible only in degenerate numeric conditions), a uniformly random
    /// distinct pair is substituted while the recorded log-probability still
    /// reflects the originally chosen (diagonal) cell.
    pub fn select_action(&self, bucket_features: &[Vec<f64>], rng: &mut SmallRng) -> Option<Selection> {
        let r = bucket_features.len();
        if r < 2 {
            return None;
        }

        let hidden1_pre = self.layer1.forward(bucket_features);
        let hidden1: Vec<Vec<f64>> = hidden1_pre
            .iter()
            .map(|row| row.iter().map(|&v| v.max(0.0)).collect())
            .collect();
        let hidden2 = self.layer2.forward(&hidden1);

        let mut scores = vec![0.0_f64; r * r];
        for a in 0..r {
            for b in 0..r {
                let dot: f64 = hidden2
                    .get(a)
                    .into_iter()
                    .flatten()
                    .zip(hidden2.get(b).into_iter().flatten())
                    .map(|(x, y)| x * y)
                    .sum();
                if let Some(slot) = scores.get_mut(a * r + b) {
                    *slot = dot;
                }
            }
        }
        if self.dropout > 0.0 {
            for slot in &mut scores {
                if rng.r#gen::<f64>() < self.dropout {
                    *slot = 0.0;
                }
            }
        }
        for a in 0..r {
            if let Some(slot) = scores.get_mut(a * r + a) {
                *slot = f64::NEG_INFINITY;
            }
        }

        let max_score = scores
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold(f64::NEG_INFINITY, f64::max);
        let exp: Vec<f64> = scores
            .iter()
            .map(|&s| if s.is_finite() { (s - max_score).exp() } else { 0.0 })
            .collect();
        let sum_exp: f64 = exp.iter().sum();
        let probs: Vec<f64> = if sum_exp > 0.0 {
            exp.iter().map(|&e| e / sum_exp).collect()
        } else {
            vec![1.0 / (r * r) as f64; r * r]
        };

        let (argmax_idx, &argmax_prob) = probs
            .iter()
            .enumerate()
            .fold((0_usize, &0.0_f64), |best, cur| {
                if cur.1 > best.1 { cur } else { best }
            });
        let argmax_row = argmax_idx / r;
        let argmax_col = argmax_idx % r;
        let log_prob = argmax_prob.max(f64::MIN_POSITIVE).ln();

        let (row, col) = if argmax_row == argmax_col {
            let a = rng.gen_range(0..r);
            let mut b = rng.gen_range(0..r.saturating_sub(1));
            if b >= a {
                b += 1;
            }
            (a, b)
        } else {
            (argmax_row, argmax_col)
        };

        Some(Selection {
            row,
            col,
            log_prob,
            cache: SelectionCache {
                input: bucket_features.to_vec(),
                hidden1_pre,
                hidden1,
                hidden2,
                probs,
                chosen_cell: (argmax_row, argmax_col),
                bucket_size: r,
            },
        })
    }

    /// Applies a REINFORCE update from a batch of `(cache, standardized
    /// reward)` pairs accumulated over one outer-loop iteration. The
    /// gradient of `-log_prob(chosen) * reward` is accumulated across every
    /// step before a single Adam step is applied, matching the "update once
    /// per batch" shape of the reference training loop.
    pub fn update(&mut self, steps: &[(SelectionCache, f64)], lr: f64, weight_decay: f64) {
        if steps.is_empty() {
            return;
        }
        let mut grad_w1 = vec![0.0_f64; self.layer1.weight.len()];
        let mut grad_b1 = vec![0.0_f64; self.layer1.bias.len()];
        let mut grad_w2 = vec![0.0_f64; self.layer2.weight.len()];
        let mut grad_b2 = vec![0.0_f64; self.layer2.bias.len()];

        for (cache, reward) in steps {
            let r = cache.bucket_size;
            let (chosen_row, chosen_col) = cache.chosen_cell;

            let mut grad_scores = vec![0.0_f64; r * r];
            for a in 0..r {
                for b in 0..r {
                    let indicator = f64::from(a == chosen_row && b == chosen_col);
                    let p = cache.probs.get(a * r + b).copied().unwrap_or(0.0);
                    if let Some(slot) = grad_scores.get_mut(a * r + b) {
                        *slot = -(indicator - p) * reward;
                    }
                }
            }

            let mut grad_hidden2 = vec![vec![0.0_f64; cache.hidden2.first().map_or(0, Vec::len)]; r];
            for a in 0..r {
                for b in 0..r {
                    let g = grad_scores.get(a * r + b).copied().unwrap_or(0.0)
                        + grad_scores.get(b * r + a).copied().unwrap_or(0.0);
                    if g == 0.0 {
                        continue;
                    }
                    if let Some(other_row) = cache.hidden2.get(b) {
                        if let Some(target) = grad_hidden2.get_mut(a) {
                            for (slot, &val) in target.iter_mut().zip(other_row.iter()) {
                                *slot += g * val;
                            }
                        }
                    }
                }
            }

            let grad_hidden1 = self
                .layer2
                .backward(&cache.hidden1, &grad_hidden2, &mut grad_w2, &mut grad_b2);

            let grad_hidden1_relu: Vec<Vec<f64>> = grad_hidden1
                .iter()
                .zip(cache.hidden1_pre.iter())
                .map(|(grad_row, pre_row)| {
                    grad_row
                        .iter()
                        .zip(pre_row.iter())
                        .map(|(&g, &pre)| if pre > 0.0 { g } else { 0.0 })
                        .collect()
                })
                .collect();

            let _ = self
                .layer1
                .backward(&cache.input, &grad_hidden1_relu, &mut grad_w1, &mut grad_b1);
        }

        self.adam_step += 1;
        self.layer1
            .apply_adam(&grad_w1, &grad_b1, lr, weight_decay, self.adam_step);
        self.layer2
            .apply_adam(&grad_w2, &grad_b2, lr, weight_decay, self.adam_step);
    }
}
