//! Isolation forest over small feature matrices
//!
//! Classic iForest: each tree isolates points by recursive random
//! axis-aligned splits over a subsample; anomalous points sit at short
//! average path lengths. Scores follow the sklearn convention the rest of
//! the detector assumes: `score_samples` in [-1, 0] with more negative =
//! more anomalous, and `decision_function = score_samples - offset` where
//! the offset is the contamination percentile of the training scores, so
//! a negative decision value marks an anomaly.
//!
//! Tree fitting is deterministic for a given seed: every tree derives its
//! own rng from `seed + tree index`, independent of rayon's scheduling.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

/// Number of trees in the ensemble.
const N_ESTIMATORS: usize = 100;

/// Per-tree subsample ceiling.
const MAX_SAMPLES: usize = 256;

/// A fitted forest plus its decision offset.
pub struct IsolationForest {
    trees: Vec<Tree>,
    /// Average path length normalizer c(psi).
    c_norm: f64,
    /// Contamination percentile of the training scores.
    offset: f64,
}

/// Per-point detection outcome.
#[derive(Debug, Clone, Copy)]
pub struct Detection {
    /// True when the decision score is negative.
    pub is_anomaly: bool,
    /// `score_samples - offset`; more negative = more anomalous.
    pub decision_score: f64,
}

impl IsolationForest {
    /// Fit a forest and score the training matrix in one pass.
    ///
    /// `rows` must be rectangular and non-empty; `contamination` is the
    /// expected anomaly fraction used to place the decision offset.
    pub fn fit_detect(rows: &[Vec<f64>], contamination: f64, seed: u64) -> Vec<Detection> {
        if rows.is_empty() {
            return Vec::new();
        }
        let forest = Self::fit(rows, contamination, seed);
        rows.iter().map(|row| forest.detect(row)).collect()
    }

    /// Fit on the given matrix.
    pub fn fit(rows: &[Vec<f64>], contamination: f64, seed: u64) -> Self {
        let psi = rows.len().min(MAX_SAMPLES).max(2);
        let depth_limit = (psi as f64).log2().ceil() as usize;

        let trees: Vec<Tree> = (0..N_ESTIMATORS)
            .into_par_iter()
            .map(|t| {
                let mut rng = StdRng::seed_from_u64(seed.wrapping_add(t as u64));
                Tree::build_from_sample(rows, psi, depth_limit, &mut rng)
            })
            .collect();

        let mut forest = Self {
            trees,
            c_norm: average_path_length(psi),
            offset: 0.0,
        };

        // Offset at the contamination percentile of the training scores,
        // so roughly `contamination` of the training mass scores negative.
        let mut scores: Vec<f64> = rows.iter().map(|r| forest.score_sample(r)).collect();
        scores.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let rank = ((scores.len() as f64 * contamination).floor() as usize)
            .min(scores.len().saturating_sub(1));
        forest.offset = scores[rank];
        forest
    }

    /// sklearn-style `score_samples`: `-2^(-E[h(x)] / c(psi))`, in [-1, 0].
    pub fn score_sample(&self, row: &[f64]) -> f64 {
        let mean_path: f64 = self
            .trees
            .iter()
            .map(|t| t.path_length(row))
            .sum::<f64>()
            / self.trees.len() as f64;
        -(2.0f64).powf(-mean_path / self.c_norm)
    }

    /// Score one point against the fitted offset.
    pub fn detect(&self, row: &[f64]) -> Detection {
        let decision = self.score_sample(row) - self.offset;
        Detection {
            is_anomaly: decision < 0.0,
            decision_score: decision,
        }
    }
}

/// Expected path length of an unsuccessful BST search over n points.
fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        n => {
            let n = n as f64;
            // 2 H(n-1) - 2 (n-1)/n with H approximated via ln + Euler's constant
            2.0 * ((n - 1.0).ln() + 0.577_215_664_901_532_9) - 2.0 * (n - 1.0) / n
        }
    }
}

// ============================================================================
// Trees
// ============================================================================

enum Node {
    Internal {
        feature: usize,
        split: f64,
        left: Box<Node>,
        right: Box<Node>,
    },
    Leaf {
        size: usize,
    },
}

struct Tree {
    root: Node,
}

impl Tree {
    fn build_from_sample(rows: &[Vec<f64>], psi: usize, depth_limit: usize, rng: &mut StdRng) -> Self {
        let indices = rand::seq::index::sample(rng, rows.len(), psi.min(rows.len())).into_vec();
        let sample: Vec<&[f64]> = indices.iter().map(|&i| rows[i].as_slice()).collect();
        Self {
            root: build_node(&sample, 0, depth_limit, rng),
        }
    }

    fn path_length(&self, row: &[f64]) -> f64 {
        let mut node = &self.root;
        let mut depth = 0.0;
        loop {
            match node {
                Node::Leaf { size } => return depth + average_path_length(*size),
                Node::Internal {
                    feature,
                    split,
                    left,
                    right,
                } => {
                    depth += 1.0;
                    node = if row.get(*feature).copied().unwrap_or(0.0) < *split {
                        left
                    } else {
                        right
                    };
                }
            }
        }
    }
}

fn build_node(points: &[&[f64]], depth: usize, depth_limit: usize, rng: &mut StdRng) -> Node {
    if points.len() <= 1 || depth >= depth_limit {
        return Node::Leaf { size: points.len() };
    }

    // Features with any spread in this node
    let n_features = points[0].len();
    let splittable: Vec<(usize, f64, f64)> = (0..n_features)
        .filter_map(|f| {
            let mut min = f64::INFINITY;
            let mut max = f64::NEG_INFINITY;
            for p in points {
                min = min.min(p[f]);
                max = max.max(p[f]);
            }
            (max > min).then_some((f, min, max))
        })
        .collect();

    if splittable.is_empty() {
        // All points identical
        return Node::Leaf { size: points.len() };
    }

    let (feature, min, max) = splittable[rng.gen_range(0..splittable.len())];
    let split = rng.gen_range(min..max);

    let (left, right): (Vec<&[f64]>, Vec<&[f64]>) =
        points.iter().partition(|p| p[feature] < split);

    Node::Internal {
        feature,
        split,
        left: Box::new(build_node(&left, depth + 1, depth_limit, rng)),
        right: Box::new(build_node(&right, depth + 1, depth_limit, rng)),
    }
}
