//! ==============================================================================
//! isolation.rs - isolation forest (the anomaly model)
//! ==============================================================================
//!
//! purpose:
//!     random axis-aligned cuts isolate unusual rows in fewer steps than
//!     normal ones. the anomaly score of a row is -2^(-E[path] / c(psi)),
//!     lower means more anomalous.
//!
//! decision boundary:
//!     the threshold is the `contamination` percentile of the training
//!     scores, so roughly that fraction of the training rows lands on the
//!     outlier side. contamination is configuration and must stay the same
//!     across retraining runs for anomaly rates to be comparable.
//!
//! ==============================================================================

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::Label;
use crate::error::TrainError;
use crate::features::{FeatureRow, FEATURE_COUNT};

const EULER_GAMMA: f64 = 0.577_215_664_901_532_9;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IsolationParams {
    pub n_estimators: usize,
    /// subsample size per tree, capped at the number of training rows
    pub max_samples: usize,
    /// expected outlier fraction, (0, 0.5]
    pub contamination: f64,
    pub seed: u64,
}

impl Default for IsolationParams {
    fn default() -> Self {
        Self {
            n_estimators: 200,
            max_samples: 256,
            contamination: 0.02,
            seed: 42,
        }
    }
}

impl IsolationParams {
    fn validate(&self) -> Result<(), TrainError> {
        if self.n_estimators == 0 {
            return Err(TrainError::InvalidParams("anomaly.n_estimators must be >= 1".into()));
        }
        if self.max_samples == 0 {
            return Err(TrainError::InvalidParams("anomaly.max_samples must be >= 1".into()));
        }
        if !(self.contamination > 0.0 && self.contamination <= 0.5) {
            return Err(TrainError::InvalidParams(format!(
                "anomaly.contamination must be in (0, 0.5], got {}",
                self.contamination
            )));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
enum Node {
    Leaf {
        size: usize,
    },
    Split {
        feature: usize,
        value: f64,
        left: usize,
        right: usize,
    },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
struct IsolationTree {
    nodes: Vec<Node>,
}

impl IsolationTree {
    fn fit(x: &[FeatureRow], samples: Vec<usize>, height_limit: usize, rng: &mut StdRng) -> Self {
        let mut tree = Self { nodes: Vec::new() };
        tree.grow(x, samples, 0, height_limit, rng);
        tree
    }

    fn grow(
        &mut self,
        x: &[FeatureRow],
        samples: Vec<usize>,
        depth: usize,
        height_limit: usize,
        rng: &mut StdRng,
    ) -> usize {
        let id = self.nodes.len();
        self.nodes.push(Node::Leaf {
            size: samples.len(),
        });
        if depth >= height_limit || samples.len() <= 1 {
            return id;
        }

        // only features that still vary inside this node can be cut
        let mut candidates: Vec<(usize, f64, f64)> = Vec::with_capacity(FEATURE_COUNT);
        for feature in 0..FEATURE_COUNT {
            let (lo, hi) = samples.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &i| {
                (lo.min(x[i][feature]), hi.max(x[i][feature]))
            });
            if lo < hi {
                candidates.push((feature, lo, hi));
            }
        }
        if candidates.is_empty() {
            return id;
        }

        let (feature, lo, hi) = candidates[rng.gen_range(0..candidates.len())];
        // lo + u * (hi - lo) overflows when the range spans most of f64
        let u: f64 = rng.gen();
        let value = (lo * (1.0 - u) + hi * u).clamp(lo, hi);
        let (left_samples, right_samples): (Vec<usize>, Vec<usize>) =
            samples.into_iter().partition(|&i| x[i][feature] < value);

        let left = self.grow(x, left_samples, depth + 1, height_limit, rng);
        let right = self.grow(x, right_samples, depth + 1, height_limit, rng);
        self.nodes[id] = Node::Split {
            feature,
            value,
            left,
            right,
        };
        id
    }

    /// edges from the root to the row's leaf, plus the expected remaining depth of that leaf
    fn path_length(&self, row: &FeatureRow) -> f64 {
        let mut idx = 0;
        let mut depth = 0.0;
        loop {
            match &self.nodes[idx] {
                Node::Leaf { size } => return depth + average_path_length(*size),
                Node::Split {
                    feature,
                    value,
                    left,
                    right,
                } => {
                    idx = if row[*feature] < *value { *left } else { *right };
                    depth += 1.0;
                }
            }
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IsolationForest {
    params: IsolationParams,
    sample_size: usize,
    trees: Vec<IsolationTree>,
    threshold: f64,
}

impl IsolationForest {
    pub fn fit(params: &IsolationParams, x: &[FeatureRow]) -> Result<Self, TrainError> {
        params.validate()?;
        if x.is_empty() {
            return Err(TrainError::InvalidParams(
                "cannot fit an isolation forest on zero rows".into(),
            ));
        }

        let n = x.len();
        let sample_size = params.max_samples.min(n);
        let height_limit = (sample_size.max(2) as f64).log2().ceil() as usize;

        let mut master = StdRng::seed_from_u64(params.seed);
        let seeds: Vec<u64> = (0..params.n_estimators).map(|_| master.gen()).collect();

        let trees = seeds
            .par_iter()
            .map(|&seed| {
                let mut rng = StdRng::seed_from_u64(seed);
                let samples = rand::seq::index::sample(&mut rng, n, sample_size).into_vec();
                IsolationTree::fit(x, samples, height_limit, &mut rng)
            })
            .collect::<Vec<_>>();

        let mut forest = Self {
            params: params.clone(),
            sample_size,
            trees,
            threshold: 0.0,
        };

        let mut scores: Vec<f64> = x.iter().map(|row| forest.score(row)).collect();
        scores.sort_by(|a, b| a.total_cmp(b));
        forest.threshold = percentile(&scores, params.contamination * 100.0);

        tracing::debug!(
            trees = forest.trees.len(),
            sample_size,
            threshold = forest.threshold,
            "isolation forest fitted"
        );
        Ok(forest)
    }

    /// anomaly score in [-1, 0); lower is more anomalous
    pub fn score(&self, row: &FeatureRow) -> f64 {
        let mean_path: f64 =
            self.trees.iter().map(|t| t.path_length(row)).sum::<f64>() / self.trees.len() as f64;
        let norm = average_path_length(self.sample_size);
        // a single-row sample has no expected depth; every row then scores -1
        let norm = if norm > 0.0 { norm } else { 1.0 };
        -(2f64.powf(-mean_path / norm))
    }

    pub fn classify(&self, row: &FeatureRow) -> Label {
        if self.score(row) < self.threshold {
            Label::Outlier
        } else {
            Label::Inlier
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn params(&self) -> &IsolationParams {
        &self.params
    }
}

/// expected path length of an unsuccessful bst search over n items, c(n)
fn average_path_length(n: usize) -> f64 {
    match n {
        0 | 1 => 0.0,
        2 => 1.0,
        _ => {
            let n = n as f64;
            2.0 * ((n - 1.0).ln() + EULER_GAMMA) - 2.0 * (n - 1.0) / n
        }
    }
}

/// linear-interpolated percentile of an ascending slice, q in [0, 100]
fn percentile(sorted: &[f64], q: f64) -> f64 {
    let rank = q / 100.0 * (sorted.len() - 1) as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64)
}
