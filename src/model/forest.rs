//! ==============================================================================
//! forest.rs - bagged regression forest (the forecast model)
//! ==============================================================================
//!
//! purpose:
//!     averages many regression trees, each grown on a bootstrap draw of the
//!     training rows. defaults mirror the production model: 300 trees,
//!     depth 12, seed 42.
//!
//! determinism:
//!     per-tree seeds are drawn up front from one master StdRng, then trees
//!     are fitted in parallel with rayon. collection order is tree order, so
//!     the same data + params always yield the same model bit for bit.
//!
//! ==============================================================================

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::tree::RegressionTree;
use crate::error::TrainError;
use crate::features::FeatureRow;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub bootstrap: bool,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 300,
            max_depth: 12,
            min_samples_split: 2,
            bootstrap: true,
            seed: 42,
        }
    }
}

impl ForestParams {
    fn validate(&self) -> Result<(), TrainError> {
        if self.n_estimators == 0 {
            return Err(TrainError::InvalidParams("forest.n_estimators must be >= 1".into()));
        }
        if self.max_depth == 0 {
            return Err(TrainError::InvalidParams("forest.max_depth must be >= 1".into()));
        }
        if self.min_samples_split < 2 {
            return Err(TrainError::InvalidParams(
                "forest.min_samples_split must be >= 2".into(),
            ));
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RandomForestRegressor {
    params: ForestParams,
    trees: Vec<RegressionTree>,
}

impl RandomForestRegressor {
    pub fn fit(params: &ForestParams, x: &[FeatureRow], y: &[f64]) -> Result<Self, TrainError> {
        params.validate()?;
        if x.is_empty() {
            return Err(TrainError::InvalidParams("cannot fit a forest on zero rows".into()));
        }
        if x.len() != y.len() {
            return Err(TrainError::InvalidParams(format!(
                "feature rows ({}) and targets ({}) differ in length",
                x.len(),
                y.len()
            )));
        }

        let mut master = StdRng::seed_from_u64(params.seed);
        let seeds: Vec<u64> = (0..params.n_estimators).map(|_| master.gen()).collect();
        let n = x.len();

        let trees = seeds
            .par_iter()
            .map(|&seed| {
                let samples: Vec<usize> = if params.bootstrap {
                    let mut rng = StdRng::seed_from_u64(seed);
                    (0..n).map(|_| rng.gen_range(0..n)).collect()
                } else {
                    (0..n).collect()
                };
                RegressionTree::fit(x, y, samples, params.max_depth, params.min_samples_split)
            })
            .collect::<Vec<_>>();

        tracing::debug!(trees = trees.len(), rows = n, "regression forest fitted");
        Ok(Self {
            params: params.clone(),
            trees,
        })
    }

    /// mean of the per-tree predictions, summed in tree order
    pub fn predict_one(&self, row: &FeatureRow) -> f64 {
        let total: f64 = self.trees.iter().map(|t| t.predict(row)).sum();
        total / self.trees.len() as f64
    }

    pub fn params(&self) -> &ForestParams {
        &self.params
    }
}
