//! ==============================================================================
//! model/mod.rs - estimator seams
//! ==============================================================================
//!
//! purpose:
//!     the two traits the inference service talks to. any regression or
//!     outlier algorithm can sit behind them; the crate ships a bagged
//!     regression forest (forest.rs) and an isolation forest (isolation.rs).
//!
//! contract:
//!     - predict never mutates the model, so one loaded instance is shared
//!       by every concurrent request (Send + Sync, &self only)
//!     - rows are FeatureRow in features::FEATURE_NAMES order
//!
//! ==============================================================================

pub mod forest;
pub mod isolation;
mod tree;

use serde::{Deserialize, Serialize};

use crate::features::FeatureRow;

pub use forest::{ForestParams, RandomForestRegressor};
pub use isolation::{IsolationForest, IsolationParams};

/// outlier detector classification for one row
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    Inlier,
    Outlier,
}

impl Label {
    pub fn is_outlier(self) -> bool {
        self == Label::Outlier
    }
}

/// maps feature rows to a future temperature
pub trait Forecaster: Send + Sync {
    fn predict_row(&self, row: &FeatureRow) -> f64;

    fn predict(&self, rows: &[FeatureRow]) -> Vec<f64> {
        rows.iter().map(|row| self.predict_row(row)).collect()
    }
}

/// maps feature rows to inlier / outlier
pub trait OutlierDetector: Send + Sync {
    fn classify_row(&self, row: &FeatureRow) -> Label;

    fn predict(&self, rows: &[FeatureRow]) -> Vec<Label> {
        rows.iter().map(|row| self.classify_row(row)).collect()
    }
}

impl Forecaster for RandomForestRegressor {
    fn predict_row(&self, row: &FeatureRow) -> f64 {
        self.predict_one(row)
    }
}

impl OutlierDetector for IsolationForest {
    fn classify_row(&self, row: &FeatureRow) -> Label {
        self.classify(row)
    }
}

/// mean absolute error; None when there is nothing to compare
pub fn mean_absolute_error(actual: &[f64], predicted: &[f64]) -> Option<f64> {
    if actual.is_empty() || actual.len() != predicted.len() {
        return None;
    }
    let sum: f64 = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).abs())
        .sum();
    Some(sum / actual.len() as f64)
}

/// root mean squared error; None when there is nothing to compare
pub fn root_mean_squared_error(actual: &[f64], predicted: &[f64]) -> Option<f64> {
    if actual.is_empty() || actual.len() != predicted.len() {
        return None;
    }
    let sum: f64 = actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| (a - p).powi(2))
        .sum();
    Some((sum / actual.len() as f64).sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_metrics() {
        let actual = [1.0, 2.0, 3.0, 4.0];
        let predicted = [1.0, 3.0, 1.0, 4.0];
        assert_eq!(mean_absolute_error(&actual, &predicted), Some(0.75));
        assert_eq!(
            root_mean_squared_error(&actual, &predicted),
            Some((5.0f64 / 4.0).sqrt())
        );
        assert_eq!(mean_absolute_error(&[], &[]), None);
        assert_eq!(root_mean_squared_error(&[1.0], &[]), None);
    }

    #[test]
    fn label_wire_names() {
        assert_eq!(serde_json::to_value(Label::Outlier).unwrap(), "outlier");
        assert!(Label::Outlier.is_outlier());
        assert!(!Label::Inlier.is_outlier());
    }
}
