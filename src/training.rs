//! ==============================================================================
//! training.rs - offline training run
//! ==============================================================================
//!
//! purpose:
//!     aligned rows -> feature matrix -> chronological split -> fit both
//!     models -> evaluation report. nothing is written here; the caller
//!     persists only after this returns Ok, so a failed run leaves no
//!     partial artifact behind.
//!
//! split:
//!     the forecast model is fitted on the leading (1 - test_fraction) of
//!     the rows and evaluated on the trailing tail. never shuffled: shuffling
//!     a time series leaks the future into training and flatters the error.
//!     mae / rmse are diagnostics only, no threshold blocks a save.
//!     the anomaly model sees every aligned row.
//!
//! relationships:
//!     - uses: align.rs, features.rs, model/
//!     - used by: main.rs (train subcommand)
//!
//! ==============================================================================

use crate::align::AlignmentReport;
use crate::config::TrainingConfig;
use crate::domain::AlignedRow;
use crate::error::TrainError;
use crate::features;
use crate::model::{
    self, Forecaster, IsolationForest, OutlierDetector, RandomForestRegressor,
};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TrainingReport {
    pub alignment: AlignmentReport,
    pub train_rows: usize,
    pub test_rows: usize,
    /// None when the held-out tail is empty
    pub mae: Option<f64>,
    pub rmse: Option<f64>,
    /// training rows the fitted anomaly model classifies as outliers
    pub training_outliers: usize,
}

pub struct TrainedModels {
    pub forecast: RandomForestRegressor,
    pub anomaly: IsolationForest,
    pub report: TrainingReport,
}

/// leading rows train, trailing `ceil(n * test_fraction)` rows test; at least one row trains
pub fn chronological_split(rows: &[AlignedRow], test_fraction: f64) -> (&[AlignedRow], &[AlignedRow]) {
    let n = rows.len();
    let test = ((n as f64 * test_fraction).ceil() as usize).min(n.saturating_sub(1));
    rows.split_at(n - test)
}

pub fn train(
    rows: &[AlignedRow],
    alignment: AlignmentReport,
    horizon_minutes: i64,
    config: &TrainingConfig,
) -> Result<TrainedModels, TrainError> {
    if rows.is_empty() {
        return Err(TrainError::NoAlignedRows { horizon_minutes });
    }
    if !(0.0..1.0).contains(&config.test_fraction) {
        return Err(TrainError::InvalidParams(format!(
            "training.test_fraction must be in [0, 1), got {}",
            config.test_fraction
        )));
    }

    let mut ordered = rows.to_vec();
    ordered.sort_by_key(|r| r.timestamp);
    let (train_rows, test_rows) = chronological_split(&ordered, config.test_fraction);
    tracing::info!(
        train = train_rows.len(),
        test = test_rows.len(),
        "chronological split"
    );

    // --- forecast model ---
    let (x_train, y_train) = features::to_matrix(train_rows);
    let forecast = RandomForestRegressor::fit(&config.forest, &x_train, &y_train)?;

    let (x_test, y_test) = features::to_matrix(test_rows);
    let predicted = Forecaster::predict(&forecast, &x_test);
    let mae = model::mean_absolute_error(&y_test, &predicted);
    let rmse = model::root_mean_squared_error(&y_test, &predicted);
    match (mae, rmse) {
        (Some(mae), Some(rmse)) => tracing::info!(mae, rmse, "forecast model evaluated on held-out tail"),
        _ => tracing::warn!("held-out tail is empty; forecast model not evaluated"),
    }

    // --- anomaly model ---
    let (x_all, _) = features::to_matrix(&ordered);
    let anomaly = IsolationForest::fit(&config.anomaly, &x_all)?;
    let training_outliers = OutlierDetector::predict(&anomaly, &x_all)
        .into_iter()
        .filter(|label| label.is_outlier())
        .count();
    tracing::info!(
        training_outliers,
        rows = x_all.len(),
        contamination = config.anomaly.contamination,
        "anomaly model fitted"
    );

    let report = TrainingReport {
        alignment,
        train_rows: train_rows.len(),
        test_rows: test_rows.len(),
        mae,
        rmse,
        training_outliers,
    };
    Ok(TrainedModels {
        forecast,
        anomaly,
        report,
    })
}
