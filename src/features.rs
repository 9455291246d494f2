//! ==============================================================================
//! features.rs - the one feature layout shared by training and inference
//! ==============================================================================
//!
//! purpose:
//!     maps a Reading (training) or an InferenceRequest (serving) onto the
//!     same named FeatureVector, and flattens it into the fixed-order row the
//!     estimators consume.
//!
//! invariant:
//!     the estimators accept any [f64; 6] without complaint, so a swapped
//!     column would silently corrupt predictions. the order lives in exactly
//!     two places that must agree: FEATURE_NAMES and FeatureVector::to_array.
//!     model artifacts record FEATURE_NAMES and store.rs rejects a mismatch.
//!
//! relationships:
//!     - used by: align.rs (training rows), inference.rs (live requests)
//!     - used by: store.rs (layout recorded in artifacts)
//!
//! ==============================================================================

use chrono::Timelike;
use serde::Serialize;

use crate::domain::{AlignedRow, InferenceRequest, Reading};

pub const FEATURE_COUNT: usize = 6;

/// column order of every feature row
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "temperature",
    "humidity_air",
    "humidity_soil",
    "light",
    "hour",
    "minute_of_day",
];

/// flattened feature vector as handed to an estimator
pub type FeatureRow = [f64; FEATURE_COUNT];

#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct FeatureVector {
    pub temperature: f64,
    pub humidity_air: f64,
    pub humidity_soil: f64,
    pub light: f64,
    /// 0..=23
    pub hour: u32,
    /// 0..=1439
    pub minute_of_day: u32,
}

impl FeatureVector {
    /// fixed-order numeric row, see FEATURE_NAMES
    pub fn to_array(&self) -> FeatureRow {
        [
            self.temperature,
            self.humidity_air,
            self.humidity_soil,
            self.light,
            f64::from(self.hour),
            f64::from(self.minute_of_day),
        ]
    }
}

/// derive time features from the reading's own wall clock and assemble the vector
pub fn build(reading: &Reading) -> FeatureVector {
    let hour = reading.timestamp.hour();
    FeatureVector {
        temperature: reading.temperature,
        humidity_air: reading.humidity_air,
        humidity_soil: reading.humidity_soil,
        light: reading.light,
        hour,
        minute_of_day: hour * 60 + reading.timestamp.minute(),
    }
}

impl From<&InferenceRequest> for FeatureVector {
    fn from(req: &InferenceRequest) -> Self {
        Self {
            temperature: req.temperature,
            humidity_air: req.humidity_air,
            humidity_soil: req.humidity_soil,
            light: req.light,
            hour: req.hour,
            minute_of_day: req.minute_of_day,
        }
    }
}

/// split aligned rows into the design matrix and target vector, preserving row order
pub fn to_matrix(rows: &[AlignedRow]) -> (Vec<FeatureRow>, Vec<f64>) {
    rows.iter()
        .map(|row| (row.features.to_array(), row.target))
        .unzip()
}

pub fn layout() -> Vec<String> {
    FEATURE_NAMES.iter().map(|s| s.to_string()).collect()
}
