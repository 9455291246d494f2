//! greenhouse-forecaster: turns a greenhouse sensor log into a 5-minute
//! temperature forecaster plus an anomaly detector, and serves both through
//! one inference call.
//!
//! pipeline: dataset -> align -> features -> training -> store -> inference

pub mod align;
pub mod config;
pub mod dataset;
pub mod domain;
pub mod error;
pub mod features;
pub mod inference;
pub mod model;
pub mod server;
pub mod store;
pub mod training;

pub use align::{AlignmentReport, TimeAligner};
pub use config::ForecasterConfig;
pub use domain::{AlignedRow, InferenceRequest, InferenceResponse, Reading};
pub use error::{DatasetError, InvalidInputError, ModelLoadError, ReadingError, TrainError};
pub use features::{FeatureVector, FEATURE_NAMES};
pub use inference::InferenceService;
