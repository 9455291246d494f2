//! ==============================================================================
//! error.rs - error taxonomy for the forecasting pipeline
//! ==============================================================================
//!
//! purpose:
//!     one enum per layer so callers can tell recoverable row problems
//!     (skip + count) from fatal ones (abort training, refuse to serve).
//!
//! relationships:
//!     - ReadingError: raised by dataset.rs, swallowed and counted by align.rs
//!     - TrainError: raised by training.rs
//!     - InvalidInputError: raised by domain.rs / inference.rs, mapped to 422 by server.rs
//!     - ModelLoadError: raised by store.rs at startup
//!
//! ==============================================================================

use std::path::PathBuf;

/// a raw training row that cannot become a Reading
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ReadingError {
    #[error("unparsable timestamp: {value:?}")]
    BadTimestamp { value: String },

    #[error("malformed reading: field `{field}` is missing or non-numeric ({value:?})")]
    Malformed { field: &'static str, value: String },
}

/// problems reading or writing the tabular dataset itself (not individual rows)
#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("failed to read dataset {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write dataset {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("dataset is empty (no header row)")]
    Empty,

    #[error("dataset header is missing required column `{0}`")]
    MissingColumn(&'static str),
}

#[derive(Debug, thiserror::Error)]
pub enum TrainError {
    /// alignment produced nothing to fit on
    #[error("no aligned rows: every reading lacked an exact +{horizon_minutes}min successor")]
    NoAlignedRows { horizon_minutes: i64 },

    #[error("invalid training parameters: {0}")]
    InvalidParams(String),

    #[error(transparent)]
    Dataset(#[from] DatasetError),

    #[error("failed to persist model artifact {path}: {source}")]
    Persist {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to encode model artifact: {0}")]
    Encode(#[from] serde_json::Error),
}

/// an inference request that cannot be turned into a feature vector
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InvalidInputError {
    #[error("invalid request body: {0}")]
    Body(String),

    #[error("field `{field}` out of range: {value} (expected 0..={max})")]
    OutOfRange { field: &'static str, value: u64, max: u64 },

    #[error("field `{field}` is not a finite number")]
    NonFinite { field: &'static str },
}

#[derive(Debug, thiserror::Error)]
pub enum ModelLoadError {
    #[error("model artifact not found: {0}")]
    Missing(PathBuf),

    #[error("failed to read model artifact {path}: {source}")]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to decode model artifact {path}: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("model artifact {path} was trained on features {found:?}, expected {expected:?}")]
    FeatureLayout {
        path: PathBuf,
        expected: Vec<String>,
        found: Vec<String>,
    },

    #[error("model artifact {path} has format version {found}, expected {expected}")]
    FormatVersion { path: PathBuf, expected: u32, found: u32 },
}
