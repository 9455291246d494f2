//! ==============================================================================
//! inference.rs - dual-model inference service
//! ==============================================================================
//!
//! purpose:
//!     one request in, one response out: build the feature vector in the
//!     trained order, ask the anomaly model and the forecast model, and
//!     assemble both answers. no caching, no batching.
//!
//! sharing model:
//!     both models sit behind Arc and are never mutated after load, so the
//!     service is a cheap Clone-able handle handed to every request handler
//!     (axum State, cli local). no locks anywhere on this path.
//!     the two predictions are independent and run via rayon::join; the
//!     response is only built once both have returned.
//!
//! relationships:
//!     - uses: features.rs (request -> FeatureVector), model/ (traits)
//!     - loads from: store.rs
//!     - used by: server.rs, main.rs (predict subcommand)
//!
//! ==============================================================================

use std::sync::Arc;

use crate::config::ModelsConfig;
use crate::domain::{InferenceRequest, InferenceResponse};
use crate::error::{InvalidInputError, ModelLoadError};
use crate::features::FeatureVector;
use crate::model::{Forecaster, OutlierDetector};
use crate::store;

#[derive(Clone)]
pub struct InferenceService {
    forecast: Arc<dyn Forecaster>,
    anomaly: Arc<dyn OutlierDetector>,
}

impl InferenceService {
    pub fn new(forecast: Arc<dyn Forecaster>, anomaly: Arc<dyn OutlierDetector>) -> Self {
        Self { forecast, anomaly }
    }

    /// load both artifacts; any failure means the service must not start
    pub fn from_store(config: &ModelsConfig) -> Result<Self, ModelLoadError> {
        let loaded = store::load(config)?;
        Ok(Self::new(
            Arc::new(loaded.forecast.model),
            Arc::new(loaded.anomaly.model),
        ))
    }

    pub fn infer(&self, request: &InferenceRequest) -> Result<InferenceResponse, InvalidInputError> {
        request.validate()?;
        let row = FeatureVector::from(request).to_array();

        let (label, prediction_temp) = rayon::join(
            || self.anomaly.classify_row(&row),
            || self.forecast.predict_row(&row),
        );

        let response = InferenceResponse {
            anomaly: label.is_outlier(),
            prediction_temp,
        };
        tracing::debug!(?request, ?response, "inference");
        Ok(response)
    }

    /// parse a raw json body and infer
    pub fn infer_json(&self, body: &str) -> Result<InferenceResponse, InvalidInputError> {
        let request = InferenceRequest::from_json(body)?;
        self.infer(&request)
    }
}
