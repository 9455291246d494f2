//! ==============================================================================
//! server.rs - http wrapper around the inference service
//! ==============================================================================
//!
//! routes:
//!     POST /predict   request json -> response json (422 on invalid input)
//!     GET  /health    liveness
//!
//! the service is constructed once at startup and injected as router state;
//! handlers never look models up globally.
//!
//! ==============================================================================

use anyhow::Result;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;

use crate::error::InvalidInputError;
use crate::inference::InferenceService;

pub fn router(service: InferenceService) -> Router {
    Router::new()
        .route("/predict", post(predict_handler))
        .route("/health", get(health_handler))
        .layer(CorsLayer::permissive())
        .with_state(service)
}

pub async fn run_server(bind: &str, service: InferenceService) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind).await?;
    tracing::info!(addr = %listener.local_addr()?, "inference api listening");
    axum::serve(listener, router(service)).await?;
    Ok(())
}

impl IntoResponse for InvalidInputError {
    fn into_response(self) -> Response {
        (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(serde_json::json!({ "error": self.to_string() })),
        )
            .into_response()
    }
}

/// takes the raw body so missing / mistyped fields come back as our structured error
async fn predict_handler(State(service): State<InferenceService>, body: String) -> Response {
    // both models run on the rayon pool; keep the async worker free meanwhile
    let outcome = tokio::task::spawn_blocking(move || service.infer_json(&body)).await;
    match outcome {
        Ok(Ok(response)) => Json(response).into_response(),
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "rejected inference request");
            e.into_response()
        }
        Err(e) => {
            tracing::error!(error = %e, "inference task failed");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({ "error": "inference failed" })),
            )
                .into_response()
        }
    }
}

async fn health_handler() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
