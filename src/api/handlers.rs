use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::Serialize;
use serde_json::{json, Value};
use tracing::error;

use crate::api::state::AppState;
use crate::error::PredictError;
use crate::metrics::MetricsSnapshot;

impl IntoResponse for PredictError {
    fn into_response(self) -> Response {
        match &self {
            PredictError::NotFound { name, .. } => (
                StatusCode::NOT_FOUND,
                Json(json!({ "error": format!("Model '{}' not found", name) })),
            )
                .into_response(),
            _ => (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": self.to_string(), "kind": self.kind() })),
            )
                .into_response(),
        }
    }
}

pub async fn list_models(State(state): State<AppState>) -> Json<Vec<String>> {
    Json(state.engine.list_available_models())
}

pub async fn predict(
    State(state): State<AppState>,
    Path(model_name): Path<String>,
    body: Bytes,
) -> Response {
    let payload = match serde_json::from_slice::<Value>(&body) {
        Ok(Value::Null) | Err(_) => {
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({ "error": "Expected JSON body" })),
            )
                .into_response()
        }
        Ok(payload) => payload,
    };

    // Model calls are synchronous and may be CPU heavy
    let engine = state.engine.clone();
    let name = model_name.clone();
    let outcome = tokio::task::spawn_blocking(move || engine.predict(&name, &payload)).await;

    match outcome {
        Ok(Ok(prediction)) => Json(prediction.to_body()).into_response(),
        Ok(Err(e)) => e.into_response(),
        Err(e) => {
            error!(model = %model_name, error = %e, "Prediction task panicked");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Prediction task failed" })),
            )
                .into_response()
        }
    }
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub started_at: chrono::DateTime<Utc>,
    pub uptime_seconds: i64,
    pub models_dir: String,
    pub cached_models: Vec<String>,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let store = state.engine.store();
    Json(HealthResponse {
        status: "ok",
        started_at: state.started_at,
        uptime_seconds: (Utc::now() - state.started_at).num_seconds(),
        models_dir: store.models_dir().display().to_string(),
        cached_models: store.cached_models(),
    })
}

pub async fn metrics(State(state): State<AppState>) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot())
}

pub async fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        Json(json!({ "error": "File not found" })),
    )
}
