use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::warn;

use crate::state::AppState;

/// GET /api/health: a real store round trip, not a static 200, so an
/// unreachable store is reported as unhealthy.
pub async fn health(State(state): State<AppState>) -> Response {
    match state.store.ping().await {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": "Healthy" }))).into_response(),
        Err(e) => {
            warn!(error = %e, "health check failed: store unreachable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": "Unhealthy" })),
            )
                .into_response()
        }
    }
}
