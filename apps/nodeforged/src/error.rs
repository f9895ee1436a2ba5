use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use nodeforge_models::ModelError;
use nodeforge_store::StoreError;
use serde_json::json;
use tracing::error;
use uuid::Uuid;

/// The error kinds the API surface can return, mapped once at the
/// boundary. Every component returns a typed error; this is the single
/// place that turns one into an HTTP status.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("unauthorized")]
    Unauthorized,
    #[error("forbidden")]
    Forbidden,
    #[error("not found: {0}")]
    NotFound(String),
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("concurrency conflict")]
    ConcurrencyConflict,
    #[error("invalid transition")]
    InvalidTransition,
    #[error("request timed out")]
    Timeout,
    #[error("internal error")]
    Internal(#[source] anyhow::Error),
}

impl From<ModelError> for ApiError {
    fn from(e: ModelError) -> Self {
        ApiError::BadRequest(e.to_string())
    }
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::NodeConflict(id) => ApiError::Conflict(format!("node {id} already registered")),
            StoreError::NodeNotFound(id) => ApiError::NotFound(format!("node {id}")),
            StoreError::JobNotFound(id) => ApiError::NotFound(format!("job {id}")),
            StoreError::JobConcurrencyConflict { .. } => ApiError::ConcurrencyConflict,
            StoreError::InvalidTransition { .. } => ApiError::InvalidTransition,
            StoreError::LockConflict(path) => ApiError::Conflict(format!("lock on {path}")),
            StoreError::LockNotOwner { path, node } => {
                ApiError::Forbidden.tap_log(&format!("{node} does not own lock on {path}"))
            }
            StoreError::FolderProgressNotFound(id) => ApiError::NotFound(format!("folder progress {id}")),
            StoreError::Timeout => ApiError::Timeout,
            other => ApiError::Internal(anyhow::anyhow!(other)),
        }
    }
}

impl ApiError {
    fn tap_log(self, message: &str) -> Self {
        error!(%message, "store error mapped to api error");
        self
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::ConcurrencyConflict => StatusCode::CONFLICT,
            ApiError::InvalidTransition => StatusCode::BAD_REQUEST,
            ApiError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        if let ApiError::Internal(source) = &self {
            let correlation_id = Uuid::new_v4();
            error!(%correlation_id, error = %source, "internal error");
            return (
                status,
                Json(json!({ "error": "internal error", "correlationId": correlation_id })),
            )
                .into_response();
        }

        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
