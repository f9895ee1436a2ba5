use axum::extract::State;
use axum::http::StatusCode;
use axum::{Extension, Json};
use nodeforge_models::event::EventKind;
use nodeforge_models::lock::{AcquireOutcome, LockChangeKind};
use nodeforge_models::{path, Event, FileLock};
use serde::Deserialize;
use serde_json::json;

use crate::error::{ApiError, ApiResult};
use crate::middleware::AuthenticatedNode;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct LockRequest {
    #[serde(rename = "filePath")]
    pub file_path: String,
    #[serde(rename = "nodeId")]
    pub node_id: String,
    /// Locks a whole folder subtree rather than a single file, so the key
    /// is namespaced via `path::folder_lock_key` instead of `path::normalize`
    /// and can never collide with a file lock on the same string.
    #[serde(rename = "isFolder", default)]
    pub is_folder: bool,
}

fn require_same_actor(caller: &AuthenticatedNode, claimed_node_id: &str) -> ApiResult<()> {
    if caller.node_id != claimed_node_id {
        return Err(ApiError::Forbidden);
    }
    Ok(())
}

fn lock_key(request: &LockRequest) -> ApiResult<String> {
    if request.is_folder {
        Ok(path::folder_lock_key(&request.file_path)?)
    } else {
        Ok(path::normalize(&request.file_path)?)
    }
}

/// POST /api/filelocks/acquire.
pub async fn acquire(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthenticatedNode>,
    Json(body): Json<LockRequest>,
) -> ApiResult<StatusCode> {
    require_same_actor(&caller, &body.node_id)?;
    let key = lock_key(&body)?;

    match state.locks.try_acquire(&key, &body.node_id, state.lock_expiry_window).await? {
        AcquireOutcome::Acquired => {
            state.events.publish(Event::new(EventKind::LockChanged {
                path: key,
                kind: LockChangeKind::Acquired,
            }));
            Ok(StatusCode::NO_CONTENT)
        }
        AcquireOutcome::Conflict => Err(ApiError::Conflict(format!("lock on {key} is held"))),
    }
}

/// POST /api/filelocks/release.
pub async fn release(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthenticatedNode>,
    Json(body): Json<LockRequest>,
) -> ApiResult<StatusCode> {
    require_same_actor(&caller, &body.node_id)?;
    let key = lock_key(&body)?;

    state.locks.release(&key, &body.node_id).await?;

    state.events.publish(Event::new(EventKind::LockChanged {
        path: key,
        kind: LockChangeKind::Released,
    }));

    Ok(StatusCode::NO_CONTENT)
}

/// POST /api/filelocks/reset — admin-only: clears every lock row.
pub async fn reset(
    State(state): State<AppState>,
    Extension(caller): Extension<AuthenticatedNode>,
) -> ApiResult<Json<serde_json::Value>> {
    if !caller.is_admin {
        return Err(ApiError::Forbidden);
    }

    let cleared = state.locks.reset_all().await?;
    state.events.publish(Event::new(EventKind::LockChanged {
        path: "*".to_string(),
        kind: LockChangeKind::Reset,
    }));

    Ok(Json(json!({ "cleared": cleared })))
}

/// GET /api/filelocks.
pub async fn list(State(state): State<AppState>) -> ApiResult<Json<Vec<FileLock>>> {
    Ok(Json(state.locks.list_all().await?))
}
