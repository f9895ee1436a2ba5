use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use nodeforge_models::event::EventKind;
use nodeforge_models::node::NodeId;
use nodeforge_models::progress::{FolderProgressUpdate, FolderStatus};
use nodeforge_models::{Event, TaskFolderProgress};
use serde::Deserialize;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// GET /api/tasks/{id}/folders.
pub async fn list(State(state): State<AppState>, Path(task_id): Path<i64>) -> ApiResult<Json<Vec<TaskFolderProgress>>> {
    state
        .jobs
        .get(task_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("job {task_id}")))?;

    Ok(Json(state.folders.list_by_task(task_id).await?))
}

#[derive(Debug, Deserialize)]
pub struct CreateFolderRequest {
    #[serde(rename = "folderPath")]
    pub folder_path: String,
    #[serde(rename = "folderName")]
    pub folder_name: String,
}

/// POST /api/tasks/{id}/folders.
pub async fn create(
    State(state): State<AppState>,
    Path(task_id): Path<i64>,
    Json(body): Json<CreateFolderRequest>,
) -> ApiResult<(StatusCode, Json<TaskFolderProgress>)> {
    if body.folder_path.trim().is_empty() || body.folder_name.trim().is_empty() {
        return Err(ApiError::BadRequest("folderPath and folderName are required".to_string()));
    }

    state
        .jobs
        .get(task_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("job {task_id}")))?;

    let row = state.folders.create(task_id, &body.folder_path, &body.folder_name).await?;

    state.events.publish(Event::new(EventKind::FolderProgressChanged {
        task_id,
        folder_path: row.folder_path.clone(),
        status: row.status,
        progress: row.progress,
    }));

    Ok((StatusCode::CREATED, Json(row)))
}

#[derive(Debug, Deserialize, Default)]
pub struct UpdateFolderRequest {
    pub status: Option<FolderStatus>,
    #[serde(rename = "assignedNodeId", default, deserialize_with = "double_option")]
    pub assigned_node_id: Option<Option<NodeId>>,
    #[serde(rename = "assignedNodeName", default, deserialize_with = "double_option")]
    pub assigned_node_name: Option<Option<String>>,
    pub progress: Option<f64>,
    #[serde(rename = "errorMessage", default, deserialize_with = "double_option")]
    pub error_message: Option<Option<String>>,
    #[serde(rename = "outputPath", default, deserialize_with = "double_option")]
    pub output_path: Option<Option<String>>,
}

/// Distinguishes an absent field (`None`) from a field explicitly set to
/// `null` (`Some(None)`) so a partial update can clear a nullable column.
fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: serde::Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Some(Option::deserialize(deserializer)?))
}

/// PUT /api/folders/{id}: partial update, publishes a progress event
/// unconditionally and rolls the owning job up to completion if this
/// update made it terminal.
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateFolderRequest>,
) -> ApiResult<Json<TaskFolderProgress>> {
    let update = FolderProgressUpdate {
        status: body.status,
        assigned_node_id: body.assigned_node_id,
        assigned_node_name: body.assigned_node_name,
        progress: body.progress,
        error_message: body.error_message,
        output_path: body.output_path,
    };

    let row = state.folders.update(id, &update).await?;

    state.events.publish(Event::new(EventKind::FolderProgressChanged {
        task_id: row.task_id,
        folder_path: row.folder_path.clone(),
        status: row.status,
        progress: row.progress,
    }));

    if row.status.is_terminal() {
        state.jobs.check_and_complete(row.task_id).await?;
    }

    Ok(Json(row))
}
