use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use nodeforge_models::job::{validate_job_name, validate_job_type, validate_parameters, JobFilter};
use nodeforge_models::{Job, JobStatus, JobType};
use serde::Deserialize;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ListJobsQuery {
    #[serde(rename = "type")]
    pub job_type: Option<JobType>,
    pub status: Option<JobStatus>,
    pub page: Option<i64>,
    #[serde(rename = "pageSize")]
    pub page_size: Option<i64>,
}

/// GET /api/tasks.
pub async fn list(State(state): State<AppState>, Query(query): Query<ListJobsQuery>) -> ApiResult<Json<Vec<Job>>> {
    let page = query.page.unwrap_or(1).max(1);
    let page_size = query.page_size.unwrap_or(50).clamp(1, 500);

    let filter = JobFilter {
        status: query.status,
        job_type: query.job_type,
        limit: Some(page_size),
        offset: Some((page - 1) * page_size),
        ..Default::default()
    };

    Ok(Json(state.jobs.list(&filter).await?))
}

/// GET /api/tasks/{id}.
pub async fn get(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<Json<Job>> {
    let job = state
        .jobs
        .get(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("job {id}")))?;
    Ok(Json(job))
}

#[derive(Debug, Deserialize)]
pub struct CreateJobRequest {
    pub name: String,
    #[serde(rename = "type")]
    pub job_type: JobType,
    pub parameters: Option<String>,
    #[serde(default)]
    pub priority: i32,
}

/// POST /api/tasks.
pub async fn create(
    State(state): State<AppState>,
    Json(body): Json<CreateJobRequest>,
) -> ApiResult<(StatusCode, Json<Job>)> {
    validate_job_name(&body.name)?;
    validate_job_type(body.job_type)?;
    validate_parameters(body.parameters.as_deref())?;

    let job = state
        .jobs
        .create(&body.name, body.job_type, body.parameters, body.priority)
        .await?;

    state.events.publish(nodeforge_models::Event::new(
        nodeforge_models::event::EventKind::JobChanged {
            job_id: job.id,
            from_status: None,
            to_status: job.status,
        },
    ));

    Ok((StatusCode::CREATED, Json(job)))
}

#[derive(Debug, Deserialize)]
pub struct UpdateJobRequest {
    pub status: Option<JobStatus>,
    #[serde(rename = "resultMessage")]
    pub result_message: Option<String>,
    #[serde(rename = "rowVersion")]
    pub row_version: Option<i64>,
    #[serde(rename = "assignedNodeId")]
    pub assigned_node_id: Option<String>,
}

/// PUT /api/tasks/{id}: a CAS status transition, and/or a reassignment.
/// `rowVersion` is required whenever `status` is supplied, since without
/// it there is nothing to compare-and-set against. Assignment does not
/// touch `status` and carries no concurrency token of its own.
pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<UpdateJobRequest>,
) -> ApiResult<Json<Job>> {
    if let Some(node_id) = &body.assigned_node_id {
        state.jobs.assign_to_node(id, node_id).await?;
    }

    let Some(next_status) = body.status else {
        let job = state
            .jobs
            .get(id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("job {id}")))?;
        return Ok(Json(job));
    };

    let row_version = body
        .row_version
        .ok_or_else(|| ApiError::BadRequest("rowVersion is required when status is set".to_string()))?;

    let before = state
        .jobs
        .get(id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("job {id}")))?;

    let updated = state
        .jobs
        .update_status(id, next_status, body.result_message, row_version)
        .await?;

    state.events.publish(nodeforge_models::Event::new(
        nodeforge_models::event::EventKind::JobChanged {
            job_id: id,
            from_status: Some(before.status),
            to_status: updated.status,
        },
    ));

    Ok(Json(updated))
}

/// DELETE /api/tasks/{id}: cascades to folder-progress rows.
pub async fn delete(State(state): State<AppState>, Path(id): Path<i64>) -> ApiResult<StatusCode> {
    state.jobs.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
