use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::{Extension, Json};
use nodeforge_models::Node;
use serde::Deserialize;

use crate::error::ApiResult;
use crate::middleware::AuthenticatedNode;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct HeartbeatRequest {
    #[serde(rename = "nodeId")]
    pub node_id: String,
}

/// POST /api/nodes/heartbeat.
pub async fn heartbeat(
    State(state): State<AppState>,
    Extension(_caller): Extension<AuthenticatedNode>,
    Json(body): Json<HeartbeatRequest>,
) -> ApiResult<StatusCode> {
    state.nodes.heartbeat(&body.node_id).await?;

    state.events.publish(nodeforge_models::Event::new(
        nodeforge_models::event::EventKind::NodeChanged {
            node_id: body.node_id.parse().map_err(|_| {
                crate::error::ApiError::Internal(anyhow::anyhow!("stored node id failed to re-parse"))
            })?,
            kind: nodeforge_models::node::NodeChangeKind::HeartbeatRestored,
        },
    ));

    Ok(StatusCode::NO_CONTENT)
}

#[derive(Debug, Deserialize)]
pub struct ListNodesQuery {
    pub available: Option<bool>,
}

/// GET /api/nodes, GET /api/nodes?available=true.
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<ListNodesQuery>,
) -> ApiResult<Json<Vec<Node>>> {
    let nodes = if query.available.unwrap_or(false) {
        state.nodes.list_available(state.heartbeat_live_window).await?
    } else {
        state.nodes.list_all().await?
    };

    Ok(Json(nodes))
}
