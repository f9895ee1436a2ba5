use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use nodeforge_models::node::{validate_hardware_fingerprint, validate_ip_address};
use nodeforge_models::Node;
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub id: String,
    pub name: String,
    #[serde(rename = "ipAddress")]
    pub ip_address: String,
    #[serde(rename = "hardwareFingerprint")]
    pub hardware_fingerprint: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    #[serde(rename = "nodeId", skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    pub token: String,
}

/// POST /api/auth/register.
pub async fn register(
    State(state): State<AppState>,
    Json(body): Json<RegisterRequest>,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    let id: nodeforge_models::node::NodeId = body
        .id
        .parse()
        .map_err(|e: nodeforge_models::ModelError| ApiError::BadRequest(e.to_string()))?;

    validate_hardware_fingerprint(&body.hardware_fingerprint)?;
    let ip_address = validate_ip_address(&body.ip_address)?;

    let node = Node {
        id: id.clone(),
        name: body.name,
        ip_address,
        hardware_fingerprint: body.hardware_fingerprint,
        is_available: true,
        last_heartbeat: chrono::Utc::now(),
        tags: Vec::new(),
    };

    state.nodes.register(&node).await?;
    state.events.publish(nodeforge_models::Event::new(
        nodeforge_models::event::EventKind::NodeChanged {
            node_id: id.clone(),
            kind: nodeforge_models::node::NodeChangeKind::Registered,
        },
    ));

    let token = state.tokens.issue(id.as_str())?;

    Ok((
        StatusCode::CREATED,
        Json(AuthResponse {
            node_id: Some(id.to_string()),
            token,
        }),
    ))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    #[serde(rename = "nodeId")]
    pub node_id: String,
    #[serde(rename = "hardwareFingerprint")]
    pub hardware_fingerprint: String,
}

/// POST /api/auth/login. A fingerprint mismatch and a missing node both
/// surface as 401 here, never leaking which one it was; any other store
/// failure (e.g. a timeout) still maps through the centralized conversion
/// instead of being folded into "unauthorized".
pub async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> ApiResult<(StatusCode, Json<AuthResponse>)> {
    if body.node_id.trim().is_empty() {
        return Err(ApiError::BadRequest("nodeId is required".to_string()));
    }

    let node = match state.nodes.login(&body.node_id, &body.hardware_fingerprint).await {
        Ok(node) => node,
        Err(nodeforge_store::StoreError::NodeNotFound(_)) => return Err(ApiError::Unauthorized),
        Err(e) => return Err(e.into()),
    };

    let token = state.tokens.issue(node.id.as_str())?;

    Ok((StatusCode::CREATED, Json(AuthResponse { node_id: None, token })))
}
