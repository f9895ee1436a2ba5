use axum::extract::{Request, State};
use axum::http::header;
use axum::middleware::Next;
use axum::response::Response;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::state::AppState;

/// Authenticated identity attached to the request by `auth_guard`,
/// consumed by handlers that need to compare the caller against a
/// `nodeId` named in the request body and reject a mismatched actor with
/// `Forbidden` (e.g. releasing a lock claimed under another node's id).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticatedNode {
    pub node_id: String,
    pub is_admin: bool,
}

/// Verifies the bearer token's HMAC signature and expiry before admitting
/// the request; an admin secret is checked first so admin-only routes
/// don't need a separate guard.
pub async fn auth_guard(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .ok_or(ApiError::Unauthorized)?;

    if let Some(admin_token) = &state.admin_token {
        if token == admin_token.as_ref() {
            req.extensions_mut().insert(AuthenticatedNode {
                node_id: "ADMIN".to_string(),
                is_admin: true,
            });
            return Ok(next.run(req).await);
        }
    }

    let claims = state.tokens.verify(token)?;
    req.extensions_mut().insert(AuthenticatedNode {
        node_id: claims.node_id,
        is_admin: false,
    });

    Ok(next.run(req).await)
}
