use std::time::Duration;

use axum::http::{header, Method};
use axum::routing::{get, post, put};
use axum::{middleware, Router};
use tower_http::cors::{Any, CorsLayer};

use crate::handlers::{auth, folders, health, jobs, locks, nodes, stream};
use crate::middleware::auth_guard;
use crate::state::AppState;

/// Builds the full HTTP router: a public stratum, an authenticated stratum
/// behind `auth_guard`, and a permissive CORS layer for dashboard clients.
pub fn build(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
        .max_age(Duration::from_secs(3600));

    let public = Router::new()
        .route("/api/auth/register", post(auth::register))
        .route("/api/auth/login", post(auth::login))
        .route("/api/nodes", get(nodes::list))
        .route("/api/filelocks", get(locks::list))
        .route("/api/health", get(health::health));

    let authenticated = Router::new()
        .route("/api/nodes/heartbeat", post(nodes::heartbeat))
        .route("/api/tasks", get(jobs::list).post(jobs::create))
        .route("/api/tasks/:id", get(jobs::get).put(jobs::update).delete(jobs::delete))
        .route("/api/tasks/:id/folders", get(folders::list).post(folders::create))
        .route("/api/folders/:id", put(folders::update))
        .route("/api/filelocks/acquire", post(locks::acquire))
        .route("/api/filelocks/release", post(locks::release))
        .route("/api/filelocks/reset", post(locks::reset))
        .route("/events", get(stream::events))
        .layer(middleware::from_fn_with_state(state.clone(), auth_guard));

    Router::new()
        .merge(public)
        .merge(authenticated)
        .layer(cors)
        .with_state(state)
}
