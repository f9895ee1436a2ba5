use std::sync::Arc;
use std::time::Duration;

use nodeforge_store::{FolderProgressRepository, JobRepository, LockRepository, NodeRepository, StoreClient};

use crate::services::event_bus::EventBus;
use crate::services::tokens::TokenIssuer;

/// Shared application state, cloned per request: one `Arc`-wrapped
/// repository/manager per concern composed at startup, plus the store
/// handle and event bus every manager needs.
#[derive(Clone)]
pub struct AppState {
    pub store: StoreClient,
    pub nodes: Arc<NodeRepository>,
    pub jobs: Arc<JobRepository>,
    pub locks: Arc<LockRepository>,
    pub folders: Arc<FolderProgressRepository>,
    pub events: Arc<EventBus>,
    pub tokens: Arc<TokenIssuer>,
    pub admin_token: Option<Arc<str>>,
    pub heartbeat_live_window: chrono::Duration,
    pub lock_expiry_window: chrono::Duration,
}

impl AppState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: StoreClient,
        signing_key: String,
        admin_token: Option<String>,
        token_lifetime: Duration,
        heartbeat_live_window: Duration,
        lock_expiry_window: Duration,
    ) -> Self {
        Self {
            nodes: Arc::new(NodeRepository::new(store.clone())),
            jobs: Arc::new(JobRepository::new(store.clone())),
            locks: Arc::new(LockRepository::new(store.clone())),
            folders: Arc::new(FolderProgressRepository::new(store.clone())),
            events: Arc::new(EventBus::new()),
            tokens: Arc::new(TokenIssuer::new(signing_key, token_lifetime)),
            admin_token: admin_token.map(Arc::from),
            heartbeat_live_window: chrono::Duration::from_std(heartbeat_live_window).unwrap_or(chrono::Duration::seconds(120)),
            lock_expiry_window: chrono::Duration::from_std(lock_expiry_window).unwrap_or(chrono::Duration::seconds(3600)),
            store,
        }
    }
}
