use libsql::{Builder, Connection, Database};
use std::sync::Arc;
use tracing::{info, instrument};

use crate::errors::StoreError;
use crate::schema;

/// Handle to the durable store. Cloning is cheap: it shares the underlying
/// `libsql::Database` and, for in-memory databases, the anchor connection
/// that keeps the schema alive for the process lifetime.
#[derive(Clone)]
pub struct StoreClient {
    database: Arc<Database>,
    _memory_anchor: Option<Arc<Connection>>,
}

impl StoreClient {
    /// Connect to `url`, which may be `:memory:`, a local file path, or a
    /// remote `libsql://...` URL (in which case `auth_token` is required).
    #[instrument(skip(auth_token))]
    pub async fn connect(url: &str, auth_token: Option<String>) -> Result<Self, StoreError> {
        if url.is_empty() {
            return Err(StoreError::Connection("store.connection is empty".into()));
        }

        let is_remote = url.starts_with("libsql://") || url.starts_with("https://");
        let is_memory = url.contains(":memory:");

        let database = if is_remote {
            let token = auth_token
                .ok_or_else(|| StoreError::Connection("remote store requires an auth token".into()))?;
            Builder::new_remote(url.to_string(), token)
                .build()
                .await
                .map_err(|e| StoreError::Connection(e.to_string()))?
        } else {
            Builder::new_local(url)
                .build()
                .await
                .map_err(|e| StoreError::Connection(e.to_string()))?
        };

        let database = Arc::new(database);
        let mut anchor = None;

        if is_memory {
            // An in-memory libsql database is dropped once its last
            // connection closes; keep one open for the process lifetime so
            // the schema survives between repository calls.
            let anchor_conn = database
                .connect()
                .map_err(|e| StoreError::Connection(e.to_string()))?;
            schema::apply_schema(&anchor_conn).await?;
            anchor = Some(Arc::new(anchor_conn));
            info!("store anchored in memory");
        } else {
            let bootstrap_conn = database
                .connect()
                .map_err(|e| StoreError::Connection(e.to_string()))?;
            schema::apply_schema(&bootstrap_conn).await?;
        }

        Ok(Self {
            database,
            _memory_anchor: anchor,
        })
    }

    pub fn connection(&self) -> Result<Connection, StoreError> {
        self.database
            .connect()
            .map_err(|e| StoreError::Connection(e.to_string()))
    }

    /// Used by the API health check: a cheap round trip that fails the
    /// same way any other store access would on an unreachable database.
    pub async fn ping(&self) -> Result<(), StoreError> {
        let conn = self.connection()?;
        conn.query("SELECT 1", ()).await?;
        Ok(())
    }
}
