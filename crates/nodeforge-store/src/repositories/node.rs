use chrono::{DateTime, Utc};
use libsql::{params, Row};
use nodeforge_models::node::NodeId;
use nodeforge_models::Node;
use tracing::{info, instrument, warn};

use crate::client::StoreClient;
use crate::errors::StoreError;

/// Repository for the node registry (C4).
pub struct NodeRepository {
    client: StoreClient,
}

impl NodeRepository {
    pub fn new(client: StoreClient) -> Self {
        Self { client }
    }

    /// Insert a new node row. Fails with `NodeConflict` if `id` already
    /// exists, enforced by the primary key and a pre-check so the caller
    /// gets a typed error instead of a raw constraint violation; of two
    /// concurrent registrations for the same id, exactly one succeeds.
    #[instrument(skip(self, node))]
    pub async fn register(&self, node: &Node) -> Result<(), StoreError> {
        let conn = self.client.connection()?;

        let exists = self.find_row(&conn, node.id.as_str()).await?.is_some();
        if exists {
            return Err(StoreError::NodeConflict(node.id.to_string()));
        }

        let affected = conn
            .execute(
                "INSERT INTO nodes (id, name, ip_address, hardware_fingerprint, is_available, last_heartbeat, tags)
                 SELECT ?1, ?2, ?3, ?4, 1, ?5, ?6
                 WHERE NOT EXISTS (SELECT 1 FROM nodes WHERE id = ?1)",
                params![
                    node.id.as_str(),
                    node.name.clone(),
                    node.ip_address.to_string(),
                    node.hardware_fingerprint.clone(),
                    node.last_heartbeat.to_rfc3339(),
                    serde_json::to_string(&node.tags).unwrap_or_else(|_| "[]".into()),
                ],
            )
            .await?;

        if affected == 0 {
            // Lost the insert race to a concurrent Register for the same id.
            return Err(StoreError::NodeConflict(node.id.to_string()));
        }

        info!(node_id = %node.id, "node registered");
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: &str) -> Result<Option<Node>, StoreError> {
        let conn = self.client.connection()?;
        self.find_row(&conn, id).await
    }

    /// Re-checks the fingerprint and refreshes the heartbeat on login;
    /// token issuance itself lives in the API layer, which has no store
    /// dependency.
    #[instrument(skip(self, hardware_fingerprint))]
    pub async fn login(&self, id: &str, hardware_fingerprint: &str) -> Result<Node, StoreError> {
        let conn = self.client.connection()?;
        let node = self
            .find_row(&conn, id)
            .await?
            .ok_or_else(|| StoreError::NodeNotFound(id.to_string()))?;

        if node.hardware_fingerprint != hardware_fingerprint {
            warn!(node_id = %id, "login rejected: fingerprint mismatch");
            return Err(StoreError::NodeNotFound(id.to_string()));
        }

        self.heartbeat(id).await?;
        self.find_row(&conn, id)
            .await?
            .ok_or_else(|| StoreError::NodeNotFound(id.to_string()))
    }

    #[instrument(skip(self))]
    pub async fn heartbeat(&self, id: &str) -> Result<(), StoreError> {
        let conn = self.client.connection()?;
        let affected = conn
            .execute(
                "UPDATE nodes SET last_heartbeat = ?2, is_available = 1 WHERE id = ?1",
                params![id, Utc::now().to_rfc3339()],
            )
            .await?;

        if affected == 0 {
            return Err(StoreError::NodeNotFound(id.to_string()));
        }
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn list_available(&self, live_window: chrono::Duration) -> Result<Vec<Node>, StoreError> {
        let cutoff = (Utc::now() - live_window).to_rfc3339();
        let conn = self.client.connection()?;
        let mut rows = conn
            .query(
                "SELECT id, name, ip_address, hardware_fingerprint, is_available, last_heartbeat, tags
                 FROM nodes WHERE is_available = 1 AND last_heartbeat >= ?1
                 ORDER BY id",
                params![cutoff],
            )
            .await?;

        let mut nodes = Vec::new();
        while let Some(row) = rows.next().await? {
            nodes.push(map_row(&row)?);
        }
        Ok(nodes)
    }

    #[instrument(skip(self))]
    pub async fn list_all(&self) -> Result<Vec<Node>, StoreError> {
        let conn = self.client.connection()?;
        let mut rows = conn
            .query(
                "SELECT id, name, ip_address, hardware_fingerprint, is_available, last_heartbeat, tags
                 FROM nodes ORDER BY id",
                (),
            )
            .await?;

        let mut nodes = Vec::new();
        while let Some(row) = rows.next().await? {
            nodes.push(map_row(&row)?);
        }
        Ok(nodes)
    }

    /// Sweeper-only (C10): flips every node whose heartbeat is older than
    /// `live_window` from available to unavailable and returns the ids
    /// that actually flipped, so the caller can publish exactly one
    /// `HeartbeatLost` event per transition.
    #[instrument(skip(self))]
    pub async fn mark_stale_unavailable(
        &self,
        live_window: chrono::Duration,
    ) -> Result<Vec<NodeId>, StoreError> {
        let cutoff = (Utc::now() - live_window).to_rfc3339();
        let conn = self.client.connection()?;
        let mut rows = conn
            .query(
                "UPDATE nodes SET is_available = 0
                 WHERE is_available = 1 AND last_heartbeat < ?1
                 RETURNING id",
                params![cutoff],
            )
            .await?;

        let mut ids = Vec::new();
        while let Some(row) = rows.next().await? {
            let raw: String = row.get(0)?;
            if let Ok(id) = raw.parse() {
                ids.push(id);
            }
        }
        Ok(ids)
    }

    async fn find_row(&self, conn: &libsql::Connection, id: &str) -> Result<Option<Node>, StoreError> {
        let mut rows = conn
            .query(
                "SELECT id, name, ip_address, hardware_fingerprint, is_available, last_heartbeat, tags
                 FROM nodes WHERE id = ?1",
                params![id],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(map_row(&row)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::StoreClient;

    fn sample_node(id: &str) -> Node {
        Node {
            id: id.parse().unwrap(),
            name: id.to_string(),
            ip_address: "192.168.1.10".parse().unwrap(),
            hardware_fingerprint: "HW1".to_string(),
            is_available: true,
            last_heartbeat: Utc::now(),
            tags: Vec::new(),
        }
    }

    async fn repo() -> NodeRepository {
        NodeRepository::new(StoreClient::connect(":memory:", None).await.unwrap())
    }

    #[tokio::test]
    async fn register_then_duplicate_conflicts() {
        let repo = repo().await;
        repo.register(&sample_node("node-a")).await.unwrap();

        let err = repo.register(&sample_node("node-a")).await.unwrap_err();
        assert!(matches!(err, StoreError::NodeConflict(_)));
    }

    #[tokio::test]
    async fn login_rejects_wrong_fingerprint() {
        let repo = repo().await;
        repo.register(&sample_node("node-a")).await.unwrap();

        let err = repo.login("node-a", "WRONG").await.unwrap_err();
        assert!(matches!(err, StoreError::NodeNotFound(_)));

        let node = repo.login("node-a", "HW1").await.unwrap();
        assert!(node.is_available);
    }

    #[tokio::test]
    async fn mark_stale_unavailable_flips_only_expired_nodes() {
        let repo = repo().await;
        repo.register(&sample_node("node-a")).await.unwrap();

        let flipped = repo.mark_stale_unavailable(chrono::Duration::zero()).await.unwrap();
        assert_eq!(flipped.len(), 1);

        let nodes = repo.list_available(chrono::Duration::seconds(3600)).await.unwrap();
        assert!(nodes.is_empty());
    }
}

fn map_row(row: &Row) -> Result<Node, StoreError> {
    let id_raw: String = row.get(0)?;
    let id: NodeId = id_raw
        .parse()
        .map_err(|_| StoreError::Mapping(format!("invalid stored node id {id_raw:?}")))?;

    let ip_raw: String = row.get(2)?;
    let ip_address = ip_raw
        .parse()
        .map_err(|_| StoreError::Mapping(format!("invalid stored ip {ip_raw:?}")))?;

    let last_heartbeat_raw: String = row.get(5)?;
    let last_heartbeat: DateTime<Utc> = DateTime::parse_from_rfc3339(&last_heartbeat_raw)
        .map_err(|e| StoreError::Mapping(e.to_string()))?
        .with_timezone(&Utc);

    let tags_raw: String = row.get(6)?;
    let tags: Vec<String> = serde_json::from_str(&tags_raw).unwrap_or_default();

    Ok(Node {
        id,
        name: row.get(1)?,
        ip_address,
        hardware_fingerprint: row.get(3)?,
        is_available: row.get::<i64>(4)? != 0,
        last_heartbeat,
        tags,
    })
}
