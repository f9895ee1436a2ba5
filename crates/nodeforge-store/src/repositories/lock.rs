use chrono::Utc;
use libsql::{params, Row};
use nodeforge_models::lock::AcquireOutcome;
use nodeforge_models::FileLock;
use tracing::{info, instrument};

use crate::client::StoreClient;
use crate::errors::StoreError;

/// Repository for the path lock manager.
///
/// Callers are responsible for normalizing `file_path` via
/// `nodeforge_models::path::normalize` (or `folder_lock_key` for a
/// whole-folder lock) before calling in here — the repository itself
/// treats it as an opaque unique key.
pub struct LockRepository {
    client: StoreClient,
}

impl LockRepository {
    pub fn new(client: StoreClient) -> Self {
        Self { client }
    }

    /// Atomic claim-if-free-or-expired in one statement: a plain insert
    /// races nobody (unique index), and the `ON CONFLICT ... WHERE` clause
    /// only fires the update when the caller already owns the row or the
    /// existing owner is stale, leaving an untouched, unreturned row
    /// (i.e. `Conflict`) otherwise.
    #[instrument(skip(self))]
    pub async fn try_acquire(
        &self,
        normalized_path: &str,
        node_id: &str,
        expiry: chrono::Duration,
    ) -> Result<AcquireOutcome, StoreError> {
        let now = Utc::now();
        let cutoff = now - expiry;
        let conn = self.client.connection()?;

        let mut rows = conn
            .query(
                "INSERT INTO file_locks (file_path, locking_node_id, acquired_at, last_updated_at)
                 VALUES (?1, ?2, ?3, ?3)
                 ON CONFLICT(file_path) DO UPDATE SET
                     locking_node_id = excluded.locking_node_id,
                     acquired_at = CASE
                         WHEN file_locks.locking_node_id = excluded.locking_node_id
                         THEN file_locks.acquired_at
                         ELSE excluded.acquired_at
                     END,
                     last_updated_at = excluded.last_updated_at
                 WHERE file_locks.locking_node_id = excluded.locking_node_id
                    OR file_locks.last_updated_at < ?4
                 RETURNING locking_node_id",
                params![normalized_path, node_id, now.to_rfc3339(), cutoff.to_rfc3339()],
            )
            .await?;

        match rows.next().await? {
            Some(_) => {
                info!(path = normalized_path, node_id, "lock acquired");
                Ok(AcquireOutcome::Acquired)
            }
            None => Ok(AcquireOutcome::Conflict),
        }
    }

    #[instrument(skip(self))]
    pub async fn release(&self, normalized_path: &str, node_id: &str) -> Result<(), StoreError> {
        let conn = self.client.connection()?;
        let affected = conn
            .execute(
                "DELETE FROM file_locks WHERE file_path = ?1 AND locking_node_id = ?2",
                params![normalized_path, node_id],
            )
            .await?;

        if affected == 0 {
            return Err(StoreError::LockNotOwner {
                path: normalized_path.to_string(),
                node: node_id.to_string(),
            });
        }
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn reset_all(&self) -> Result<u64, StoreError> {
        let conn = self.client.connection()?;
        let affected = conn.execute("DELETE FROM file_locks", ()).await?;
        Ok(affected)
    }

    #[instrument(skip(self))]
    pub async fn list_all(&self) -> Result<Vec<FileLock>, StoreError> {
        let conn = self.client.connection()?;
        let mut rows = conn
            .query(
                "SELECT id, file_path, locking_node_id, acquired_at, last_updated_at
                 FROM file_locks ORDER BY file_path",
                (),
            )
            .await?;

        let mut locks = Vec::new();
        while let Some(row) = rows.next().await? {
            locks.push(map_row(&row)?);
        }
        Ok(locks)
    }

    /// Sweeper-only (C10): deletes rows older than `expiry` and returns the
    /// deleted paths, one `LockChanged{Expired}` event per row.
    #[instrument(skip(self))]
    pub async fn expire_stale(&self, expiry: chrono::Duration) -> Result<Vec<String>, StoreError> {
        let cutoff = (Utc::now() - expiry).to_rfc3339();
        let conn = self.client.connection()?;
        let mut rows = conn
            .query(
                "DELETE FROM file_locks WHERE last_updated_at < ?1 RETURNING file_path",
                params![cutoff],
            )
            .await?;

        let mut paths = Vec::new();
        while let Some(row) = rows.next().await? {
            paths.push(row.get(0)?);
        }
        Ok(paths)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::StoreClient;

    async fn repo() -> LockRepository {
        let client = StoreClient::connect(":memory:", None).await.unwrap();
        LockRepository::new(client)
    }

    #[tokio::test]
    async fn acquire_then_conflict_from_a_different_node() {
        let repo = repo().await;
        let expiry = chrono::Duration::seconds(3600);

        let outcome = repo.try_acquire("/shards/a", "node-a", expiry).await.unwrap();
        assert_eq!(outcome, AcquireOutcome::Acquired);

        let outcome = repo.try_acquire("/shards/a", "node-b", expiry).await.unwrap();
        assert_eq!(outcome, AcquireOutcome::Conflict);
    }

    #[tokio::test]
    async fn reacquire_by_the_same_owner_succeeds() {
        let repo = repo().await;
        let expiry = chrono::Duration::seconds(3600);

        repo.try_acquire("/shards/a", "node-a", expiry).await.unwrap();
        let outcome = repo.try_acquire("/shards/a", "node-a", expiry).await.unwrap();
        assert_eq!(outcome, AcquireOutcome::Acquired);
    }

    #[tokio::test]
    async fn stale_lock_can_be_stolen() {
        let repo = repo().await;

        repo.try_acquire("/shards/a", "node-a", chrono::Duration::seconds(3600)).await.unwrap();

        // An expiry window of zero treats every existing row as stale.
        let outcome = repo.try_acquire("/shards/a", "node-b", chrono::Duration::zero()).await.unwrap();
        assert_eq!(outcome, AcquireOutcome::Acquired);
    }

    #[tokio::test]
    async fn release_by_non_owner_is_rejected() {
        let repo = repo().await;
        let expiry = chrono::Duration::seconds(3600);

        repo.try_acquire("/shards/a", "node-a", expiry).await.unwrap();
        let err = repo.release("/shards/a", "node-b").await.unwrap_err();
        assert!(matches!(err, StoreError::LockNotOwner { .. }));
    }

    #[tokio::test]
    async fn expire_stale_returns_expired_paths_only() {
        let repo = repo().await;

        repo.try_acquire("/shards/fresh", "node-a", chrono::Duration::seconds(3600)).await.unwrap();
        repo.try_acquire("/shards/stale", "node-b", chrono::Duration::seconds(3600)).await.unwrap();

        let expired = repo.expire_stale(chrono::Duration::zero()).await.unwrap();
        assert_eq!(expired.len(), 2);

        let remaining = repo.list_all().await.unwrap();
        assert!(remaining.is_empty());
    }
}

fn map_row(row: &Row) -> Result<FileLock, StoreError> {
    let locking_node_id_raw: String = row.get(2)?;
    let locking_node_id = locking_node_id_raw
        .parse()
        .map_err(|_| StoreError::Mapping(format!("invalid stored node id {locking_node_id_raw:?}")))?;

    let acquired_at_raw: String = row.get(3)?;
    let last_updated_raw: String = row.get(4)?;

    Ok(FileLock {
        id: row.get(0)?,
        file_path: row.get(1)?,
        locking_node_id,
        acquired_at: chrono::DateTime::parse_from_rfc3339(&acquired_at_raw)
            .map_err(|e| StoreError::Mapping(e.to_string()))?
            .with_timezone(&Utc),
        last_updated_at: chrono::DateTime::parse_from_rfc3339(&last_updated_raw)
            .map_err(|e| StoreError::Mapping(e.to_string()))?
            .with_timezone(&Utc),
    })
}
