use chrono::{DateTime, Utc};
use libsql::{params, Row};
use nodeforge_models::progress::{FolderProgressUpdate, FolderStatus};
use nodeforge_models::TaskFolderProgress;
use tracing::{info, instrument};

use crate::client::StoreClient;
use crate::errors::StoreError;

/// Repository for per-folder progress tracking (C8), the breakdown rows a
/// fan-out job (`JobType::is_fanout`) owns.
pub struct FolderProgressRepository {
    client: StoreClient,
}

impl FolderProgressRepository {
    pub fn new(client: StoreClient) -> Self {
        Self { client }
    }

    #[instrument(skip(self))]
    pub async fn create(
        &self,
        task_id: i64,
        folder_path: &str,
        folder_name: &str,
    ) -> Result<TaskFolderProgress, StoreError> {
        let conn = self.client.connection()?;
        let now = Utc::now();

        conn.execute(
            "INSERT INTO folder_progress (task_id, folder_path, folder_name, status, created_at, progress)
             VALUES (?1, ?2, ?3, 'pending', ?4, 0.0)",
            params![task_id, folder_path, folder_name, now.to_rfc3339()],
        )
        .await?;

        let id = conn.last_insert_rowid();
        self.get(id)
            .await?
            .ok_or(StoreError::FolderProgressNotFound(id))
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: i64) -> Result<Option<TaskFolderProgress>, StoreError> {
        let conn = self.client.connection()?;
        let mut rows = conn
            .query(
                "SELECT id, task_id, folder_path, folder_name, status, assigned_node_id,
                        assigned_node_name, created_at, started_at, completed_at, progress,
                        error_message, output_path
                 FROM folder_progress WHERE id = ?1",
                params![id],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(map_row(&row)?)),
            None => Ok(None),
        }
    }

    #[instrument(skip(self))]
    pub async fn list_by_task(&self, task_id: i64) -> Result<Vec<TaskFolderProgress>, StoreError> {
        let conn = self.client.connection()?;
        let mut rows = conn
            .query(
                "SELECT id, task_id, folder_path, folder_name, status, assigned_node_id,
                        assigned_node_name, created_at, started_at, completed_at, progress,
                        error_message, output_path
                 FROM folder_progress WHERE task_id = ?1 ORDER BY folder_path",
                params![task_id],
            )
            .await?;

        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(map_row(&row)?);
        }
        Ok(out)
    }

    /// Applies a partial update: only the fields present in
    /// `update` are touched, `COALESCE` keeps the rest. `started_at` is
    /// stamped the first time status moves to `InProgress`, `completed_at`
    /// the first time it becomes terminal — both sticky, like the job's.
    #[instrument(skip(self, update))]
    pub async fn update(
        &self,
        id: i64,
        update: &FolderProgressUpdate,
    ) -> Result<TaskFolderProgress, StoreError> {
        let conn = self.client.connection()?;
        let now = Utc::now().to_rfc3339();

        let status_str = update.status.map(|s| s.to_string());
        let starts_running = matches!(update.status, Some(FolderStatus::InProgress));
        let becomes_terminal = update.status.map(|s| s.is_terminal()).unwrap_or(false);

        let assigned_node_id = update
            .assigned_node_id
            .as_ref()
            .map(|inner| inner.as_ref().map(|n| n.to_string()));
        let assigned_node_name = update.assigned_node_name.clone();
        let error_message = update.error_message.clone();
        let output_path = update.output_path.clone();

        let affected = conn
            .execute(
                "UPDATE folder_progress SET
                    status = COALESCE(?2, status),
                    assigned_node_id = CASE WHEN ?3 THEN ?4 ELSE assigned_node_id END,
                    assigned_node_name = CASE WHEN ?5 THEN ?6 ELSE assigned_node_name END,
                    progress = COALESCE(?7, progress),
                    error_message = CASE WHEN ?8 THEN ?9 ELSE error_message END,
                    output_path = CASE WHEN ?10 THEN ?11 ELSE output_path END,
                    started_at = CASE WHEN ?12 THEN COALESCE(started_at, ?13) ELSE started_at END,
                    completed_at = CASE WHEN ?14 THEN COALESCE(completed_at, ?13) ELSE completed_at END
                 WHERE id = ?1",
                params![
                    id,
                    status_str,
                    update.assigned_node_id.is_some(),
                    assigned_node_id.flatten(),
                    update.assigned_node_name.is_some(),
                    assigned_node_name.flatten(),
                    update.progress.map(nodeforge_models::progress::clamp_progress),
                    update.error_message.is_some(),
                    error_message.flatten(),
                    update.output_path.is_some(),
                    output_path.flatten(),
                    starts_running,
                    now,
                    becomes_terminal,
                ],
            )
            .await?;

        if affected == 0 {
            return Err(StoreError::FolderProgressNotFound(id));
        }

        info!(folder_progress_id = id, "folder progress updated");
        self.get(id)
            .await?
            .ok_or(StoreError::FolderProgressNotFound(id))
    }

    #[instrument(skip(self))]
    pub async fn delete_by_task(&self, task_id: i64) -> Result<u64, StoreError> {
        let conn = self.client.connection()?;
        conn.execute(
            "DELETE FROM folder_progress WHERE task_id = ?1",
            params![task_id],
        )
        .await
        .map_err(StoreError::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::StoreClient;
    use crate::repositories::JobRepository;
    use nodeforge_models::JobType;

    async fn setup() -> (FolderProgressRepository, i64) {
        let client = StoreClient::connect(":memory:", None).await.unwrap();
        let jobs = JobRepository::new(client.clone());
        let job = jobs.create("unpack-archive", JobType::VolumeCompression, None, 0).await.unwrap();
        (FolderProgressRepository::new(client), job.id)
    }

    #[tokio::test]
    async fn create_then_list_by_task() {
        let (repo, task_id) = setup().await;
        repo.create(task_id, "/a", "a").await.unwrap();
        repo.create(task_id, "/b", "b").await.unwrap();

        let rows = repo.list_by_task(task_id).await.unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].status, FolderStatus::Pending);
    }

    #[tokio::test]
    async fn partial_update_only_touches_supplied_fields() {
        let (repo, task_id) = setup().await;
        let row = repo.create(task_id, "/a", "a").await.unwrap();

        let update = FolderProgressUpdate {
            progress: Some(0.5),
            ..Default::default()
        };
        let updated = repo.update(row.id, &update).await.unwrap();

        assert_eq!(updated.progress, 0.5);
        assert_eq!(updated.status, FolderStatus::Pending);
        assert!(updated.error_message.is_none());
    }

    #[tokio::test]
    async fn explicit_null_clears_a_nullable_field() {
        let (repo, task_id) = setup().await;
        let row = repo.create(task_id, "/a", "a").await.unwrap();

        repo.update(
            row.id,
            &FolderProgressUpdate {
                error_message: Some(Some("boom".to_string())),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        let cleared = repo
            .update(
                row.id,
                &FolderProgressUpdate {
                    error_message: Some(None),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert!(cleared.error_message.is_none());
    }

    #[tokio::test]
    async fn update_of_missing_row_is_not_found() {
        let (repo, _task_id) = setup().await;
        let err = repo.update(999, &FolderProgressUpdate::default()).await.unwrap_err();
        assert!(matches!(err, StoreError::FolderProgressNotFound(999)));
    }
}

fn parse_ts(raw: Option<String>) -> Result<Option<DateTime<Utc>>, StoreError> {
    match raw {
        Some(s) => Ok(Some(
            DateTime::parse_from_rfc3339(&s)
                .map_err(|e| StoreError::Mapping(e.to_string()))?
                .with_timezone(&Utc),
        )),
        None => Ok(None),
    }
}

fn map_row(row: &Row) -> Result<TaskFolderProgress, StoreError> {
    let status_raw: String = row.get(4)?;
    let status: FolderStatus = status_raw
        .parse()
        .map_err(|_| StoreError::Mapping(format!("invalid stored folder status {status_raw:?}")))?;

    let assigned_node_id: Option<String> = row.get(5)?;
    let assigned_node_id = assigned_node_id
        .map(|raw| {
            raw.parse()
                .map_err(|_| StoreError::Mapping(format!("invalid stored node id {raw:?}")))
        })
        .transpose()?;

    let created_at_raw: String = row.get(7)?;

    Ok(TaskFolderProgress {
        id: row.get(0)?,
        task_id: row.get(1)?,
        folder_path: row.get(2)?,
        folder_name: row.get(3)?,
        status,
        assigned_node_id,
        assigned_node_name: row.get(6)?,
        created_at: DateTime::parse_from_rfc3339(&created_at_raw)
            .map_err(|e| StoreError::Mapping(e.to_string()))?
            .with_timezone(&Utc),
        started_at: parse_ts(row.get(8)?)?,
        completed_at: parse_ts(row.get(9)?)?,
        progress: row.get(10)?,
        error_message: row.get(11)?,
        output_path: row.get(12)?,
    })
}
