use chrono::{DateTime, Utc};
use libsql::{params, Row};
use nodeforge_models::job::JobFilter;
use nodeforge_models::{Job, JobStatus, JobType};
use tracing::{info, instrument, warn};

use crate::client::StoreClient;
use crate::errors::StoreError;

/// Repository for the job lifecycle manager.
pub struct JobRepository {
    client: StoreClient,
}

impl JobRepository {
    pub fn new(client: StoreClient) -> Self {
        Self { client }
    }

    #[instrument(skip(self, parameters))]
    pub async fn create(
        &self,
        name: &str,
        job_type: JobType,
        parameters: Option<String>,
        priority: i32,
    ) -> Result<Job, StoreError> {
        let conn = self.client.connection()?;
        let now = Utc::now();

        conn.execute(
            "INSERT INTO jobs (name, job_type, status, created_at, parameters, priority, row_version)
             VALUES (?1, ?2, 'pending', ?3, ?4, ?5, 0)",
            params![
                name,
                job_type.to_string(),
                now.to_rfc3339(),
                parameters,
                priority as i64,
            ],
        )
        .await?;

        let id = conn.last_insert_rowid();
        info!(job_id = id, %job_type, "job created");
        self.get(id)
            .await?
            .ok_or(StoreError::JobNotFound(id))
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: i64) -> Result<Option<Job>, StoreError> {
        let conn = self.client.connection()?;
        self.find_row(&conn, id).await
    }

    #[instrument(skip(self, filter))]
    pub async fn list(&self, filter: &JobFilter) -> Result<Vec<Job>, StoreError> {
        let conn = self.client.connection()?;

        let mut clauses = Vec::new();
        let mut args: Vec<libsql::Value> = Vec::new();

        if let Some(status) = filter.status {
            clauses.push(format!("status = ?{}", args.len() + 1));
            args.push(status.to_string().into());
        }
        if let Some(job_type) = filter.job_type {
            clauses.push(format!("job_type = ?{}", args.len() + 1));
            args.push(job_type.to_string().into());
        }
        if let Some(node) = &filter.assigned_node {
            clauses.push(format!("assigned_node_id = ?{}", args.len() + 1));
            args.push(node.as_str().into());
        }
        if let Some(after) = filter.created_after {
            clauses.push(format!("created_at >= ?{}", args.len() + 1));
            args.push(after.to_rfc3339().into());
        }
        if let Some(before) = filter.created_before {
            clauses.push(format!("created_at <= ?{}", args.len() + 1));
            args.push(before.to_rfc3339().into());
        }

        let where_clause = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };

        let limit = filter.limit.unwrap_or(100).clamp(1, 500);
        let offset = filter.offset.unwrap_or(0).max(0);

        let sql = format!(
            "SELECT id, name, job_type, status, assigned_node_id, created_at, started_at,
                    completed_at, parameters, result_message, priority, row_version
             FROM jobs {where_clause}
             ORDER BY priority DESC, created_at DESC
             LIMIT {limit} OFFSET {offset}"
        );

        let mut rows = conn
            .query(&sql, libsql::params_from_iter(args))
            .await?;

        let mut jobs = Vec::new();
        while let Some(row) = rows.next().await? {
            jobs.push(map_row(&row)?);
        }
        Ok(jobs)
    }

    /// Assigns a non-terminal job to a node without touching `status`,
    /// separate from the status machine so a scheduler can pre-assign a
    /// `Pending` job before it transitions to `Running`. Fails with
    /// `NodeNotFound` if `node_id` isn't in the registry and
    /// `InvalidTransition` if the job is already terminal.
    #[instrument(skip(self))]
    pub async fn assign_to_node(&self, job_id: i64, node_id: &str) -> Result<Job, StoreError> {
        let conn = self.client.connection()?;
        let job = self
            .find_row(&conn, job_id)
            .await?
            .ok_or(StoreError::JobNotFound(job_id))?;

        if job.status.is_terminal() {
            return Err(StoreError::InvalidTransition {
                from: job.status,
                to: job.status,
            });
        }

        let mut rows = conn
            .query("SELECT 1 FROM nodes WHERE id = ?1", params![node_id])
            .await?;
        if rows.next().await?.is_none() {
            return Err(StoreError::NodeNotFound(node_id.to_string()));
        }

        conn.execute(
            "UPDATE jobs SET assigned_node_id = ?2, row_version = row_version + 1 WHERE id = ?1",
            params![job_id, node_id],
        )
        .await?;

        self.find_row(&conn, job_id)
            .await?
            .ok_or(StoreError::JobNotFound(job_id))
    }

    /// CAS status transition: legality is checked against
    /// `JobStatus::can_transition_to` before the write, and the write
    /// itself is gated on `row_version` (`UPDATE ... WHERE id = ? AND
    /// row_version = ?`) so a stale caller loses to whoever updated last.
    #[instrument(skip(self, result_message))]
    pub async fn update_status(
        &self,
        job_id: i64,
        next: JobStatus,
        result_message: Option<String>,
        expected_row_version: i64,
    ) -> Result<Job, StoreError> {
        let conn = self.client.connection()?;
        let job = self
            .find_row(&conn, job_id)
            .await?
            .ok_or(StoreError::JobNotFound(job_id))?;

        if !job.status.can_transition_to(next) {
            return Err(StoreError::InvalidTransition {
                from: job.status,
                to: next,
            });
        }

        let now = Utc::now().to_rfc3339();
        let started_at = if next == JobStatus::Running {
            Some(now.clone())
        } else {
            None
        };
        let completed_at = if next.is_terminal() { Some(now.clone()) } else { None };

        let affected = conn
            .execute(
                "UPDATE jobs SET
                    status = ?2,
                    result_message = ?3,
                    row_version = row_version + 1,
                    started_at = COALESCE(started_at, ?4),
                    completed_at = COALESCE(completed_at, ?5)
                 WHERE id = ?1 AND row_version = ?6",
                params![
                    job_id,
                    next.to_string(),
                    result_message,
                    started_at,
                    completed_at,
                    expected_row_version,
                ],
            )
            .await?;

        if affected == 0 {
            return Err(StoreError::JobConcurrencyConflict {
                job_id,
                supplied: expected_row_version,
            });
        }

        info!(job_id, from = %job.status, to = %next, "job status transitioned");
        self.find_row(&conn, job_id)
            .await?
            .ok_or(StoreError::JobNotFound(job_id))
    }

    /// Fan-out aggregation rule: once every folder row under `job_id` is
    /// terminal, the job itself completes (any `Failed` folder makes the
    /// whole job `Failed`). No-op, and idempotent, while folders remain
    /// pending or the job is already terminal.
    #[instrument(skip(self))]
    pub async fn check_and_complete(&self, job_id: i64) -> Result<Option<Job>, StoreError> {
        let conn = self.client.connection()?;
        let job = self
            .find_row(&conn, job_id)
            .await?
            .ok_or(StoreError::JobNotFound(job_id))?;

        if job.status.is_terminal() {
            return Ok(None);
        }

        let mut rows = conn
            .query(
                "SELECT status FROM folder_progress WHERE task_id = ?1",
                params![job_id],
            )
            .await?;

        let mut total = 0usize;
        let mut terminal = 0usize;
        let mut any_failed = false;
        while let Some(row) = rows.next().await? {
            let status_raw: String = row.get(0)?;
            total += 1;
            match status_raw.as_str() {
                "completed" => terminal += 1,
                "failed" => {
                    terminal += 1;
                    any_failed = true;
                }
                _ => {}
            }
        }

        if total == 0 || terminal < total {
            return Ok(None);
        }

        let next = if any_failed { JobStatus::Failed } else { JobStatus::Completed };
        let message = if any_failed {
            Some("one or more folders failed".to_string())
        } else {
            None
        };

        let updated = self
            .update_status(job_id, next, message, job.row_version)
            .await?;
        Ok(Some(updated))
    }

    /// Deletes a job and cascades to its folder progress rows — the data
    /// model invariant that a job owns its folder breakdown end to end.
    #[instrument(skip(self))]
    pub async fn delete(&self, job_id: i64) -> Result<(), StoreError> {
        let conn = self.client.connection()?;
        conn.execute(
            "DELETE FROM folder_progress WHERE task_id = ?1",
            params![job_id],
        )
        .await?;

        let affected = conn.execute("DELETE FROM jobs WHERE id = ?1", params![job_id]).await?;
        if affected == 0 {
            return Err(StoreError::JobNotFound(job_id));
        }

        warn!(job_id, "job deleted");
        Ok(())
    }

    async fn find_row(&self, conn: &libsql::Connection, id: i64) -> Result<Option<Job>, StoreError> {
        let mut rows = conn
            .query(
                "SELECT id, name, job_type, status, assigned_node_id, created_at, started_at,
                        completed_at, parameters, result_message, priority, row_version
                 FROM jobs WHERE id = ?1",
                params![id],
            )
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(map_row(&row)?)),
            None => Ok(None),
        }
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

fn map_row(row: &Row) -> Result<Job, StoreError> {
    let job_type_raw: String = row.get(2)?;
    let job_type: JobType = job_type_raw
        .parse()
        .unwrap_or(JobType::Unknown);

    let status_raw: String = row.get(3)?;
    let status: JobStatus = status_raw
        .parse()
        .map_err(|_| StoreError::Mapping(format!("invalid stored status {status_raw:?}")))?;

    let assigned_node_id: Option<String> = row.get(4)?;
    let assigned_node_id = assigned_node_id
        .map(|raw| {
            raw.parse()
                .map_err(|_| StoreError::Mapping(format!("invalid stored node id {raw:?}")))
        })
        .transpose()?;

    let created_at_raw: String = row.get(5)?;

    Ok(Job {
        id: row.get(0)?,
        name: row.get(1)?,
        job_type,
        status,
        assigned_node_id,
        created_at: DateTime::parse_from_rfc3339(&created_at_raw)
            .map_err(|e| StoreError::Mapping(e.to_string()))?
            .with_timezone(&Utc),
        started_at: parse_ts(row.get(6)?)?,
        completed_at: parse_ts(row.get(7)?)?,
        parameters: row.get(8)?,
        result_message: row.get(9)?,
        priority: row.get::<i64>(10)? as i32,
        row_version: row.get(11)?,
    })
}
