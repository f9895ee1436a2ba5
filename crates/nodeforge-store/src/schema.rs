use libsql::Connection;
use tracing::{debug, info, warn};

use crate::errors::StoreError;

/// Base tables, created idempotently as a flat list of `(name, ddl)` pairs
/// applied in order rather than a migration framework, which would be
/// overkill for four tables.
const TABLES: &[(&str, &str)] = &[
    (
        "nodes",
        r#"
        CREATE TABLE IF NOT EXISTS nodes (
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            ip_address TEXT NOT NULL,
            hardware_fingerprint TEXT NOT NULL,
            is_available INTEGER NOT NULL DEFAULT 1,
            last_heartbeat TEXT NOT NULL,
            tags TEXT NOT NULL DEFAULT '[]'
        );
    "#,
    ),
    (
        "jobs",
        r#"
        CREATE TABLE IF NOT EXISTS jobs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL,
            job_type TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending',
            assigned_node_id TEXT,
            created_at TEXT NOT NULL,
            started_at TEXT,
            completed_at TEXT,
            parameters TEXT,
            result_message TEXT,
            priority INTEGER NOT NULL DEFAULT 0,
            row_version INTEGER NOT NULL DEFAULT 0
        );
    "#,
    ),
    (
        "file_locks",
        r#"
        CREATE TABLE IF NOT EXISTS file_locks (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            file_path TEXT NOT NULL UNIQUE,
            locking_node_id TEXT NOT NULL,
            acquired_at TEXT NOT NULL,
            last_updated_at TEXT NOT NULL
        );
    "#,
    ),
    (
        "folder_progress",
        r#"
        CREATE TABLE IF NOT EXISTS folder_progress (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            task_id INTEGER NOT NULL REFERENCES jobs(id),
            folder_path TEXT NOT NULL,
            folder_name TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'pending',
            assigned_node_id TEXT,
            assigned_node_name TEXT,
            created_at TEXT NOT NULL,
            started_at TEXT,
            completed_at TEXT,
            progress REAL NOT NULL DEFAULT 0.0,
            error_message TEXT,
            output_path TEXT,
            UNIQUE(task_id, folder_path)
        );
    "#,
    ),
];

const INDEXES: &[(&str, &str)] = &[
    (
        "idx_jobs_status",
        "CREATE INDEX IF NOT EXISTS idx_jobs_status ON jobs(status);",
    ),
    (
        "idx_jobs_type",
        "CREATE INDEX IF NOT EXISTS idx_jobs_type ON jobs(job_type);",
    ),
    (
        "idx_jobs_status_created",
        "CREATE INDEX IF NOT EXISTS idx_jobs_status_created ON jobs(status, created_at);",
    ),
    (
        "idx_folder_progress_task",
        "CREATE INDEX IF NOT EXISTS idx_folder_progress_task ON folder_progress(task_id);",
    ),
    (
        "idx_nodes_availability",
        "CREATE INDEX IF NOT EXISTS idx_nodes_availability ON nodes(is_available, last_heartbeat);",
    ),
];

pub async fn apply_schema(conn: &Connection) -> Result<(), StoreError> {
    info!("applying store schema");

    for (name, ddl) in TABLES {
        debug!(table = *name, "creating table if absent");
        conn.execute(ddl, ())
            .await
            .map_err(|e| StoreError::Connection(format!("table {name}: {e}")))?;
    }

    for (name, ddl) in INDEXES {
        match conn.execute(ddl, ()).await {
            Ok(_) => debug!(index = *name, "index present"),
            Err(e) => warn!(index = *name, error = %e, "index creation skipped"),
        }
    }

    Ok(())
}
