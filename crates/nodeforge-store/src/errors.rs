use thiserror::Error;

/// Failure catalog for the persistent store (C3). The API layer (`apps/
/// nodeforged`) maps every variant onto an HTTP status.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database connection failed: {0}")]
    Connection(String),

    #[error("database query failed: {0}")]
    Query(#[from] libsql::Error),

    #[error("row mapping failed: {0}")]
    Mapping(String),

    #[error("node {0} already registered")]
    NodeConflict(String),

    #[error("node {0} not found")]
    NodeNotFound(String),

    #[error("job {0} not found")]
    JobNotFound(i64),

    #[error("job {job_id} row version mismatch: caller supplied {supplied}")]
    JobConcurrencyConflict { job_id: i64, supplied: i64 },

    #[error("transition from {from:?} to {to:?} is not legal")]
    InvalidTransition {
        from: nodeforge_models::JobStatus,
        to: nodeforge_models::JobStatus,
    },

    #[error("lock on {0} is held by another node")]
    LockConflict(String),

    #[error("node {node} does not own the lock on {path}")]
    LockNotOwner { path: String, node: String },

    #[error("folder progress row {0} not found")]
    FolderProgressNotFound(i64),

    #[error("operation timed out")]
    Timeout,
}
