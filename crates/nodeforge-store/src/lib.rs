//! Persistence layer: schema management and typed repositories over a
//! `libsql` connection. Business rules that need more than one row (the
//! job state machine, lock staleness, fan-out aggregation) live here next
//! to the SQL that enforces them, rather than in the API layer.

pub mod client;
pub mod errors;
pub mod repositories;
pub mod schema;

pub use client::StoreClient;
pub use errors::StoreError;
pub use repositories::{FolderProgressRepository, JobRepository, LockRepository, NodeRepository};
