use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::node::NodeId;

pub type LockId = i64;

/// A single row of exclusive ownership over a normalized path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileLock {
    pub id: LockId,
    /// Already normalized via `crate::path::normalize` before storage.
    pub file_path: String,
    pub locking_node_id: NodeId,
    pub acquired_at: DateTime<Utc>,
    pub last_updated_at: DateTime<Utc>,
}

impl FileLock {
    pub fn is_stale(&self, now: DateTime<Utc>, expiry: chrono::Duration) -> bool {
        now - self.last_updated_at > expiry
    }
}

/// Outcome of attempting to acquire a lock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AcquireOutcome {
    Acquired,
    Conflict,
}

/// Kinds of lock change the event bus fans out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LockChangeKind {
    Acquired,
    Released,
    Expired,
    Reset,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::NodeId;
    use std::str::FromStr;

    #[test]
    fn staleness_is_relative_to_expiry_window() {
        let now = Utc::now();
        let lock = FileLock {
            id: 1,
            file_path: "y:/data/shot01".into(),
            locking_node_id: NodeId::from_str("n1").unwrap(),
            acquired_at: now - chrono::Duration::hours(2),
            last_updated_at: now - chrono::Duration::hours(2),
        };
        assert!(lock.is_stale(now, chrono::Duration::minutes(60)));
        assert!(!lock.is_stale(now, chrono::Duration::hours(3)));
    }
}
