use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::job::{JobId, JobStatus};
use crate::lock::LockChangeKind;
use crate::node::{NodeChangeKind, NodeId};
use crate::progress::FolderStatus;

/// Every typed event the bus can publish, plus one diagnostic kind
/// published when a subscriber falls too far behind to keep up with its
/// queue and gets dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "snake_case")]
pub enum EventKind {
    NodeChanged {
        node_id: NodeId,
        kind: NodeChangeKind,
    },
    JobChanged {
        job_id: JobId,
        from_status: Option<JobStatus>,
        to_status: JobStatus,
    },
    FolderProgressChanged {
        task_id: JobId,
        folder_path: String,
        status: FolderStatus,
        progress: f64,
    },
    LockChanged {
        path: String,
        kind: LockChangeKind,
    },
    SubscriberLagged {
        skipped: u64,
    },
}

/// The frame pushed to `/events` subscribers: `{type, payload, ts}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    #[serde(flatten)]
    pub kind: EventKind,
    pub ts: DateTime<Utc>,
}

impl Event {
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            ts: Utc::now(),
        }
    }
}
