use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::job::JobId;
use crate::node::NodeId;

pub type FolderProgressId = i64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FolderStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl FolderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, FolderStatus::Completed | FolderStatus::Failed)
    }

    fn as_str(&self) -> &'static str {
        match self {
            FolderStatus::Pending => "pending",
            FolderStatus::InProgress => "in_progress",
            FolderStatus::Completed => "completed",
            FolderStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for FolderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FolderStatus {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(FolderStatus::Pending),
            "in_progress" => Ok(FolderStatus::InProgress),
            "completed" => Ok(FolderStatus::Completed),
            "failed" => Ok(FolderStatus::Failed),
            other => Err(ModelError::InvalidJobStatus(other.to_string())),
        }
    }
}

/// A subunit of a fan-out job owned by at most one node at a time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskFolderProgress {
    pub id: FolderProgressId,
    pub task_id: JobId,
    pub folder_path: String,
    pub folder_name: String,
    pub status: FolderStatus,
    pub assigned_node_id: Option<NodeId>,
    pub assigned_node_name: Option<String>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub progress: f64,
    pub error_message: Option<String>,
    pub output_path: Option<String>,
}

pub fn clamp_progress(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}

/// Partial update applied to a folder-progress row; `None` fields are left
/// untouched, `Some(None)` clears a nullable field.
#[derive(Debug, Clone, Default)]
pub struct FolderProgressUpdate {
    pub status: Option<FolderStatus>,
    pub assigned_node_id: Option<Option<NodeId>>,
    pub assigned_node_name: Option<Option<String>>,
    pub progress: Option<f64>,
    pub error_message: Option<Option<String>>,
    pub output_path: Option<Option<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn progress_is_clamped_into_unit_interval() {
        assert_eq!(clamp_progress(-0.5), 0.0);
        assert_eq!(clamp_progress(1.5), 1.0);
        assert_eq!(clamp_progress(0.42), 0.42);
    }
}
