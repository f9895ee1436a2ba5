use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::ModelError;
use crate::node::NodeId;

/// The kind of payload a job carries. The coordinator never interprets the
/// payload itself — this enum exists purely for routing/filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobType {
    Unknown,
    HelloWorld,
    TestMessage,
    RenderThumbnails,
    FileProcessing,
    RealityCapture,
    PackageTask,
    VolumeCompression,
}

impl JobType {
    pub fn is_fanout(&self) -> bool {
        matches!(self, JobType::VolumeCompression | JobType::RealityCapture)
    }

    fn as_str(&self) -> &'static str {
        match self {
            JobType::Unknown => "unknown",
            JobType::HelloWorld => "hello_world",
            JobType::TestMessage => "test_message",
            JobType::RenderThumbnails => "render_thumbnails",
            JobType::FileProcessing => "file_processing",
            JobType::RealityCapture => "reality_capture",
            JobType::PackageTask => "package_task",
            JobType::VolumeCompression => "volume_compression",
        }
    }
}

impl fmt::Display for JobType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobType {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "hello_world" => JobType::HelloWorld,
            "test_message" => JobType::TestMessage,
            "render_thumbnails" => JobType::RenderThumbnails,
            "file_processing" => JobType::FileProcessing,
            "reality_capture" => JobType::RealityCapture,
            "package_task" => JobType::PackageTask,
            "volume_compression" => JobType::VolumeCompression,
            _ => JobType::Unknown,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    /// Whether `self -> next` is a legal transition. Assignment (setting
    /// `AssignedNodeId`) does not change status at all, so it has no
    /// entry here.
    pub fn can_transition_to(&self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Pending, Running)
                | (Running, Completed)
                | (Running, Failed)
                | (Pending, Cancelled)
                | (Running, Cancelled)
        )
    }

    fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Running => "running",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for JobStatus {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(JobStatus::Pending),
            "running" => Ok(JobStatus::Running),
            "completed" => Ok(JobStatus::Completed),
            "failed" => Ok(JobStatus::Failed),
            "cancelled" => Ok(JobStatus::Cancelled),
            other => Err(ModelError::InvalidJobStatus(other.to_string())),
        }
    }
}

pub type JobId = i64;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub name: String,
    pub job_type: JobType,
    pub status: JobStatus,
    pub assigned_node_id: Option<NodeId>,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub parameters: Option<String>,
    pub result_message: Option<String>,
    /// Secondary sort key within a `CreatedAt desc` listing; does not
    /// affect the state machine.
    #[serde(default)]
    pub priority: i32,
    pub row_version: i64,
}

pub const MAX_PARAMETERS_BYTES: usize = 64 * 1024;

pub fn validate_job_name(name: &str) -> Result<(), ModelError> {
    if name.is_empty() || name.chars().count() > 200 {
        Err(ModelError::InvalidJobName)
    } else {
        Ok(())
    }
}

pub fn validate_job_type(job_type: JobType) -> Result<(), ModelError> {
    if job_type == JobType::Unknown {
        Err(ModelError::UnknownJobType)
    } else {
        Ok(())
    }
}

pub fn validate_parameters(parameters: Option<&str>) -> Result<(), ModelError> {
    match parameters {
        Some(p) if p.len() > MAX_PARAMETERS_BYTES => Err(ModelError::ParametersTooLarge),
        _ => Ok(()),
    }
}

#[derive(Debug, Clone, Default)]
pub struct JobFilter {
    pub status: Option<JobStatus>,
    pub job_type: Option<JobType>,
    pub assigned_node: Option<NodeId>,
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_machine_allows_only_legal_edges() {
        assert!(JobStatus::Pending.can_transition_to(JobStatus::Running));
        assert!(JobStatus::Running.can_transition_to(JobStatus::Completed));
        assert!(JobStatus::Running.can_transition_to(JobStatus::Failed));
        assert!(JobStatus::Pending.can_transition_to(JobStatus::Cancelled));
        assert!(JobStatus::Running.can_transition_to(JobStatus::Cancelled));

        assert!(!JobStatus::Completed.can_transition_to(JobStatus::Running));
        assert!(!JobStatus::Pending.can_transition_to(JobStatus::Completed));
        assert!(!JobStatus::Cancelled.can_transition_to(JobStatus::Pending));
    }

    #[test]
    fn terminal_states_are_sinks() {
        for s in [JobStatus::Completed, JobStatus::Failed, JobStatus::Cancelled] {
            assert!(s.is_terminal());
            for next in [
                JobStatus::Pending,
                JobStatus::Running,
                JobStatus::Completed,
                JobStatus::Failed,
                JobStatus::Cancelled,
            ] {
                assert!(!s.can_transition_to(next));
            }
        }
    }

    #[test]
    fn validates_name_and_parameters() {
        assert!(validate_job_name("").is_err());
        assert!(validate_job_name(&"a".repeat(201)).is_err());
        assert!(validate_job_name("ok").is_ok());
        assert!(validate_parameters(Some(&"x".repeat(MAX_PARAMETERS_BYTES + 1))).is_err());
        assert!(validate_job_type(JobType::Unknown).is_err());
    }
}
