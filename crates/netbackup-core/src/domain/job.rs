//! Backup job tracking.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Terminal and in-flight states for a [`BackupJob`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Running,
    Complete,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Complete | JobStatus::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobStatus::Running => "running",
            JobStatus::Complete => "complete",
            JobStatus::Failed => "failed",
        }
    }
}

impl std::str::FromStr for JobStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "running" => Ok(JobStatus::Running),
            "complete" => Ok(JobStatus::Complete),
            "failed" => Ok(JobStatus::Failed),
            other => Err(format!("unknown job status: {other}")),
        }
    }
}

impl From<netbackup_state::BackupJobRecord> for BackupJob {
    fn from(r: netbackup_state::BackupJobRecord) -> Self {
        BackupJob {
            id: r.id,
            triggered_by: r.triggered_by,
            status: r.status.parse().unwrap_or(JobStatus::Failed),
            total_devices: r.total_devices.max(0) as u32,
            completed_devices: r.completed_devices.max(0) as u32,
            failed_devices: r.failed_devices.max(0) as u32,
            triggered_at: r.triggered_at,
            started_at: r.started_at,
            completed_at: r.completed_at,
        }
    }
}

impl BackupJob {
    pub fn to_record(&self) -> netbackup_state::BackupJobRecord {
        netbackup_state::BackupJobRecord {
            id: self.id.clone(),
            triggered_by: self.triggered_by.clone(),
            status: self.status.as_str().to_string(),
            total_devices: self.total_devices as i64,
            completed_devices: self.completed_devices as i64,
            failed_devices: self.failed_devices as i64,
            triggered_at: self.triggered_at,
            started_at: self.started_at,
            completed_at: self.completed_at,
        }
    }
}

/// One invocation of the Backup Engine over a set of devices.
///
/// The Engine owns mutation of this row until it reaches a terminal status
/// (invariant 2: a job reaches `complete`/`failed` exactly once).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupJob {
    pub id: String,
    pub triggered_by: String,
    pub status: JobStatus,
    pub total_devices: u32,
    pub completed_devices: u32,
    pub failed_devices: u32,
    pub triggered_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl BackupJob {
    /// A freshly triggered job, not yet started by the Engine.
    pub fn new(triggered_by: impl Into<String>, total_devices: u32) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            triggered_by: triggered_by.into(),
            status: JobStatus::Running,
            total_devices,
            completed_devices: 0,
            failed_devices: 0,
            triggered_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_complete_and_failed_are_terminal() {
        assert!(!JobStatus::Running.is_terminal());
        assert!(JobStatus::Complete.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
    }
}
