//! Per-device backup results within a job.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Terminal status of a single device's backup attempt within a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResultStatus {
    Success,
    Failed,
    Skipped,
}

impl ResultStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ResultStatus::Success => "success",
            ResultStatus::Failed => "failed",
            ResultStatus::Skipped => "skipped",
        }
    }
}

/// One device's outcome within a [`crate::domain::BackupJob`].
///
/// BackupResults are append-only within a job: at most one in-flight
/// attempt and exactly one terminal result per `(job_id, device_id)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupResult {
    pub id: String,
    pub job_id: String,
    pub device_id: String,
    pub status: ResultStatus,
    pub config_hash: Option<String>,
    pub gitea_commit_sha: Option<String>,
    pub error_message: Option<String>,
    pub duration_seconds: Option<f64>,
    pub backed_up_at: DateTime<Utc>,
}

impl BackupResult {
    pub fn success(
        job_id: impl Into<String>,
        device_id: impl Into<String>,
        config_hash: String,
        gitea_commit_sha: String,
        duration_seconds: f64,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            job_id: job_id.into(),
            device_id: device_id.into(),
            status: ResultStatus::Success,
            config_hash: Some(config_hash),
            gitea_commit_sha: Some(gitea_commit_sha),
            error_message: None,
            duration_seconds: Some(duration_seconds),
            backed_up_at: Utc::now(),
        }
    }

    pub fn failed(
        job_id: impl Into<String>,
        device_id: impl Into<String>,
        error_message: String,
        duration_seconds: Option<f64>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            job_id: job_id.into(),
            device_id: device_id.into(),
            status: ResultStatus::Failed,
            config_hash: None,
            gitea_commit_sha: None,
            error_message: Some(error_message),
            duration_seconds,
            backed_up_at: Utc::now(),
        }
    }

    pub fn to_record(&self) -> netbackup_state::BackupResultRecord {
        netbackup_state::BackupResultRecord {
            id: self.id.clone(),
            job_id: self.job_id.clone(),
            device_id: self.device_id.clone(),
            status: self.status.as_str().to_string(),
            config_hash: self.config_hash.clone(),
            gitea_commit_sha: self.gitea_commit_sha.clone(),
            error_message: self.error_message.clone(),
            duration_seconds: self.duration_seconds,
            backed_up_at: self.backed_up_at,
        }
    }
}
