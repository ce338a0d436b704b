//! SurrealDB table schemas for the NetBackup Orchestrator (spec §3).
//!
//! Tables: `sites`, `credential_sets`, `devices`, `backup_jobs`,
//! `backup_results`, `backup_schedules`. Every record carries an
//! application-assigned `id` (a UUID string or short site/credential code),
//! indexed `UNIQUE`, rather than relying on SurrealDB's own record links —
//! foreign keys are plain string fields compared by value. Enum-shaped
//! fields (`platform`, `status`, `frequency`) are stored as their wire
//! strings; `netbackup-core` owns the typed enums and converts at the
//! boundary, since this crate must not depend back on `netbackup-core`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// (De)serializes `DateTime<Utc>` through SurrealDB's native datetime type.
mod surreal_datetime {
    use chrono::{DateTime, Utc};
    use serde::{self, Deserialize, Deserializer, Serializer};
    use surrealdb::sql::Datetime as SurrealDatetime;

    pub fn serialize<S>(date: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        SurrealDatetime::from(*date).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let sd = SurrealDatetime::deserialize(deserializer)?;
        Ok(DateTime::from(sd))
    }
}

/// Same as [`surreal_datetime`] for `Option<DateTime<Utc>>`.
mod surreal_datetime_opt {
    use chrono::{DateTime, Utc};
    use serde::{self, Deserialize, Deserializer, Serializer};
    use surrealdb::sql::Datetime as SurrealDatetime;

    pub fn serialize<S>(date: &Option<DateTime<Utc>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        date.map(SurrealDatetime::from).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let sd = Option::<SurrealDatetime>::deserialize(deserializer)?;
        Ok(sd.map(DateTime::from))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteRecord {
    pub id: String,
    pub code: String,
    pub name: String,
    pub gitea_repo_name: String,
    #[serde(with = "surreal_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "surreal_datetime")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialSetRecord {
    pub id: String,
    pub label: String,
    pub username: String,
    pub encrypted_password: String,
    #[serde(with = "surreal_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "surreal_datetime")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceRecord {
    pub id: String,
    pub hostname: String,
    pub ip: String,
    /// Wire form of `netbackup_core::domain::Platform` (`ios`, `nxos`, …).
    pub platform: String,
    pub site_id: String,
    pub credential_id: Option<String>,
    pub enabled: bool,
    #[serde(with = "surreal_datetime")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "surreal_datetime")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupJobRecord {
    pub id: String,
    pub triggered_by: String,
    /// `running` | `complete` | `failed`.
    pub status: String,
    pub total_devices: i64,
    pub completed_devices: i64,
    pub failed_devices: i64,
    #[serde(with = "surreal_datetime")]
    pub triggered_at: DateTime<Utc>,
    #[serde(with = "surreal_datetime_opt")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(with = "surreal_datetime_opt")]
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupResultRecord {
    pub id: String,
    pub job_id: String,
    pub device_id: String,
    /// `success` | `failed` | `skipped`.
    pub status: String,
    pub config_hash: Option<String>,
    pub gitea_commit_sha: Option<String>,
    pub error_message: Option<String>,
    pub duration_seconds: Option<f64>,
    #[serde(with = "surreal_datetime")]
    pub backed_up_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupScheduleRecord {
    pub id: String,
    pub name: String,
    /// `hourly` | `daily` | `weekly`.
    pub frequency: String,
    pub hour: i64,
    pub day_of_week: i64,
    pub site_id: Option<String>,
    pub enabled: bool,
    #[serde(with = "surreal_datetime_opt")]
    pub last_run_at: Option<DateTime<Utc>>,
    /// The `tokio-cron-scheduler` job UUID this schedule is currently
    /// registered under, if the Scheduler has it live.
    pub scheduler_job_id: Option<String>,
}

/// A device joined with its site and (optionally) its credential set, as
/// produced by [`crate::handle::SurrealHandle::list_enabled_devices`].
#[derive(Debug, Clone)]
pub struct DeviceJoinRow {
    pub device: DeviceRecord,
    pub site: SiteRecord,
    pub credential: Option<CredentialSetRecord>,
}
