//! Recurring backup schedules.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How often a [`BackupSchedule`] fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleFrequency {
    Hourly,
    Daily,
    Weekly,
}

impl ScheduleFrequency {
    pub fn as_str(self) -> &'static str {
        match self {
            ScheduleFrequency::Hourly => "hourly",
            ScheduleFrequency::Daily => "daily",
            ScheduleFrequency::Weekly => "weekly",
        }
    }
}

impl std::str::FromStr for ScheduleFrequency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hourly" => Ok(ScheduleFrequency::Hourly),
            "daily" => Ok(ScheduleFrequency::Daily),
            "weekly" => Ok(ScheduleFrequency::Weekly),
            other => Err(format!("unknown schedule frequency: {other}")),
        }
    }
}

/// A recurring backup trigger, registered with the Scheduler as a cron job
/// keyed by `backup_schedule_{id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackupSchedule {
    pub id: String,
    pub name: String,
    pub frequency: ScheduleFrequency,
    /// 0-23, UTC.
    pub hour: u8,
    /// 0-6, Mon=0. Only meaningful for `Weekly`.
    pub day_of_week: u8,
    /// Restrict to devices at this site; `None` means all sites.
    pub site_id: Option<String>,
    pub enabled: bool,
    pub last_run_at: Option<DateTime<Utc>>,
}

impl From<netbackup_state::BackupScheduleRecord> for BackupSchedule {
    fn from(r: netbackup_state::BackupScheduleRecord) -> Self {
        BackupSchedule {
            id: r.id,
            name: r.name,
            frequency: r.frequency.parse().unwrap_or(ScheduleFrequency::Daily),
            hour: r.hour.clamp(0, 23) as u8,
            day_of_week: r.day_of_week.clamp(0, 6) as u8,
            site_id: r.site_id,
            enabled: r.enabled,
            last_run_at: r.last_run_at,
        }
    }
}

impl BackupSchedule {
    pub fn new(
        name: impl Into<String>,
        frequency: ScheduleFrequency,
        hour: u8,
        day_of_week: u8,
        site_id: Option<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            frequency,
            hour,
            day_of_week,
            site_id,
            enabled: true,
            last_run_at: None,
        }
    }

    pub fn to_record(&self) -> netbackup_state::BackupScheduleRecord {
        netbackup_state::BackupScheduleRecord {
            id: self.id.clone(),
            name: self.name.clone(),
            frequency: self.frequency.as_str().to_string(),
            hour: self.hour as i64,
            day_of_week: self.day_of_week as i64,
            site_id: self.site_id.clone(),
            enabled: self.enabled,
            last_run_at: self.last_run_at,
            scheduler_job_id: None,
        }
    }
}
