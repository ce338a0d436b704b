//! Domain models for the NetBackup Orchestrator.
//!
//! Canonical definitions for the core entities: `Site`, `CredentialSet`,
//! `Device`, `BackupJob`, `BackupResult`, `BackupSchedule`, plus the
//! `DeviceSnapshot` handed to backup workers.

pub mod credential;
pub mod device;
pub mod error;
pub mod job;
pub mod platform;
pub mod result;
pub mod schedule;
pub mod site;
pub mod snapshot;

pub use credential::CredentialSet;
pub use device::Device;
pub use error::{truncated_message, NetBackupError, Result, ERROR_MESSAGE_LIMIT};
pub use job::{BackupJob, JobStatus};
pub use platform::Platform;
pub use result::{BackupResult, ResultStatus};
pub use schedule::{BackupSchedule, ScheduleFrequency};
pub use site::Site;
pub use snapshot::{DeviceSnapshot, RawBackup};
