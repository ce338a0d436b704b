//! NetBackup Core
//!
//! Domain types and orchestration for the NetBackup Orchestrator: scrubbing,
//! credential handling, transport workers, the Gitea client, the progress
//! bus, and the Backup Engine that ties them together.

pub mod api_worker;
pub mod cli_worker;
pub mod config;
pub mod credential_resolver;
pub mod crypto;
pub mod domain;
pub mod engine;
pub mod gitea;
pub mod progress;
pub mod scrubber;
pub mod snapshotter;
pub mod telemetry;

pub use api_worker::{run_api_backup, ApiBackupRequest};
pub use cli_worker::{run_cli_backup, CliBackupRequest};
pub use config::Config;
pub use credential_resolver::{resolve_credentials, GlobalCredentials};
pub use crypto::CredentialKey;
pub use domain::{
    truncated_message, BackupJob, BackupResult, BackupSchedule, CredentialSet, Device,
    DeviceSnapshot, JobStatus, NetBackupError, Platform, RawBackup, Result, ResultStatus,
    ScheduleFrequency, Site,
};
pub use engine::{Engine, EngineConfig};
pub use gitea::GiteaClient;
pub use progress::{ProgressBus, ProgressEvent, ProgressSubscription};
pub use scrubber::scrub;
pub use snapshotter::snapshot_devices;
pub use telemetry::init_tracing;

/// Crate version, useful for Gitea commit messages and the CLI's `--version`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
