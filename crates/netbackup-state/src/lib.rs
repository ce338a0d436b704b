//! netbackup-state: SurrealDB persistence layer for the NetBackup Orchestrator.
//!
//! Owns all I/O with SurrealDB for the six entities in spec §3 (`Site`,
//! `CredentialSet`, `Device`, `BackupJob`, `BackupResult`,
//! `BackupSchedule`). Record shapes here are deliberately untyped relative
//! to `netbackup-core`'s domain enums (`Platform`, `JobStatus`, …) — this
//! crate sits below `netbackup-core` in the dependency graph and must not
//! depend back on it.

mod error;
mod handle;
mod schema;

pub use error::StateError;
pub use handle::SurrealHandle;
pub use schema::{
    BackupJobRecord, BackupResultRecord, BackupScheduleRecord, CredentialSetRecord, DeviceJoinRow,
    DeviceRecord, SiteRecord,
};

/// Result type for netbackup-state operations.
pub type Result<T> = std::result::Result<T, StateError>;
