//! netbackup-scheduler: recurring cron-driven backup triggers.
//!
//! Registers a `tokio-cron-scheduler` job per enabled `BackupSchedule` row
//! and fires `netbackup_core::Engine::run` on schedule (spec §4.I).

pub mod cron;
pub mod error;
pub mod scheduler;

pub use cron::build_cron_expression;
pub use error::{Result, SchedulerError};
pub use scheduler::Scheduler;
