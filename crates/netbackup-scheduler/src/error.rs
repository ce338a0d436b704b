use thiserror::Error;

#[derive(Error, Debug)]
pub enum SchedulerError {
    #[error("scheduler engine error: {0}")]
    Engine(String),
    #[error("persistence error: {0}")]
    State(#[from] netbackup_state::StateError),
    #[error("backup orchestration error: {0}")]
    Orchestration(#[from] netbackup_core::NetBackupError),
    #[error("invalid schedule: {0}")]
    InvalidSchedule(String),
}

impl From<tokio_cron_scheduler::JobSchedulerError> for SchedulerError {
    fn from(err: tokio_cron_scheduler::JobSchedulerError) -> Self {
        SchedulerError::Engine(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
