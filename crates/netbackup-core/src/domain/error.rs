//! Domain-level error taxonomy for the NetBackup Orchestrator.

/// The byte limit a [`NetBackupError`] is truncated to before it is persisted
/// into `BackupResult.error_message` (spec's "implementation-defined limit").
pub const ERROR_MESSAGE_LIMIT: usize = 4096;

/// NetBackup domain errors.
#[derive(Debug, thiserror::Error)]
pub enum NetBackupError {
    #[error("configuration error: {0}")]
    Configuration(String),

    #[error("credential error: {0}")]
    Credential(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("orchestration error: {0}")]
    Orchestration(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("state error: {0}")]
    State(#[from] netbackup_state::StateError),
}

/// Result type for NetBackup domain operations.
pub type Result<T> = std::result::Result<T, NetBackupError>;

/// Truncate an error's display text to [`ERROR_MESSAGE_LIMIT`] bytes at a
/// char boundary, for storage in `BackupResult.error_message`.
pub fn truncated_message(err: &impl std::fmt::Display) -> String {
    let full = err.to_string();
    if full.len() <= ERROR_MESSAGE_LIMIT {
        return full;
    }
    let mut end = ERROR_MESSAGE_LIMIT;
    while !full.is_char_boundary(end) {
        end -= 1;
    }
    full[..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_messages_are_descriptive() {
        let err = NetBackupError::Credential("no credentials available".to_string());
        assert!(err.to_string().contains("no credentials available"));

        let err = NetBackupError::Orchestration("snapshot query failed".to_string());
        assert!(err.to_string().contains("orchestration error"));
    }

    #[test]
    fn truncation_respects_limit_and_char_boundaries() {
        let long = "x".repeat(ERROR_MESSAGE_LIMIT * 2);
        let err = NetBackupError::Transport(long);
        let truncated = truncated_message(&err);
        assert!(truncated.len() <= ERROR_MESSAGE_LIMIT);
    }

    #[test]
    fn short_messages_are_not_truncated() {
        let err = NetBackupError::Protocol("missing XML key element".to_string());
        let msg = truncated_message(&err);
        assert_eq!(msg, err.to_string());
    }
}
