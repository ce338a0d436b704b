//! Process configuration, loaded once from the environment (spec §6).

use tracing::Level;

use crate::domain::NetBackupError;

/// Environment-sourced settings shared by `netbackupd` and `netbackup-cli`.
#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub gitea_url: String,
    pub gitea_token: String,
    pub gitea_org: String,
    pub fernet_key: String,
    pub net_user_global: Option<String>,
    pub net_pass_global: Option<String>,
    pub nornir_num_workers: usize,
    pub api_semaphore_limit: usize,
    pub log_level: Level,
}

impl Config {
    /// Load every field from its `NETBACKUP_`-prefixed environment variable,
    /// applying the defaults from spec §6 where one exists.
    pub fn from_env() -> Result<Self, NetBackupError> {
        Ok(Self {
            database_url: require_env("NETBACKUP_DATABASE_URL")?,
            gitea_url: require_env("NETBACKUP_GITEA_URL")?,
            gitea_token: require_env("NETBACKUP_GITEA_TOKEN")?,
            gitea_org: optional_env("NETBACKUP_GITEA_ORG").unwrap_or_else(|| "agncf".to_string()),
            fernet_key: require_env("NETBACKUP_FERNET_KEY")?,
            net_user_global: optional_env("NETBACKUP_NET_USER_GLOBAL"),
            net_pass_global: optional_env("NETBACKUP_NET_PASS_GLOBAL"),
            nornir_num_workers: parse_env_or("NETBACKUP_NORNIR_NUM_WORKERS", 50)?,
            api_semaphore_limit: parse_env_or("NETBACKUP_API_SEMAPHORE_LIMIT", 30)?,
            log_level: parse_log_level(optional_env("NETBACKUP_LOG_LEVEL"))?,
        })
    }
}

fn require_env(key: &str) -> Result<String, NetBackupError> {
    std::env::var(key).map_err(|_| {
        NetBackupError::Configuration(format!("missing required environment variable {key}"))
    })
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn parse_env_or(key: &str, default: usize) -> Result<usize, NetBackupError> {
    match optional_env(key) {
        None => Ok(default),
        Some(raw) => raw.parse().map_err(|_| {
            NetBackupError::Configuration(format!("{key} must be a positive integer, got {raw}"))
        }),
    }
}

fn parse_log_level(raw: Option<String>) -> Result<Level, NetBackupError> {
    match raw.as_deref().map(str::to_uppercase).as_deref() {
        None | Some("INFO") => Ok(Level::INFO),
        Some("DEBUG") => Ok(Level::DEBUG),
        Some("WARNING") | Some("WARN") => Ok(Level::WARN),
        Some("ERROR") => Ok(Level::ERROR),
        Some(other) => Err(NetBackupError::Configuration(format!(
            "unknown log_level {other}, expected DEBUG|INFO|WARNING|ERROR"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_log_level_is_a_configuration_error() {
        let err = parse_log_level(Some("TRACE".to_string())).unwrap_err();
        assert!(matches!(err, NetBackupError::Configuration(_)));
    }

    #[test]
    fn missing_log_level_defaults_to_info() {
        assert_eq!(parse_log_level(None).unwrap(), Level::INFO);
    }

    #[test]
    fn log_level_parsing_is_case_insensitive() {
        assert_eq!(parse_log_level(Some("debug".to_string())).unwrap(), Level::DEBUG);
        assert_eq!(parse_log_level(Some("Warning".to_string())).unwrap(), Level::WARN);
    }
}
