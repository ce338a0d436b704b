//! The plain, immutable record handed to backup workers.

use super::platform::Platform;

/// A single device's resolved inventory + credentials, as produced by the
/// Inventory Snapshotter (§4.C). Workers never touch the database again
/// once they hold this record.
#[derive(Debug, Clone)]
pub struct DeviceSnapshot {
    pub device_id: String,
    pub hostname: String,
    pub ip: String,
    pub platform: Platform,
    pub netmiko_platform: &'static str,
    pub username: Option<String>,
    pub password: Option<String>,
    pub port: u16,
    pub site_code: String,
    pub gitea_repo_name: String,
    pub is_api_device: bool,
    /// `Some` when credential resolution failed outright (e.g. a corrupted
    /// or version-mismatched ciphertext), as opposed to a tier-3 "no
    /// credential configured" miss. Carries the specific error text through
    /// to `BackupResult.error_message` instead of a generic literal.
    pub credential_error: Option<String>,
}

impl DeviceSnapshot {
    /// True iff credential resolution produced no usable pair, whether a
    /// tier-3 miss or a resolution error. Callers must record this as a
    /// failure without attempting a connection.
    pub fn has_no_credentials(&self) -> bool {
        self.username.is_none() || self.password.is_none()
    }

    /// The message to store for a `has_no_credentials` failure: the
    /// specific resolution error when there is one, else the generic
    /// "nobody configured a credential" literal.
    pub fn credential_failure_message(&self) -> String {
        self.credential_error
            .clone()
            .unwrap_or_else(|| "no credentials available".to_string())
    }
}

/// The raw outcome of a worker's device I/O, before scrubbing/commit.
#[derive(Debug, Clone)]
pub struct RawBackup {
    pub hostname: String,
    pub device_id: String,
    pub platform: Platform,
    pub config_text: String,
    pub raw_sha256: String,
}
