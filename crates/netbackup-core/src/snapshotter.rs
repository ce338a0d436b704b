//! Inventory Snapshotter (§4.C).
//!
//! Loads enabled devices (optionally filtered by ID) joined with their site
//! and credential set in a single logical query, resolves credentials, and
//! produces the plain [`DeviceSnapshot`] records workers operate on. No
//! further database access happens once a snapshot is handed to a worker.

use std::str::FromStr;

use tracing::{instrument, warn};

use netbackup_state::SurrealHandle;

use crate::credential_resolver::{resolve_credentials, GlobalCredentials};
use crate::crypto::CredentialKey;
use crate::domain::{CredentialSet, DeviceSnapshot, NetBackupError, Platform};

/// Load and resolve the device batch for a run.
///
/// `device_ids`, when `Some`, restricts the batch to those IDs (still
/// filtered to `enabled = true`); `None` means every enabled device.
#[instrument(skip(db, key, global))]
pub async fn snapshot_devices(
    db: &SurrealHandle,
    device_ids: Option<&[String]>,
    key: &CredentialKey,
    global: &GlobalCredentials,
) -> Result<Vec<DeviceSnapshot>, NetBackupError> {
    let rows = db.list_enabled_devices(device_ids).await?;

    let mut snapshots = Vec::with_capacity(rows.len());
    for row in rows {
        let platform = match Platform::from_str(&row.device.platform) {
            Ok(p) => p,
            Err(e) => {
                warn!(hostname = %row.device.hostname, error = %e, "skipping device with unknown platform");
                continue;
            }
        };

        let credential_set = row.credential.as_ref().map(|c| CredentialSet {
            id: c.id.clone(),
            label: c.label.clone(),
            username: c.username.clone(),
            encrypted_password: c.encrypted_password.clone(),
            created_at: c.created_at,
            updated_at: c.updated_at,
        });

        // A resolution failure (e.g. corrupted or version-mismatched
        // ciphertext) is fatal for this device but must not stop the batch;
        // the specific error text is kept in `credential_error` so it can be
        // stored verbatim instead of collapsing into the generic tier-3
        // "no credential configured" message.
        let (username, password, credential_error) =
            match resolve_credentials(credential_set.as_ref(), global, key) {
                Ok(Some((u, p))) => (Some(u), Some(p), None),
                Ok(None) => (None, None, None),
                Err(e) => {
                    warn!(hostname = %row.device.hostname, error = %e, "credential resolution failed");
                    (None, None, Some(e.to_string()))
                }
            };

        snapshots.push(DeviceSnapshot {
            device_id: row.device.id,
            hostname: row.device.hostname,
            ip: row.device.ip,
            platform,
            netmiko_platform: platform.netmiko_platform(),
            username,
            password,
            port: 22,
            site_code: row.site.code,
            gitea_repo_name: row.site.gitea_repo_name,
            is_api_device: platform.is_api_device(),
            credential_error,
        });
    }

    Ok(snapshots)
}
