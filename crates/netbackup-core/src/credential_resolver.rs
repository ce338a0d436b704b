//! Tier-1/2/3 credential resolution (§4.B).
//!
//! 1. Device-bound `CredentialSet` → decrypt `encrypted_password`.
//! 2. Else a configured global `(net_user_global, net_pass_global)` pair.
//! 3. Else no credentials; the caller must record a failure without
//!    attempting a connection.

use crate::crypto::CredentialKey;
use crate::domain::{CredentialSet, NetBackupError};

/// Globally configured fallback credentials (tier-2).
#[derive(Debug, Clone, Default)]
pub struct GlobalCredentials {
    pub username: Option<String>,
    pub password: Option<String>,
}

impl GlobalCredentials {
    fn pair(&self) -> Option<(String, String)> {
        match (&self.username, &self.password) {
            (Some(u), Some(p)) => Some((u.clone(), p.clone())),
            _ => None,
        }
    }
}

/// Resolve a device's effective `(username, password)`.
///
/// `Ok(None)` is a tier-3 miss, not an error: the caller records a failure
/// with a "no credentials available" message but never attempts a
/// connection. A decryption failure is `Err` and is fatal for this device —
/// it never falls through to the global tier.
pub fn resolve_credentials(
    credential_set: Option<&CredentialSet>,
    global: &GlobalCredentials,
    key: &CredentialKey,
) -> Result<Option<(String, String)>, NetBackupError> {
    if let Some(set) = credential_set {
        let password = key.decrypt(&set.encrypted_password)?;
        return Ok(Some((set.username.clone(), password)));
    }

    Ok(global.pair())
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use chrono::Utc;

    fn test_key() -> CredentialKey {
        CredentialKey::from_config_value(&STANDARD.encode([3u8; 32])).unwrap()
    }

    fn credential_set(key: &CredentialKey, username: &str, password: &str) -> CredentialSet {
        CredentialSet {
            id: "cred-1".to_string(),
            label: "lab-creds".to_string(),
            username: username.to_string(),
            encrypted_password: key.encrypt(password).unwrap(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn s3_tier1_decrypts_device_bound_set() {
        let key = test_key();
        let set = credential_set(&key, "admin", "s3cr3t");
        let resolved = resolve_credentials(Some(&set), &GlobalCredentials::default(), &key).unwrap();
        assert_eq!(resolved, Some(("admin".to_string(), "s3cr3t".to_string())));
    }

    #[test]
    fn s3_tier2_falls_back_to_global_when_unset() {
        let key = test_key();
        let global = GlobalCredentials {
            username: Some("u".to_string()),
            password: Some("p".to_string()),
        };
        let resolved = resolve_credentials(None, &global, &key).unwrap();
        assert_eq!(resolved, Some(("u".to_string(), "p".to_string())));
    }

    #[test]
    fn s3_tier3_miss_returns_none_not_error() {
        let key = test_key();
        let resolved = resolve_credentials(None, &GlobalCredentials::default(), &key).unwrap();
        assert_eq!(resolved, None);
    }

    #[test]
    fn decryption_failure_does_not_fall_through_to_global() {
        let key = test_key();
        let mut set = credential_set(&key, "admin", "s3cr3t");
        set.encrypted_password = "v1:garbage:garbage".to_string();
        let global = GlobalCredentials {
            username: Some("u".to_string()),
            password: Some("p".to_string()),
        };
        let result = resolve_credentials(Some(&set), &global, &key);
        assert!(result.is_err());
    }
}
