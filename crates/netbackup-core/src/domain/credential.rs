//! Stored device credentials.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A reusable set of device credentials. `encrypted_password` is a
/// self-identifying ciphertext string produced by [`crate::crypto::encrypt`]
/// (format `v1:<base64 nonce>:<base64 ciphertext>`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CredentialSet {
    pub id: String,
    /// Unique label the set is looked up and displayed by.
    pub label: String,
    pub username: String,
    pub encrypted_password: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
