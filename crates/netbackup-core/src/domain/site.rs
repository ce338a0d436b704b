//! Network site/location records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A network site/location. Owns many [`crate::domain::Device`]s and maps
/// one-to-one onto a Gitea repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Site {
    pub id: String,
    /// Unique short code, e.g. `"dc1"`.
    pub code: String,
    /// Human label used in Gitea repo descriptions and CLI output.
    pub name: String,
    pub gitea_repo_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
