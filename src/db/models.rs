use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// One stored database password. `blob` is always cipher output, never plaintext.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, FromRow)]
pub struct DbInstancePassword {
    pub instance_ref: String,
    pub blob: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Everything the credential actor needs to rebuild its state on start.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoredCredentials {
    pub api_key_blob: Option<String>,
    pub passwords: Vec<DbInstancePassword>,
}
