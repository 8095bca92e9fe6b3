use serde::{Deserialize, Serialize};

/// Credential cipher configuration managed by Figment.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SecurityConfig {
    /// Application secret keying the password cipher.
    /// TOML: `security.encryption_key`. Changing it invalidates stored passwords.
    #[serde(default = "default_encryption_key")]
    pub encryption_key: String,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            encryption_key: default_encryption_key(),
        }
    }
}

fn default_encryption_key() -> String {
    "sqlito-secure-storage-key".to_string()
}
