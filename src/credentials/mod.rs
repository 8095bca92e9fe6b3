//! Credential store: the LLM API key plus one encrypted database password per project.

mod actor;
mod cipher;

pub use actor::{CredentialsHandle, spawn};
pub use cipher::{EncryptedBlob, SecretCipher};

use async_trait::async_trait;

/// Injected repository for the credentials a chat run needs.
///
/// Mutations are visible to subsequent reads immediately. Empty keys or refs are ignored with a
/// warning rather than raised.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn set_api_key(&self, key: &str);

    async fn api_key(&self) -> Option<String>;

    async fn set_password(&self, instance_ref: &str, password: &str);

    /// Decrypted password for `instance_ref`, if one is stored.
    async fn password(&self, instance_ref: &str) -> Option<String>;

    async fn has_password(&self, instance_ref: &str) -> bool;

    /// Drop the API key and every stored password.
    async fn reset(&self);
}
