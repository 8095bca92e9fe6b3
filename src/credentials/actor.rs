use super::{CredentialStore, EncryptedBlob, SecretCipher};
use crate::db::DbActorHandle;
use ahash::AHashMap;
use async_trait::async_trait;
use ractor::{Actor, ActorProcessingErr, ActorRef, RpcReplyPort};
use tracing::{debug, info, warn};

#[derive(Debug)]
pub enum CredentialsMessage {
    SetApiKey(String, RpcReplyPort<()>),
    GetApiKey(RpcReplyPort<Option<String>>),
    /// `(instance_ref, plaintext password)`
    SetPassword(String, String, RpcReplyPort<()>),
    GetPassword(String, RpcReplyPort<Option<String>>),
    HasPassword(String, RpcReplyPort<bool>),
    Reset(RpcReplyPort<()>),
}

/// Cloneable handle to the credentials actor; implements [`CredentialStore`].
#[derive(Clone)]
pub struct CredentialsHandle {
    actor: ActorRef<CredentialsMessage>,
}

#[async_trait]
impl CredentialStore for CredentialsHandle {
    async fn set_api_key(&self, key: &str) {
        if key.is_empty() {
            warn!("Ignoring empty API key");
            return;
        }
        if let Err(e) = ractor::call!(self.actor, CredentialsMessage::SetApiKey, key.to_string())
        {
            warn!(error = %e, "SetApiKey RPC failed");
        }
    }

    async fn api_key(&self) -> Option<String> {
        ractor::call!(self.actor, CredentialsMessage::GetApiKey).unwrap_or_else(|e| {
            warn!(error = %e, "GetApiKey RPC failed");
            None
        })
    }

    async fn set_password(&self, instance_ref: &str, password: &str) {
        if instance_ref.is_empty() {
            warn!("Ignoring password for empty project reference");
            return;
        }
        let res = ractor::call!(
            self.actor,
            CredentialsMessage::SetPassword,
            instance_ref.to_string(),
            password.to_string()
        );
        if let Err(e) = res {
            warn!(instance_ref = %instance_ref, error = %e, "SetPassword RPC failed");
        }
    }

    async fn password(&self, instance_ref: &str) -> Option<String> {
        ractor::call!(
            self.actor,
            CredentialsMessage::GetPassword,
            instance_ref.to_string()
        )
        .unwrap_or_else(|e| {
            warn!(error = %e, "GetPassword RPC failed");
            None
        })
    }

    async fn has_password(&self, instance_ref: &str) -> bool {
        ractor::call!(
            self.actor,
            CredentialsMessage::HasPassword,
            instance_ref.to_string()
        )
        .unwrap_or_else(|e| {
            warn!(error = %e, "HasPassword RPC failed");
            false
        })
    }

    async fn reset(&self) {
        if let Err(e) = ractor::call!(self.actor, CredentialsMessage::Reset) {
            warn!(error = %e, "Reset RPC failed");
        }
    }
}

struct CredentialsState {
    cipher: SecretCipher,
    db: Option<DbActorHandle>,
    api_key: Option<EncryptedBlob>,
    passwords: AHashMap<String, EncryptedBlob>,
}

struct CredentialsActor;

#[ractor::async_trait]
impl Actor for CredentialsActor {
    type Msg = CredentialsMessage;
    type State = CredentialsState;
    type Arguments = (SecretCipher, Option<DbActorHandle>);

    async fn pre_start(
        &self,
        _myself: ActorRef<Self::Msg>,
        (cipher, db): Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        let mut state = CredentialsState {
            cipher,
            db,
            api_key: None,
            passwords: AHashMap::new(),
        };

        if let Some(db) = state.db.as_ref() {
            let stored = db
                .load_credentials()
                .await
                .map_err(|e| ActorProcessingErr::from(format!("load credentials failed: {e}")))?;
            state.api_key = stored.api_key_blob.map(EncryptedBlob::from_stored);
            state.passwords = stored
                .passwords
                .into_iter()
                .map(|row| (row.instance_ref, EncryptedBlob::from_stored(row.blob)))
                .collect();
        }

        info!(
            has_api_key = state.api_key.is_some(),
            passwords = state.passwords.len(),
            persistent = state.db.is_some(),
            "CredentialsActor initialized"
        );
        Ok(state)
    }

    async fn handle(
        &self,
        _myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            CredentialsMessage::SetApiKey(key, reply) => {
                let blob = state.cipher.encrypt(&key);
                if let Some(db) = state.db.as_ref() {
                    db.upsert_api_key(blob.as_str().to_string());
                }
                state.api_key = Some(blob);
                debug!("API key updated");
                let _ = reply.send(());
            }
            CredentialsMessage::GetApiKey(reply) => {
                let key = state
                    .api_key
                    .as_ref()
                    .and_then(|blob| state.cipher.decrypt(blob))
                    .filter(|key| !key.is_empty());
                let _ = reply.send(key);
            }
            CredentialsMessage::SetPassword(instance_ref, password, reply) => {
                let blob = state.cipher.encrypt(&password);
                if let Some(db) = state.db.as_ref() {
                    db.upsert_password(instance_ref.clone(), blob.as_str().to_string());
                }
                debug!(instance_ref = %instance_ref, "Database password updated");
                state.passwords.insert(instance_ref, blob);
                let _ = reply.send(());
            }
            CredentialsMessage::GetPassword(instance_ref, reply) => {
                let password = state
                    .passwords
                    .get(&instance_ref)
                    .and_then(|blob| state.cipher.decrypt(blob))
                    .filter(|p| !p.is_empty());
                let _ = reply.send(password);
            }
            CredentialsMessage::HasPassword(instance_ref, reply) => {
                let has = state
                    .passwords
                    .get(&instance_ref)
                    .is_some_and(|blob| !blob.is_empty());
                let _ = reply.send(has);
            }
            CredentialsMessage::Reset(reply) => {
                state.api_key = None;
                state.passwords.clear();
                if let Some(db) = state.db.as_ref() {
                    db.clear_all();
                }
                info!("Credentials reset");
                let _ = reply.send(());
            }
        }
        Ok(())
    }
}

/// Spawn the credentials actor. With `db`, state is loaded on start and every mutation is persisted.
pub async fn spawn(cipher: SecretCipher, db: Option<DbActorHandle>) -> CredentialsHandle {
    let (actor, _jh) = ractor::Actor::spawn(None, CredentialsActor, (cipher, db))
        .await
        .expect("failed to spawn CredentialsActor");

    CredentialsHandle { actor }
}
