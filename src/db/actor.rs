use crate::db::models::{DbInstancePassword, StoredCredentials};
use crate::db::schema::SQLITE_INIT;
use crate::error::SqlitoError;
use chrono::Utc;
use ractor::{Actor, ActorProcessingErr, ActorRef, RpcReplyPort};
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use std::{str::FromStr, time::Duration};
use tracing::{info, warn};

#[derive(Debug)]
pub enum DbActorMessage {
    /// Load the API key blob and every stored password blob.
    LoadCredentials(RpcReplyPort<Result<StoredCredentials, SqlitoError>>),

    /// Insert or replace the singleton API key blob.
    UpsertApiKey(String),

    /// Insert or replace the password blob of one project.
    UpsertPassword { instance_ref: String, blob: String },

    /// Delete every stored credential.
    ClearAll,
}

#[derive(Clone)]
pub struct DbActorHandle {
    actor: ActorRef<DbActorMessage>,
}

impl DbActorHandle {
    pub async fn load_credentials(&self) -> Result<StoredCredentials, SqlitoError> {
        ractor::call!(self.actor, DbActorMessage::LoadCredentials).map_err(|e| {
            SqlitoError::RactorError(format!("DbActor LoadCredentials RPC failed: {e}"))
        })?
    }

    /// Fire-and-forget; the mailbox keeps writes in submission order.
    pub fn upsert_api_key(&self, blob: String) {
        if let Err(e) = ractor::cast!(self.actor, DbActorMessage::UpsertApiKey(blob)) {
            warn!(error = %e, "DbActor UpsertApiKey cast failed");
        }
    }

    pub fn upsert_password(&self, instance_ref: String, blob: String) {
        if let Err(e) = ractor::cast!(
            self.actor,
            DbActorMessage::UpsertPassword { instance_ref, blob }
        ) {
            warn!(error = %e, "DbActor UpsertPassword cast failed");
        }
    }

    pub fn clear_all(&self) {
        if let Err(e) = ractor::cast!(self.actor, DbActorMessage::ClearAll) {
            warn!(error = %e, "DbActor ClearAll cast failed");
        }
    }
}

struct DbActorState {
    pool: SqlitePool,
}

struct DbActor;

#[ractor::async_trait]
impl Actor for DbActor {
    type Msg = DbActorMessage;
    type State = DbActorState;
    type Arguments = String;

    async fn pre_start(
        &self,
        _myself: ActorRef<Self::Msg>,
        database_url: Self::Arguments,
    ) -> Result<Self::State, ActorProcessingErr> {
        let connect_opts = SqliteConnectOptions::from_str(database_url.as_str())
            .map_err(|e| ActorProcessingErr::from(format!("invalid database url: {e}")))?
            .create_if_missing(true)
            .busy_timeout(Duration::from_secs(5))
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .connect_with(connect_opts)
            .await
            .map_err(|e| ActorProcessingErr::from(format!("db connect failed: {e}")))?;

        apply_schema(&pool)
            .await
            .map_err(|e| ActorProcessingErr::from(format!("db schema init failed: {e}")))?;

        info!("DbActor initialized");
        Ok(DbActorState { pool })
    }

    async fn handle(
        &self,
        _myself: ActorRef<Self::Msg>,
        message: Self::Msg,
        state: &mut Self::State,
    ) -> Result<(), ActorProcessingErr> {
        match message {
            DbActorMessage::LoadCredentials(reply) => {
                let res = self.load_credentials(&state.pool).await;
                let _ = reply.send(res);
            }
            DbActorMessage::UpsertApiKey(blob) => {
                if let Err(e) = self.upsert_api_key(&state.pool, blob).await {
                    warn!(error = %e, "Failed to persist API key");
                }
            }
            DbActorMessage::UpsertPassword { instance_ref, blob } => {
                if let Err(e) = self.upsert_password(&state.pool, &instance_ref, blob).await {
                    warn!(instance_ref = %instance_ref, error = %e, "Failed to persist password");
                }
            }
            DbActorMessage::ClearAll => {
                if let Err(e) = self.clear_all(&state.pool).await {
                    warn!(error = %e, "Failed to clear stored credentials");
                }
            }
        }
        Ok(())
    }
}

impl DbActor {
    async fn load_credentials(&self, pool: &SqlitePool) -> Result<StoredCredentials, SqlitoError> {
        let api_key_blob: Option<String> =
            sqlx::query_scalar("SELECT blob FROM api_key WHERE id = 1")
                .fetch_optional(pool)
                .await?;

        let passwords = sqlx::query_as::<_, DbInstancePassword>(
            r#"
        SELECT instance_ref, blob, created_at, updated_at
        FROM instance_password
        ORDER BY instance_ref
        "#,
        )
        .fetch_all(pool)
        .await?;

        Ok(StoredCredentials {
            api_key_blob,
            passwords,
        })
    }

    async fn upsert_api_key(&self, pool: &SqlitePool, blob: String) -> Result<(), SqlitoError> {
        sqlx::query(
            r#"
        INSERT INTO api_key (id, blob, updated_at)
        VALUES (1, ?, ?)
        ON CONFLICT(id) DO UPDATE SET
            blob = excluded.blob,
            updated_at = excluded.updated_at
        "#,
        )
        .bind(blob)
        .bind(Utc::now())
        .execute(pool)
        .await?;
        Ok(())
    }

    async fn upsert_password(
        &self,
        pool: &SqlitePool,
        instance_ref: &str,
        blob: String,
    ) -> Result<(), SqlitoError> {
        let now = Utc::now();
        sqlx::query(
            r#"
        INSERT INTO instance_password (instance_ref, blob, created_at, updated_at)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(instance_ref) DO UPDATE SET
            blob = excluded.blob,
            updated_at = excluded.updated_at
        "#,
        )
        .bind(instance_ref)
        .bind(blob)
        .bind(now)
        .bind(now)
        .execute(pool)
        .await?;
        Ok(())
    }

    async fn clear_all(&self, pool: &SqlitePool) -> Result<(), SqlitoError> {
        let mut tx = pool.begin().await?;
        sqlx::query("DELETE FROM api_key").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM instance_password")
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }
}

/// Spawn the database actor and return a cloneable handle.
pub async fn spawn(database_url: &str) -> DbActorHandle {
    let (actor, _jh) = ractor::Actor::spawn(None, DbActor, database_url.to_string())
        .await
        .expect("failed to spawn DbActor");

    DbActorHandle { actor }
}

async fn apply_schema(pool: &SqlitePool) -> Result<(), SqlitoError> {
    for stmt in SQLITE_INIT.split(';') {
        let s = stmt.trim();
        if s.is_empty() {
            continue;
        }
        sqlx::query(s).execute(pool).await?;
    }
    Ok(())
}
