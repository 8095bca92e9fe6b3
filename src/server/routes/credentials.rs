use crate::error::ChatError;
use crate::server::router::SqlitoState;
use axum::{
    Json, Router,
    extract::{Path, Query, State, rejection::JsonRejection},
    http::StatusCode,
    routing::{delete, get, put},
};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiKeyPayload {
    #[serde(default)]
    pub api_key: String,
}

#[derive(Deserialize)]
pub struct PasswordPayload {
    #[serde(default)]
    pub password: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusQuery {
    pub project_ref: Option<String>,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CredentialStatus {
    pub has_api_key: bool,
    pub has_password: bool,
}

pub fn router() -> Router<SqlitoState> {
    Router::new()
        .route("/api/credentials", delete(reset_credentials))
        .route("/api/credentials/api-key", put(put_api_key))
        .route("/api/credentials/passwords/{project_ref}", put(put_password))
        .route("/api/credentials/status", get(credential_status))
}

/// PUT /api/credentials/api-key
async fn put_api_key(
    State(state): State<SqlitoState>,
    payload: Result<Json<ApiKeyPayload>, JsonRejection>,
) -> Result<StatusCode, ChatError> {
    let Json(payload) = payload?;
    let key = payload.api_key.trim();
    if key.is_empty() {
        return Err(ChatError::Validation("API key is required".to_string()));
    }
    state.store.set_api_key(key).await;
    info!("API key stored");
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/credentials/passwords/{projectRef}
async fn put_password(
    State(state): State<SqlitoState>,
    Path(project_ref): Path<String>,
    payload: Result<Json<PasswordPayload>, JsonRejection>,
) -> Result<StatusCode, ChatError> {
    let Json(payload) = payload?;
    let project_ref = project_ref.trim();
    if project_ref.is_empty() {
        return Err(ChatError::Validation("Project reference is required".to_string()));
    }
    // Passwords are stored verbatim; surrounding whitespace may be significant.
    if payload.password.is_empty() {
        return Err(ChatError::Validation("Password is required".to_string()));
    }
    state.store.set_password(project_ref, &payload.password).await;
    info!(project_ref, "Database password stored");
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/credentials/status?projectRef=
async fn credential_status(
    State(state): State<SqlitoState>,
    Query(query): Query<StatusQuery>,
) -> Json<CredentialStatus> {
    let has_password = match query.project_ref.as_deref().map(str::trim) {
        Some(r) if !r.is_empty() => state.store.has_password(r).await,
        _ => false,
    };
    Json(CredentialStatus {
        has_api_key: state.store.api_key().await.is_some(),
        has_password,
    })
}

/// DELETE /api/credentials
async fn reset_credentials(State(state): State<SqlitoState>) -> StatusCode {
    state.store.reset().await;
    if let Some(management) = state.management.as_ref() {
        management.clear_cache();
    }
    info!("Credentials reset");
    StatusCode::NO_CONTENT
}
