use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error as ThisError;

use super::{GatewayError, ManagementError, ProviderError, ResolveError, SqlitoError};

/// Errors surfaced by the HTTP layer before (or instead of) a chat stream.
#[derive(Debug, ThisError)]
pub enum ChatError {
    #[error("{0}")]
    Validation(String),

    #[error("No user message found")]
    NoUserMessage,

    #[error("Not authenticated with Supabase")]
    NotAuthenticated,

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error("Tool server unavailable: {0}")]
    GatewayUnavailable(#[from] GatewayError),

    #[error("Language model error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Management API error: {0}")]
    Management(#[from] ManagementError),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error payload returned with every non-2xx response: `{"error": "..."}`.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

impl ErrorBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}

impl ChatError {
    pub fn status(&self) -> StatusCode {
        match self {
            ChatError::Validation(_) | ChatError::NoUserMessage => StatusCode::BAD_REQUEST,
            ChatError::NotAuthenticated => StatusCode::UNAUTHORIZED,
            ChatError::Resolve(ResolveError::MissingCredential { .. }) => {
                StatusCode::PRECONDITION_REQUIRED
            }
            ChatError::Resolve(ResolveError::MissingReference(_)) => StatusCode::BAD_REQUEST,
            ChatError::GatewayUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ChatError::Provider(_) => StatusCode::BAD_GATEWAY,
            ChatError::Management(ManagementError::UpstreamStatus { status, .. })
                if *status == StatusCode::UNAUTHORIZED =>
            {
                StatusCode::UNAUTHORIZED
            }
            ChatError::Management(_) => StatusCode::BAD_GATEWAY,
            ChatError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<JsonRejection> for ChatError {
    fn from(rejection: JsonRejection) -> Self {
        match rejection {
            JsonRejection::BytesRejection(e) => {
                ChatError::Internal(format!("Failed to read request body: {e}"))
            }
            JsonRejection::JsonSyntaxError(_) => ChatError::Validation("invalid JSON".to_string()),
            other => ChatError::Validation(format!("invalid request: {}", other.body_text())),
        }
    }
}

impl From<SqlitoError> for ChatError {
    fn from(err: SqlitoError) -> Self {
        ChatError::Internal(err.to_string())
    }
}

impl IntoResponse for ChatError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ChatError::Internal(e) => {
                tracing::error!(error = %e, "Chat internal error");
                "An internal server error occurred.".to_string()
            }
            ChatError::GatewayUnavailable(e) => {
                tracing::warn!(error = %e, "Tool server unavailable");
                match e {
                    GatewayError::LauncherMissing { .. } => e.to_string(),
                    _ => "Failed to connect to the database tool server.".to_string(),
                }
            }
            ChatError::Provider(e) => {
                tracing::warn!(error = %e, "Language model error");
                e.client_message()
            }
            ChatError::Management(e) => {
                tracing::warn!(error = %e, "Management API error");
                "Failed to reach the Supabase management API.".to_string()
            }
            other => {
                tracing::warn!(status = %status, error = %other, "Chat request rejected");
                other.to_string()
            }
        };
        (status, Json(ErrorBody::new(message))).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_error_taxonomy() {
        assert_eq!(
            ChatError::Validation("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(ChatError::NoUserMessage.status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            ChatError::NotAuthenticated.status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ChatError::from(ResolveError::MissingCredential {
                instance_ref: "p".into()
            })
            .status(),
            StatusCode::PRECONDITION_REQUIRED
        );
        assert_eq!(
            ChatError::from(ResolveError::MissingReference("project reference")).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ChatError::from(GatewayError::Closed).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
