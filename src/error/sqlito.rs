use axum::{Json, http::StatusCode, response::IntoResponse};
use thiserror::Error as ThisError;

use super::ErrorBody;

/// Infrastructure errors shared by the database and credential actors.
#[derive(Debug, ThisError)]
pub enum SqlitoError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Unexpected error: {0}")]
    UnexpectedError(String),

    #[error("Ractor error: {0}")]
    RactorError(String),

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),
}

impl IntoResponse for SqlitoError {
    fn into_response(self) -> axum::response::Response {
        tracing::error!(error = %self, "Internal error");
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ErrorBody::new("An internal server error occurred.")),
        )
            .into_response()
    }
}
