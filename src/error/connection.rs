use reqwest::StatusCode;
use thiserror::Error as ThisError;

use super::IsRetryable;

/// Failures while turning an instance reference into a usable connection string.
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum ResolveError {
    /// No database password is stored for the instance (or it is empty).
    #[error("no database password stored for project `{instance_ref}`")]
    MissingCredential { instance_ref: String },

    /// The instance reference or the base connection string is missing.
    #[error("missing {0}")]
    MissingReference(&'static str),
}

#[derive(Debug, ThisError)]
pub enum ManagementError {
    #[error("Management API returned {status}: {body:.200}")]
    UpstreamStatus { status: StatusCode, body: String },

    #[error("HTTP request error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Management API payload error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
}

impl IsRetryable for ManagementError {
    fn is_retryable(&self) -> bool {
        match self {
            ManagementError::UpstreamStatus { status, .. } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            ManagementError::Reqwest(e) => e.is_connect() || e.is_timeout(),
            _ => false,
        }
    }
}
