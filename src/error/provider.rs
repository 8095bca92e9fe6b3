use reqwest::StatusCode;
use sqlito_schema::{AnthropicErrorBody, anthropic::AnthropicErrorObject};
use thiserror::Error as ThisError;

use super::IsRetryable;

/// Failures of one language model step.
#[derive(Debug, ThisError)]
pub enum ProviderError {
    /// Upstream returned a structured error body.
    #[error("Upstream mapped error: status={status}, type={}", body.error.r#type)]
    UpstreamMapped {
        status: StatusCode,
        body: AnthropicErrorBody,
    },

    /// Upstream returned a non-success status without a structured body.
    #[error("Upstream fallback error: status={status}, body={body:.200}")]
    UpstreamFallback { status: StatusCode, body: String },

    /// An `error` event arrived mid-stream.
    #[error("Upstream stream error: {}: {}", .0.r#type, .0.message)]
    StreamError(AnthropicErrorObject),

    /// Transport-level failure (DNS, connect, timeouts, etc).
    #[error("HTTP request error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Stream protocol error: {0}")]
    StreamProtocolError(String),

    #[error("Malformed tool input: {0}")]
    ToolInput(#[from] serde_json::Error),
}

impl ProviderError {
    /// Short message safe to show to the chat client.
    pub fn client_message(&self) -> String {
        match self {
            ProviderError::UpstreamMapped { body, .. } => body.error.message.clone(),
            ProviderError::StreamError(obj) => obj.message.clone(),
            ProviderError::UpstreamFallback { status, .. } => {
                format!("Language model returned {status}")
            }
            ProviderError::Reqwest(_) => "Language model is unreachable".to_string(),
            ProviderError::StreamProtocolError(_) | ProviderError::ToolInput(_) => {
                "Language model stream was interrupted".to_string()
            }
        }
    }
}

impl IsRetryable for ProviderError {
    fn is_retryable(&self) -> bool {
        match self {
            ProviderError::UpstreamMapped { status, body } => {
                body.is_transient()
                    || status.is_server_error()
                    || *status == StatusCode::TOO_MANY_REQUESTS
            }
            ProviderError::UpstreamFallback { status, .. } => {
                status.is_server_error() || *status == StatusCode::TOO_MANY_REQUESTS
            }
            ProviderError::Reqwest(e) => e.is_connect() || e.is_timeout(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overloaded_body_is_retryable() {
        let raw = r#"{"type":"error","error":{"type":"overloaded_error","message":"Overloaded"}}"#;
        let body = serde_json::from_str::<AnthropicErrorBody>(raw).expect("parse sample");
        let err = ProviderError::UpstreamMapped {
            status: StatusCode::from_u16(529).expect("valid status"),
            body,
        };
        assert!(err.is_retryable());
    }

    #[test]
    fn invalid_request_is_not_retryable() {
        let raw = r#"{"type":"error","error":{"type":"invalid_request_error","message":"bad"}}"#;
        let body = serde_json::from_str::<AnthropicErrorBody>(raw).expect("parse sample");
        let err = ProviderError::UpstreamMapped {
            status: StatusCode::BAD_REQUEST,
            body,
        };
        assert!(!err.is_retryable());
        assert_eq!(err.client_message(), "bad");
    }
}
