use serde::{Deserialize, Serialize};

/// Anthropic error envelope: `{"type":"error","error":{"type":"...","message":"..."}}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnthropicErrorBody {
    pub error: AnthropicErrorObject,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnthropicErrorObject {
    #[serde(rename = "type", default)]
    pub r#type: String,
    #[serde(default)]
    pub message: String,
}

impl AnthropicErrorBody {
    /// Provider-side overload and rate-limit errors are worth another attempt.
    pub fn is_transient(&self) -> bool {
        matches!(
            self.error.r#type.as_str(),
            "overloaded_error" | "rate_limit_error" | "api_error"
        )
    }
}
