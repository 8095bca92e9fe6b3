use serde::{Deserialize, Serialize};
use url::Url;

/// Language model provider configuration managed by Figment.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct LlmConfig {
    /// Messages endpoint.
    /// TOML: `llm.api_url`. Default: `https://api.anthropic.com/v1/messages`.
    #[serde(default = "default_api_url")]
    pub api_url: Url,

    /// Model identifier sent upstream.
    /// TOML: `llm.model`. Default: `claude-3-7-sonnet-20250219`.
    #[serde(default = "default_model")]
    pub model: String,

    /// `anthropic-version` header value.
    /// TOML: `llm.api_version`. Default: `2023-06-01`.
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Max output tokens per model step.
    /// TOML: `llm.max_tokens`. Default: `4000`.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Sampling temperature.
    /// TOML: `llm.temperature`. Default: `0.2`.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Upper bound on model steps per chat request.
    /// TOML: `llm.max_steps`. Default: `5`.
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,

    /// Optional upstream HTTP proxy. If set, used for the reqwest client.
    /// TOML: `llm.proxy`. Example: `http://127.0.0.1:1080`.
    #[serde(default)]
    pub proxy: Option<Url>,

    /// Max retry attempts for transient upstream failures.
    /// TOML: `llm.retry_max_times`. Default: `3`.
    #[serde(default = "default_retry_max_times")]
    pub retry_max_times: usize,

    /// Idle timeout between SSE events of one model step, in seconds.
    /// TOML: `llm.stream_idle_timeout_secs`. Default: `60`.
    #[serde(default = "default_stream_idle_timeout_secs")]
    pub stream_idle_timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            model: default_model(),
            api_version: default_api_version(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            max_steps: default_max_steps(),
            proxy: None,
            retry_max_times: default_retry_max_times(),
            stream_idle_timeout_secs: default_stream_idle_timeout_secs(),
        }
    }
}

fn default_api_url() -> Url {
    Url::parse("https://api.anthropic.com/v1/messages").expect("invalid fixed messages URL")
}

fn default_model() -> String {
    "claude-3-7-sonnet-20250219".to_string()
}

fn default_api_version() -> String {
    "2023-06-01".to_string()
}

fn default_max_tokens() -> u32 {
    4000
}

fn default_temperature() -> f32 {
    0.2
}

fn default_max_steps() -> u32 {
    5
}

fn default_retry_max_times() -> usize {
    3
}

fn default_stream_idle_timeout_secs() -> u64 {
    60
}
