//! Language model abstraction: one call = one model step.

mod anthropic;

pub use anthropic::AnthropicModel;

use crate::error::ProviderError;
use async_trait::async_trait;
use serde_json::Value;
use sqlito_schema::{MessageParam, ToolSpec};

/// Input of one model step.
#[derive(Debug, Clone)]
pub struct ModelRequest {
    pub api_key: String,
    pub system: String,
    pub messages: Vec<MessageParam>,
    pub tools: Vec<ToolSpec>,
}

/// A tool invocation requested by the model.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelToolCall {
    pub id: String,
    pub name: String,
    pub input: Value,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    ToolCalls,
    Length,
    Other(String),
}

impl FinishReason {
    /// Map an upstream `stop_reason`.
    pub fn from_stop_reason(reason: Option<&str>, has_tool_calls: bool) -> Self {
        match reason {
            Some("end_turn" | "stop_sequence") => FinishReason::Stop,
            Some("tool_use") => FinishReason::ToolCalls,
            Some("max_tokens") => FinishReason::Length,
            Some(other) => FinishReason::Other(other.to_string()),
            None if has_tool_calls => FinishReason::ToolCalls,
            None => FinishReason::Stop,
        }
    }

    /// Wire name used in chat events.
    pub fn as_str(&self) -> &str {
        match self {
            FinishReason::Stop => "stop",
            FinishReason::ToolCalls => "tool-calls",
            FinishReason::Length => "length",
            FinishReason::Other(s) => s.as_str(),
        }
    }
}

/// Output of one model step.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelStep {
    pub text: String,
    pub tool_calls: Vec<ModelToolCall>,
    pub finish_reason: FinishReason,
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn step(&self, request: &ModelRequest) -> Result<ModelStep, ProviderError>;
}
