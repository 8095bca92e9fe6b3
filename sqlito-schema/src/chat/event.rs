//! Outbound orchestration events.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One record of the chat event stream, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum ChatEvent {
    TextUpdate {
        content: String,
        step_number: u32,
    },
    ToolExecution {
        step_number: u32,
        tool_calls: Vec<ToolCallRecord>,
        finish_reason: String,
    },
    StepProgress {
        step_number: u32,
        step_type: String,
        has_tool_calls: bool,
        tools_used: Vec<String>,
        finish_reason: String,
    },
    ConversationSummary {
        step_count: u32,
        tool_call_count: u32,
        completed: bool,
    },
    Error {
        error: String,
    },
}

impl ChatEvent {
    /// Step this event belongs to; `None` for terminal records.
    pub fn step_number(&self) -> Option<u32> {
        match self {
            ChatEvent::TextUpdate { step_number, .. }
            | ChatEvent::ToolExecution { step_number, .. }
            | ChatEvent::StepProgress { step_number, .. } => Some(*step_number),
            ChatEvent::ConversationSummary { .. } | ChatEvent::Error { .. } => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ChatEvent::TextUpdate { .. } => "text-update",
            ChatEvent::ToolExecution { .. } => "tool-execution",
            ChatEvent::StepProgress { .. } => "step-progress",
            ChatEvent::ConversationSummary { .. } => "conversation-summary",
            ChatEvent::Error { .. } => "error",
        }
    }
}

/// A tool call as reported to the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallRecord {
    pub tool_name: String,
    pub args: Value,
    pub result: String,
    pub is_error: bool,
}
