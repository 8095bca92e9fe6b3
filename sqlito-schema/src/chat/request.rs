//! Inbound chat request schema.

use serde::{Deserialize, Serialize};

/// Body of `POST /api/chat`.
///
/// String fields default to empty so a missing field surfaces as a validation message
/// ("API key is required") rather than a generic JSON rejection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatRequestBody {
    #[serde(default)]
    pub messages: Vec<ChatMessage>,

    #[serde(default)]
    pub api_key: String,

    #[serde(default)]
    pub project_ref: String,

    /// Optional templated connection string; resolved from the management API when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub connection_string: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
    System,
    Data,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl ChatRequestBody {
    /// Most recent user-authored message, if any.
    pub fn last_user_message(&self) -> Option<&ChatMessage> {
        self.messages
            .iter()
            .rev()
            .find(|msg| msg.role == ChatRole::User)
    }
}
