//! Tool gateway: a capability-scoped RPC boundary around one MCP tool server.
//!
//! The orchestrator only sees [`GatewayLauncher`] and [`ToolGateway`]; the production
//! implementation talks JSON-RPC to a child process over stdio.

mod extract;
mod guard;
mod stdio;
mod tools;

pub use extract::ToolResultPayload;
pub use guard::{ALLOWED_LEADING_KEYWORDS, FORBIDDEN_KEYWORDS, check_read_only};
pub use stdio::{StdioGateway, StdioLauncher};
pub use tools::{EXECUTE_SQL, LIST_TABLES, fixed_tools};

use crate::connection::redact;
use crate::error::GatewayError;
use async_trait::async_trait;
use serde_json::Value;
use sqlito_schema::ToolSpec;
use std::fmt;

/// Everything a tool server needs to act on one project.
#[derive(Clone)]
pub struct GatewayBinding {
    pub instance_ref: String,
    pub connection_string: String,
    pub access_token: String,
}

impl fmt::Debug for GatewayBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayBinding")
            .field("instance_ref", &self.instance_ref)
            .field("connection_string", &redact(&self.connection_string))
            .field("access_token", &"****")
            .finish()
    }
}

/// Flattened result of one tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolOutcome {
    pub text: String,
    pub is_error: bool,
}

impl ToolOutcome {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            text: message.into(),
            is_error: true,
        }
    }
}

/// An open tool server session.
#[async_trait]
pub trait ToolGateway: Send {
    /// Tool descriptors advertised to the model.
    fn list_tools(&self) -> Vec<ToolSpec>;

    /// Run one tool. Never fails: every failure becomes an error outcome.
    async fn invoke(&mut self, name: &str, args: &Value) -> ToolOutcome;

    /// Shut the session down. Later calls are no-ops.
    async fn close(&mut self);
}

#[async_trait]
pub trait GatewayLauncher: Send + Sync {
    async fn open(&self, binding: &GatewayBinding) -> Result<Box<dyn ToolGateway>, GatewayError>;
}
