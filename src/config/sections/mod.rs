mod gateway;
mod llm;
mod management;
mod security;

pub use gateway::GatewayConfig;
pub use llm::LlmConfig;
pub use management::ManagementConfig;
pub use security::SecurityConfig;

use serde::{Deserialize, Serialize};

/// Line format used by the chat stream encoder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StreamFormat {
    /// One JSON object per line (`application/x-ndjson`).
    #[default]
    Ndjson,
    /// AI SDK data-stream parts (`2:[{...}]`).
    DataStream,
}
