pub mod anthropic;
pub mod chat;
pub mod mcp;

pub use anthropic::{
    AnthropicErrorBody, ContentBlock, MessageParam, MessagesRequest, StreamEvent, ToolSpec,
};
pub use chat::{ChatEvent, ChatMessage, ChatRequestBody, ChatRole, ToolCallRecord};
pub use mcp::{CallToolResult, JsonRpcError, JsonRpcRequest, JsonRpcResponse};
