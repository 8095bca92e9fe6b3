//! Model Context Protocol messages exchanged with a stdio tool server.

mod jsonrpc;
mod tools;

pub use jsonrpc::{JSONRPC_VERSION, JsonRpcError, JsonRpcRequest, JsonRpcResponse};
pub use tools::{CallToolResult, ListToolsResult, McpTool, PROTOCOL_VERSION, initialize_params};
