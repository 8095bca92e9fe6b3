use sqlito_schema::JsonRpcError;
use thiserror::Error as ThisError;

/// Failures of the stdio tool server transport.
///
/// Only `open` surfaces these to callers; `invoke` folds them into an error outcome.
#[derive(Debug, ThisError)]
pub enum GatewayError {
    /// The launcher executable could not be found on `PATH`.
    #[error("tool server launcher `{command}` not found on PATH")]
    LauncherMissing { command: String },

    #[error("tool server IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("tool server handshake failed: {0}")]
    Handshake(String),

    #[error("tool server did not answer `{method}` within {secs}s")]
    Timeout { method: String, secs: u64 },

    #[error("tool server returned JSON-RPC error {}: {}", .0.code, .0.message)]
    Rpc(JsonRpcError),

    #[error("tool server closed its stdout")]
    Closed,

    #[error("tool server protocol error: {0}")]
    Protocol(String),
}
