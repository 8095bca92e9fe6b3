mod chat;
mod connection;
mod gateway;
mod provider;
mod sqlito;

pub use chat::{ChatError, ErrorBody};
pub use connection::{ManagementError, ResolveError};
pub use gateway::GatewayError;
pub use provider::ProviderError;
pub use sqlito::SqlitoError;

pub trait IsRetryable {
    fn is_retryable(&self) -> bool;
}
