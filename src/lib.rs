pub mod config;
pub mod connection;
pub mod credentials;
pub mod db;
pub mod error;
pub mod gateway;
pub mod llm;
pub mod orchestrator;
pub mod server;
pub mod stream;
mod utils;

pub use error::SqlitoError;
