use crate::server::router::SqlitoState;
use axum::{Router, routing::post};

pub mod extract;
pub mod handlers;

/// Bounded so a slow reader applies back-pressure to the run.
pub(crate) const EVENT_BUFFER: usize = 16;

pub fn router() -> Router<SqlitoState> {
    Router::new().route("/api/chat", post(handlers::chat_handler))
}
