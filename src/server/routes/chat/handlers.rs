use super::{EVENT_BUFFER, extract::ChatPreprocess};
use crate::error::ChatError;
use crate::server::guards::session::SessionToken;
use crate::server::router::SqlitoState;
use crate::stream::{EventEncoder, encode_stream};
use axum::{
    body::Body,
    extract::State,
    http::header::{CACHE_CONTROL, CONTENT_TYPE},
    response::{IntoResponse, Response},
};
use tokio::sync::mpsc;
use tokio_stream::{StreamExt, wrappers::ReceiverStream};
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// POST /api/chat
///
/// Preparation errors are plain `{error}` responses. Once the run is spawned the response is
/// `200` and later failures arrive as in-stream `error` records.
pub(super) async fn chat_handler(
    State(state): State<SqlitoState>,
    SessionToken(access_token): SessionToken,
    ChatPreprocess(body): ChatPreprocess,
) -> Result<Response, ChatError> {
    let run = state.orchestrator.prepare(body, access_token).await?;

    let (tx, rx) = mpsc::channel(EVENT_BUFFER);
    let cancel = CancellationToken::new();
    // Dropping the response body (client disconnect) cancels the run.
    let guard = cancel.clone().drop_guard();
    tokio::spawn(async move {
        let outcome = run.run(tx, cancel).await;
        debug!(?outcome, "Chat run task exited");
    });

    let encoder = EventEncoder::new(state.stream_format);
    let body_stream = encode_stream(ReceiverStream::new(rx), encoder).map(move |chunk| {
        let _ = &guard;
        chunk
    });

    Ok((
        [
            (CONTENT_TYPE, encoder.content_type()),
            (CACHE_CONTROL, "no-cache"),
        ],
        Body::from_stream(body_stream),
    )
        .into_response())
}
