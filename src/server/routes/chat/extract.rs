use crate::error::ChatError;
use axum::{
    Json,
    extract::{FromRequest, Request},
};
use sqlito_schema::ChatRequestBody;
use tracing::debug;

pub(crate) struct ChatPreprocess(pub(crate) ChatRequestBody);

impl<S> FromRequest<S> for ChatPreprocess
where
    S: Send + Sync,
{
    type Rejection = ChatError;

    /// Deserialize a `/api/chat` body.
    ///
    /// JSON syntax and shape errors (including an unknown message role) become
    /// `ChatError::Validation` via `From<JsonRejection>`. Field-level checks happen in
    /// `Orchestrator::prepare`, where a stored API key may still fill in a missing one.
    async fn from_request(req: Request, _state: &S) -> Result<Self, Self::Rejection> {
        let Json(body) = Json::<ChatRequestBody>::from_request(req, &()).await?;

        // The body carries an API key, so only its shape is logged.
        debug!(
            messages = body.messages.len(),
            has_api_key = !body.api_key.is_empty(),
            project_ref = %body.project_ref,
            has_connection_string = body.connection_string.is_some(),
            "[Chat] Extracted request body"
        );

        Ok(Self(body))
    }
}
