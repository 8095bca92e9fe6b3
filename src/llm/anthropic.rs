use super::{FinishReason, LanguageModel, ModelRequest, ModelStep, ModelToolCall};
use crate::config::LlmConfig;
use crate::error::{IsRetryable, ProviderError};
use crate::utils::logging::with_pretty_json_debug;
use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use axum::body::Bytes;
use eventsource_stream::Eventsource;
use futures::Stream;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use serde_json::Value;
use sqlito_schema::anthropic::{BlockDelta, BlockStart};
use sqlito_schema::{AnthropicErrorBody, MessagesRequest, StreamEvent};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio_stream::StreamExt;
use tracing::{debug, info, warn};

const UPSTREAM_BODY_PREVIEW_CHARS: usize = 500;
const X_API_KEY: HeaderName = HeaderName::from_static("x-api-key");
const ANTHROPIC_VERSION: HeaderName = HeaderName::from_static("anthropic-version");

/// Streaming Messages API client.
pub struct AnthropicModel {
    client: reqwest::Client,
    cfg: Arc<LlmConfig>,
    retry_policy: ExponentialBuilder,
}

impl AnthropicModel {
    pub fn new(cfg: Arc<LlmConfig>, client: reqwest::Client) -> Self {
        let retry_policy = ExponentialBuilder::default()
            .with_min_delay(Duration::from_millis(200))
            .with_max_delay(Duration::from_secs(2))
            .with_max_times(cfg.retry_max_times)
            .with_jitter();
        Self {
            client,
            cfg,
            retry_policy,
        }
    }

    fn headers(&self, api_key: &str) -> Result<HeaderMap, ProviderError> {
        let mut headers = HeaderMap::new();
        let key = HeaderValue::from_str(api_key).map_err(|_| {
            ProviderError::StreamProtocolError("API key is not a valid header value".to_string())
        })?;
        headers.insert(X_API_KEY, key);
        let version = HeaderValue::from_str(&self.cfg.api_version).map_err(|_| {
            ProviderError::StreamProtocolError("invalid anthropic-version".to_string())
        })?;
        headers.insert(ANTHROPIC_VERSION, version);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(headers)
    }

    async fn post(&self, headers: HeaderMap, body: &MessagesRequest) -> Result<reqwest::Response, ProviderError> {
        let op = || {
            let request = self
                .client
                .post(self.cfg.api_url.clone())
                .headers(headers.clone())
                .json(body);
            async move {
                let resp = request.send().await?;
                if resp.status().is_success() {
                    return Ok(resp);
                }

                let status = resp.status();
                let raw = resp.text().await.unwrap_or_default();
                match serde_json::from_str::<AnthropicErrorBody>(&raw) {
                    Ok(body) => Err(ProviderError::UpstreamMapped { status, body }),
                    Err(_) => Err(ProviderError::UpstreamFallback {
                        status,
                        body: format!("{:.len$}", raw, len = UPSTREAM_BODY_PREVIEW_CHARS),
                    }),
                }
            }
        };

        op.retry(self.retry_policy)
            .when(|err: &ProviderError| err.is_retryable())
            .notify(|err, dur: Duration| {
                warn!("Messages API retrying after error {} in {:?}", err, dur);
            })
            .await
    }
}

#[async_trait]
impl LanguageModel for AnthropicModel {
    async fn step(&self, request: &ModelRequest) -> Result<ModelStep, ProviderError> {
        let body = MessagesRequest {
            model: self.cfg.model.clone(),
            max_tokens: self.cfg.max_tokens,
            system: Some(request.system.clone()),
            messages: request.messages.clone(),
            tools: request.tools.clone(),
            temperature: Some(self.cfg.temperature),
            stream: true,
        };

        with_pretty_json_debug(&body, |pretty_body| {
            debug!(
                model = %body.model,
                messages = body.messages.len(),
                body = %pretty_body,
                "[LLM] Outgoing Messages request"
            );
        });

        let start = Instant::now();
        let headers = self.headers(&request.api_key)?;
        let resp = self.post(headers, &body).await?;
        let idle = Duration::from_secs(self.cfg.stream_idle_timeout_secs.max(1));
        let step = collect_step(resp.bytes_stream(), idle).await?;

        info!(
            model = %self.cfg.model,
            took_ms = start.elapsed().as_millis() as u64,
            text_chars = step.text.len(),
            tool_calls = step.tool_calls.len(),
            finish_reason = step.finish_reason.as_str(),
            "[LLM] Step completed"
        );
        Ok(step)
    }
}

enum Block {
    Text(String),
    ToolUse {
        id: String,
        name: String,
        input: Value,
        partial_json: String,
    },
    Ignored,
}

/// Fold one streamed Messages response into a [`ModelStep`].
pub(super) async fn collect_step<S, E>(stream: S, idle: Duration) -> Result<ModelStep, ProviderError>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: std::error::Error + Send + Sync + 'static,
{
    let timed_stream = stream.eventsource().timeout(idle);
    tokio::pin!(timed_stream);

    let mut blocks: BTreeMap<usize, Block> = BTreeMap::new();
    let mut stop_reason: Option<String> = None;
    let mut saw_stop = false;

    while let Some(item) = timed_stream.next().await {
        let upstream_event = match item {
            Ok(Ok(event)) => event,
            Ok(Err(e)) => return Err(ProviderError::StreamProtocolError(e.to_string())),
            Err(_) => {
                warn!(idle_secs = idle.as_secs(), "Messages SSE stream idle timeout");
                return Err(ProviderError::StreamProtocolError(
                    "Stream idle timeout".to_string(),
                ));
            }
        };
        if upstream_event.data.is_empty() {
            continue;
        }

        let event: StreamEvent = match serde_json::from_str(&upstream_event.data) {
            Ok(ev) => ev,
            Err(e) => {
                debug!(error = %e, "Skipping undecodable SSE payload");
                continue;
            }
        };

        match event {
            StreamEvent::ContentBlockStart {
                index,
                content_block,
            } => {
                let block = match content_block {
                    BlockStart::Text { text } => Block::Text(text),
                    BlockStart::ToolUse { id, name, input } => Block::ToolUse {
                        id,
                        name,
                        input,
                        partial_json: String::new(),
                    },
                    BlockStart::Other => Block::Ignored,
                };
                blocks.insert(index, block);
            }
            StreamEvent::ContentBlockDelta { index, delta } => {
                match (blocks.get_mut(&index), delta) {
                    (Some(Block::Text(text)), BlockDelta::TextDelta { text: more }) => {
                        text.push_str(&more);
                    }
                    (
                        Some(Block::ToolUse { partial_json, .. }),
                        BlockDelta::InputJsonDelta { partial_json: more },
                    ) => partial_json.push_str(&more),
                    _ => {}
                }
            }
            StreamEvent::MessageDelta { delta } => {
                if delta.stop_reason.is_some() {
                    stop_reason = delta.stop_reason;
                }
            }
            StreamEvent::MessageStop => {
                saw_stop = true;
                break;
            }
            StreamEvent::Error { error } => return Err(ProviderError::StreamError(error)),
            StreamEvent::MessageStart { .. }
            | StreamEvent::ContentBlockStop { .. }
            | StreamEvent::Ping
            | StreamEvent::Unknown => {}
        }
    }
    if !saw_stop {
        return Err(ProviderError::StreamProtocolError(
            "stream ended before message_stop".to_string(),
        ));
    }

    let mut text = String::new();
    let mut tool_calls = Vec::new();
    for block in blocks.into_values() {
        match block {
            Block::Text(t) => text.push_str(&t),
            Block::ToolUse {
                id,
                name,
                input,
                partial_json,
            } => {
                let input = if partial_json.trim().is_empty() {
                    if input.is_null() { Value::Object(Default::default()) } else { input }
                } else {
                    serde_json::from_str(&partial_json)?
                };
                tool_calls.push(ModelToolCall { id, name, input });
            }
            Block::Ignored => {}
        }
    }

    let finish_reason = FinishReason::from_stop_reason(stop_reason.as_deref(), !tool_calls.is_empty());
    Ok(ModelStep {
        text,
        tool_calls,
        finish_reason,
    })
}
