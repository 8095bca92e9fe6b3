use crate::config::StreamFormat;
use axum::body::Bytes;
use futures::Stream;
use sqlito_schema::ChatEvent;
use std::convert::Infallible;
use tokio_stream::StreamExt;
use tracing::error;

const NDJSON: &str = "application/x-ndjson";
const DATA_STREAM: &str = "text/plain; charset=utf-8";

/// Turns [`ChatEvent`]s into newline-terminated records.
#[derive(Debug, Clone, Copy, Default)]
pub struct EventEncoder {
    format: StreamFormat,
}

impl EventEncoder {
    pub fn new(format: StreamFormat) -> Self {
        Self { format }
    }

    pub fn content_type(&self) -> &'static str {
        match self.format {
            StreamFormat::Ndjson => NDJSON,
            StreamFormat::DataStream => DATA_STREAM,
        }
    }

    /// Encode one event as a single line, trailing `\n` included.
    pub fn encode(&self, event: &ChatEvent) -> Bytes {
        let line = match (self.format, event) {
            (StreamFormat::Ndjson, event) => serde_json::to_string(event).map(|json| json + "\n"),
            (StreamFormat::DataStream, ChatEvent::Error { error }) => {
                serde_json::to_string(error).map(|json| format!("3:{json}\n"))
            }
            (StreamFormat::DataStream, event) => {
                serde_json::to_string(&[event]).map(|json| format!("2:{json}\n"))
            }
        };

        match line {
            Ok(line) => Bytes::from(line),
            Err(e) => {
                // Only reachable with a non-string map key, which ChatEvent never carries.
                error!(event = event.kind(), error = %e, "Failed to encode chat event");
                Bytes::from_static(b"")
            }
        }
    }
}

/// Map an event stream into body chunks, one chunk per record.
pub fn encode_stream<S>(events: S, encoder: EventEncoder) -> impl Stream<Item = Result<Bytes, Infallible>>
where
    S: Stream<Item = ChatEvent>,
{
    events.map(move |event| Ok(encoder.encode(&event)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;
    use serde_json::{Value, json};

    fn text(step: u32, content: &str) -> ChatEvent {
        ChatEvent::TextUpdate {
            content: content.to_string(),
            step_number: step,
        }
    }

    #[test]
    fn ndjson_writes_one_tagged_object_per_line() {
        let enc = EventEncoder::new(StreamFormat::Ndjson);
        let line = enc.encode(&text(1, "multi\nline"));
        let s = std::str::from_utf8(&line).unwrap();

        assert!(s.ends_with('\n'));
        assert_eq!(s.matches('\n').count(), 1, "embedded newlines must stay escaped");
        let value: Value = serde_json::from_str(s.trim_end()).unwrap();
        assert_eq!(
            value,
            json!({"type": "text-update", "content": "multi\nline", "stepNumber": 1})
        );
        assert_eq!(enc.content_type(), "application/x-ndjson");
    }

    #[test]
    fn data_stream_wraps_events_and_errors() {
        let enc = EventEncoder::new(StreamFormat::DataStream);

        let data = enc.encode(&ChatEvent::ConversationSummary {
            step_count: 1,
            tool_call_count: 0,
            completed: true,
        });
        assert_eq!(
            &data[..],
            br#"2:[{"type":"conversation-summary","stepCount":1,"toolCallCount":0,"completed":true}]
"#
        );

        let err = enc.encode(&ChatEvent::Error {
            error: "Invalid \"key\"".to_string(),
        });
        assert_eq!(&err[..], b"3:\"Invalid \\\"key\\\"\"\n");
    }

    #[tokio::test]
    async fn stream_preserves_event_order() {
        let events = stream::iter(vec![text(1, "a"), text(2, "b")]);
        let chunks: Vec<_> = encode_stream(events, EventEncoder::default())
            .collect::<Vec<_>>()
            .await;

        let lines: Vec<Value> = chunks
            .into_iter()
            .map(|c| serde_json::from_slice(&c.unwrap()).unwrap())
            .collect();
        assert_eq!(lines[0]["stepNumber"], 1);
        assert_eq!(lines[1]["stepNumber"], 2);
    }
}
