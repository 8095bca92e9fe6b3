use serde_json::Value;
use sqlito_schema::CallToolResult;

use super::ToolOutcome;

/// Raw tool result, classified once at the gateway boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolResultPayload {
    /// Content parts (`[{"type":"text","text":...}, ...]`).
    Parts(Vec<Value>),
    Text(String),
    /// Any other JSON value.
    Structured(Value),
}

impl ToolResultPayload {
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Array(parts) => ToolResultPayload::Parts(parts),
            Value::String(text) => ToolResultPayload::Text(text),
            other => ToolResultPayload::Structured(other),
        }
    }

    /// Pick the most specific payload of an MCP `tools/call` result.
    pub fn from_call_result(result: CallToolResult) -> (Self, bool) {
        let flagged = result.is_error;
        let payload = match (result.content.is_empty(), result.structured_content) {
            (false, _) => ToolResultPayload::Parts(result.content),
            (true, Some(structured)) => ToolResultPayload::Structured(structured),
            (true, None) => ToolResultPayload::Text(String::new()),
        };
        (payload, flagged)
    }

    /// Flatten to text and decide whether the call failed.
    ///
    /// `flagged` carries the transport-level error bit (MCP `isError`). Text that parses as a
    /// JSON object with a truthy `error` member is an error too.
    pub fn resolve(self, flagged: bool) -> ToolOutcome {
        let (text, structured_error) = match self {
            ToolResultPayload::Parts(parts) => (first_part_text(parts), false),
            ToolResultPayload::Text(text) => (text, false),
            ToolResultPayload::Structured(value) => {
                let has_error = value.get("error").is_some();
                (value.to_string(), has_error)
            }
        };

        let is_error = flagged || structured_error || text_reports_error(&text);
        ToolOutcome { text, is_error }
    }
}

fn first_part_text(parts: Vec<Value>) -> String {
    let Some(first) = parts.into_iter().next() else {
        return String::new();
    };
    match first {
        Value::String(s) => s,
        Value::Object(mut map) => match map.remove("text").or_else(|| map.remove("value")) {
            Some(Value::String(s)) => s,
            Some(other) => other.to_string(),
            None => Value::Object(map).to_string(),
        },
        other => other.to_string(),
    }
}

fn text_reports_error(text: &str) -> bool {
    let Ok(parsed) = serde_json::from_str::<Value>(text) else {
        return false;
    };
    parsed.get("error").is_some_and(is_truthy)
}

fn is_truthy(v: &Value) -> bool {
    match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn error_json_string_is_an_error() {
        let outcome = ToolResultPayload::from_value(json!(r#"{"error":"permission denied"}"#))
            .resolve(false);
        assert!(outcome.is_error);
        assert_eq!(outcome.text, r#"{"error":"permission denied"}"#);
    }

    #[test]
    fn parts_use_first_text() {
        let outcome = ToolResultPayload::from_value(json!([
            {"type": "text", "text": "[{\"id\":1}]"},
            {"type": "text", "text": "ignored"}
        ]))
        .resolve(false);
        assert_eq!(outcome.text, "[{\"id\":1}]");
        assert!(!outcome.is_error);

        let outcome = ToolResultPayload::from_value(json!([{"value": 42}])).resolve(false);
        assert_eq!(outcome.text, "42");
    }

    #[test]
    fn structured_with_error_key_is_an_error() {
        let outcome = ToolResultPayload::from_value(json!({"error": null, "rows": []})).resolve(false);
        assert!(outcome.is_error);

        let outcome = ToolResultPayload::from_value(json!({"rows": []})).resolve(false);
        assert!(!outcome.is_error);
        assert_eq!(outcome.text, r#"{"rows":[]}"#);
    }

    #[test]
    fn falsy_error_members_are_not_errors() {
        for text in [r#"{"error":false}"#, r#"{"error":""}"#, r#"{"error":0}"#, "not json"] {
            assert!(
                !ToolResultPayload::Text(text.to_string()).resolve(false).is_error,
                "{text}"
            );
        }
    }

    #[test]
    fn mcp_is_error_flag_wins() {
        let result: CallToolResult = serde_json::from_value(json!({
            "content": [{"type": "text", "text": "relation does not exist"}],
            "isError": true
        }))
        .expect("parse");
        let (payload, flagged) = ToolResultPayload::from_call_result(result);
        let outcome = payload.resolve(flagged);
        assert!(outcome.is_error);
        assert_eq!(outcome.text, "relation does not exist");
    }
}
