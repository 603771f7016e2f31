use serde_json::{json, Value};

/// Client-facing event vocabulary of a generation session.
///
/// Encoded on the wire as `data: <json>\n\n`. Besides the canonical field
/// names every payload also carries the legacy names the bundled front end
/// reads (`time`, `tokenCount`, `error`); consumers must ignore fields they
/// do not know.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NormalizedEvent {
    /// `text` is the full narration or the accumulated thinking region;
    /// `delta` is set when the event was produced by a single thinking delta.
    Reasoning { text: String, delta: Option<String> },
    Metrics { tokens: u64, elapsed_ms: u64 },
    Response { content: String, tokens: u64 },
    Done { tokens: u64 },
    Error { message: String },
}

impl NormalizedEvent {
    pub fn reasoning(text: impl Into<String>) -> Self {
        NormalizedEvent::Reasoning {
            text: text.into(),
            delta: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        NormalizedEvent::Error {
            message: message.into(),
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            NormalizedEvent::Reasoning { text, delta } => {
                let mut value = json!({ "type": "reasoning", "reasoning": text });
                if let (Some(delta), Some(map)) = (delta, value.as_object_mut()) {
                    map.insert("delta".to_string(), Value::String(delta.clone()));
                }
                value
            }
            NormalizedEvent::Metrics { tokens, elapsed_ms } => json!({
                "type": "metrics",
                "tokens": tokens,
                "elapsedMs": elapsed_ms,
                "time": elapsed_ms,
            }),
            NormalizedEvent::Response { content, tokens } => json!({
                "type": "response",
                "content": content,
                "tokens": tokens,
                "tokenCount": tokens,
            }),
            NormalizedEvent::Done { tokens } => json!({
                "type": "done",
                "tokens": tokens,
                "tokenCount": tokens,
            }),
            NormalizedEvent::Error { message } => json!({
                "type": "error",
                "message": message,
                "error": message,
            }),
        }
    }

    pub fn to_sse_frame(&self) -> String {
        let data = serde_json::to_string(&self.to_json()).unwrap_or_else(|_| "{}".to_string());
        format!("data: {data}\n\n")
    }

    /// Inverse of [`NormalizedEvent::to_json`]; unknown `type` values yield `None`.
    pub fn from_json(value: &Value) -> Option<Self> {
        let kind = value.get("type").and_then(Value::as_str)?;
        let text_field = |name: &str| value.get(name).and_then(Value::as_str).map(str::to_string);
        let count_field = |primary: &str, legacy: &str| {
            value
                .get(primary)
                .and_then(Value::as_u64)
                .or_else(|| value.get(legacy).and_then(Value::as_u64))
        };
        match kind {
            "reasoning" => Some(NormalizedEvent::Reasoning {
                text: text_field("reasoning")?,
                delta: text_field("delta"),
            }),
            "metrics" => Some(NormalizedEvent::Metrics {
                tokens: value.get("tokens").and_then(Value::as_u64)?,
                elapsed_ms: count_field("elapsedMs", "time")?,
            }),
            "response" => Some(NormalizedEvent::Response {
                content: text_field("content")?,
                tokens: count_field("tokens", "tokenCount")?,
            }),
            "done" => Some(NormalizedEvent::Done {
                tokens: count_field("tokens", "tokenCount")?,
            }),
            "error" => Some(NormalizedEvent::Error {
                message: text_field("message").or_else(|| text_field("error"))?,
            }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sse_frame_is_single_data_line_with_blank_terminator() {
        let frame = NormalizedEvent::Done { tokens: 7 }.to_sse_frame();
        assert!(frame.starts_with("data: {"));
        assert!(frame.ends_with("}\n\n"));
        assert_eq!(frame.matches('\n').count(), 2);
    }

    #[test]
    fn metrics_carry_canonical_and_legacy_names() {
        let value = NormalizedEvent::Metrics {
            tokens: 20,
            elapsed_ms: 345,
        }
        .to_json();
        assert_eq!(value["type"], "metrics");
        assert_eq!(value["tokens"], 20);
        assert_eq!(value["elapsedMs"], 345);
        assert_eq!(value["time"], 345);
    }

    #[test]
    fn reasoning_delta_is_omitted_when_absent() {
        let value = NormalizedEvent::reasoning("header").to_json();
        assert_eq!(value["reasoning"], "header");
        assert!(value.get("delta").is_none());
    }

    #[test]
    fn from_json_accepts_legacy_error_field() {
        let value = json!({ "type": "error", "error": "boom", "extra": true });
        assert_eq!(
            NormalizedEvent::from_json(&value),
            Some(NormalizedEvent::error("boom"))
        );
    }

    #[test]
    fn from_json_reads_back_every_variant() {
        let events = vec![
            NormalizedEvent::Reasoning {
                text: "so far".to_string(),
                delta: Some("far".to_string()),
            },
            NormalizedEvent::Metrics {
                tokens: 10,
                elapsed_ms: 5,
            },
            NormalizedEvent::Response {
                content: "hi".to_string(),
                tokens: 3,
            },
            NormalizedEvent::Done { tokens: 3 },
            NormalizedEvent::error("x"),
        ];
        for event in events {
            assert_eq!(NormalizedEvent::from_json(&event.to_json()), Some(event));
        }
    }
}
