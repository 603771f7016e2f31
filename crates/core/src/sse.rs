//! Decoding of the chat provider's `data: {...}` event stream.
//!
//! Upstream chunks arrive with arbitrary boundaries: a chunk may hold several
//! frames, none, or half a JSON payload (or half a UTF-8 sequence). The
//! [`LineDecoder`] carries the incomplete tail of each chunk into the next one
//! so callers only ever see whole lines.

use serde_json::Value;

pub const DATA_PREFIX: &str = "data:";
pub const DONE_SENTINEL: &str = "[DONE]";
/// Longest unterminated line held while waiting for its newline.
pub const MAX_PENDING_LINE_BYTES: usize = 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("upstream line exceeded {limit} bytes without a newline")]
pub struct LineTooLong {
    pub limit: usize,
}

#[derive(Debug)]
pub struct LineDecoder {
    carry: Vec<u8>,
    limit: usize,
}

impl Default for LineDecoder {
    fn default() -> Self {
        Self::with_limit(MAX_PENDING_LINE_BYTES)
    }
}

impl LineDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limit(limit: usize) -> Self {
        Self {
            carry: Vec::new(),
            limit,
        }
    }

    /// Feeds one chunk and returns the lines it completed, without terminators.
    /// Fails once the unterminated tail grows past the limit; the tail is dropped.
    pub fn push(&mut self, chunk: &[u8]) -> Result<Vec<String>, LineTooLong> {
        self.carry.extend_from_slice(chunk);
        let lines = match self.carry.iter().rposition(|byte| *byte == b'\n') {
            Some(last_newline) => {
                let rest = self.carry.split_off(last_newline + 1);
                let complete = std::mem::replace(&mut self.carry, rest);
                complete[..complete.len() - 1]
                    .split(|byte| *byte == b'\n')
                    .map(decode_line)
                    .collect()
            }
            None => Vec::new(),
        };
        if self.carry.len() > self.limit {
            self.carry = Vec::new();
            return Err(LineTooLong { limit: self.limit });
        }
        Ok(lines)
    }

    /// Flushes a trailing line that never received its newline.
    pub fn finish(&mut self) -> Option<String> {
        if self.carry.is_empty() {
            return None;
        }
        let line = decode_line(&self.carry);
        self.carry.clear();
        Some(line)
    }

    pub fn pending_bytes(&self) -> usize {
        self.carry.len()
    }
}

fn decode_line(raw: &[u8]) -> String {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    String::from_utf8_lossy(raw).into_owned()
}

#[derive(Debug, Clone, PartialEq)]
pub enum UpstreamFrame {
    Data(Value),
    Done,
}

#[derive(Debug, thiserror::Error)]
#[error("invalid frame payload: {source}")]
pub struct FrameParseError {
    pub payload: String,
    #[source]
    source: serde_json::Error,
}

/// Parses one line. Non-data lines and empty payloads yield `None`.
pub fn parse_line(line: &str) -> Option<Result<UpstreamFrame, FrameParseError>> {
    let payload = line.strip_prefix(DATA_PREFIX)?.trim();
    if payload.is_empty() {
        return None;
    }
    if payload == DONE_SENTINEL {
        return Some(Ok(UpstreamFrame::Done));
    }
    Some(
        serde_json::from_str::<Value>(payload)
            .map(UpstreamFrame::Data)
            .map_err(|source| FrameParseError {
                payload: payload.to_string(),
                source,
            }),
    )
}

/// Incremental text of a chat-completions chunk (`choices[0].delta.content`).
pub fn chat_delta_content(value: &Value) -> Option<&str> {
    value
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
        .and_then(|choice| choice.get("delta"))
        .and_then(|delta| delta.get("content"))
        .and_then(Value::as_str)
        .filter(|content| !content.is_empty())
}
