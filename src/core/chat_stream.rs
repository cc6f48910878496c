use memchr::memchr;

use crate::api::ChatResponse;

/// One event relayed from a dispatch to the owner of its placeholder.
#[derive(Clone, Debug)]
pub enum StreamMessage {
    /// Incremental content, appended to the placeholder in arrival order.
    Chunk(String),
    /// Provisional content that replaces the placeholder wholesale and is
    /// dropped as soon as real chunks arrive.
    Status(String),
    /// Terminal failure, rendered inline in the affected bubble.
    Error(String),
    End,
}

enum LineEvent {
    Fragment(String),
    Done,
    Nothing,
}

/// Incremental decoder for the gateway's line-delimited event framing.
///
/// Bytes arrive in arbitrarily sized chunks with no line alignment. The
/// decoder carries partial lines across pushes and only parses complete
/// lines, so the fragment sequence is independent of chunk boundaries.
/// Single-pass: once the end sentinel is seen, further input is ignored.
#[derive(Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    done: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk, returning every content fragment it completes.
    pub fn push_chunk(&mut self, chunk: &[u8]) -> Vec<String> {
        let mut fragments = Vec::new();
        if self.done {
            return fragments;
        }

        self.buffer.extend_from_slice(chunk);
        while let Some(newline_pos) = memchr(b'\n', &self.buffer) {
            // Non-UTF-8 lines are dropped; corruption in one event must not
            // abort the whole stream.
            if let Ok(line) = std::str::from_utf8(&self.buffer[..newline_pos]) {
                match decode_line(line.trim()) {
                    LineEvent::Fragment(content) => fragments.push(content),
                    LineEvent::Done => self.done = true,
                    LineEvent::Nothing => {}
                }
            }
            self.buffer.drain(..=newline_pos);
            if self.done {
                break;
            }
        }
        fragments
    }

    /// Whether the end-of-stream sentinel has been seen.
    pub fn is_done(&self) -> bool {
        self.done
    }
}

fn decode_line(line: &str) -> LineEvent {
    let Some(payload) = line.strip_prefix("data:").map(str::trim_start) else {
        return LineEvent::Nothing;
    };
    if payload == "[DONE]" {
        return LineEvent::Done;
    }

    match serde_json::from_str::<ChatResponse>(payload) {
        Ok(response) => response
            .choices
            .first()
            .and_then(|choice| choice.delta.content.clone())
            .filter(|content| !content.is_empty())
            .map(LineEvent::Fragment)
            .unwrap_or(LineEvent::Nothing),
        // Malformed event payload: swallow the line, keep the stream alive.
        Err(_) => LineEvent::Nothing,
    }
}

/// Reduce an upstream error body to a one-line summary for inline display.
pub fn summarize_api_error(error_text: &str) -> String {
    let trimmed = error_text.trim();
    if trimmed.is_empty() {
        return "empty error response".to_string();
    }

    if let Ok(value) = serde_json::from_str::<serde_json::Value>(trimmed) {
        let summary = value
            .pointer("/error/message")
            .and_then(|v| v.as_str())
            .or_else(|| value.get("error").and_then(|v| v.as_str()))
            .or_else(|| value.get("message").and_then(|v| v.as_str()));
        if let Some(text) = summary {
            let collapsed = text.split_whitespace().collect::<Vec<_>>().join(" ");
            if !collapsed.is_empty() {
                return collapsed;
            }
        }
    }

    trimmed.to_string()
}
