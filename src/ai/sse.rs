//! Line-oriented Server-Sent Events decoder for completion streams.
//!
//! The server frames every event as a single `data: <json>` line and ends the
//! stream with `data: [DONE]`. This parser handles:
//! - Lines split across TCP chunks (including inside multi-byte UTF-8)
//! - Multiple lines in one read
//! - `\r\n` line endings, blank separator lines and non-`data` fields
//! - Malformed payloads, reported per line without stopping the stream

use serde_json::Value;

use super::response::stream_fragment;
use crate::core::models::EndpointKind;

const DATA_PREFIX: &[u8] = b"data: ";
const DONE_SENTINEL: &[u8] = b"[DONE]";

/// A decoded `data:` line carrying a JSON payload.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamEvent {
    /// The line as received, without its line terminator.
    pub raw_line: String,
    pub payload: Value,
    /// Non-empty text delta carried by the payload, if any.
    pub fragment: Option<String>,
}

/// Outcome of decoding one eligible line.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseResult {
    /// A well-formed payload, with or without a fragment.
    Event(StreamEvent),
    /// The payload was not valid JSON (or not valid UTF-8). Non-fatal.
    Malformed { raw_line: String, error: String },
    /// End of stream signal (`[DONE]`).
    Done,
}

/// Longest line buffered before it is dropped as malformed.
pub const DEFAULT_MAX_LINE_BYTES: usize = 1024 * 1024;

const PREVIEW_BYTES: usize = 64;

/// Stateful line parser that buffers partial lines across chunk boundaries.
#[derive(Debug)]
pub struct SseLineParser {
    kind: EndpointKind,
    /// Bytes of the line currently being received.
    buffer: Vec<u8>,
    /// Prefix of `buffer` already known to hold no newline.
    scanned: usize,
    max_line_bytes: usize,
    /// Skipping the rest of an oversized line.
    discarding: bool,
    done: bool,
}

impl SseLineParser {
    #[must_use]
    pub fn new(kind: EndpointKind) -> Self {
        Self {
            kind,
            buffer: Vec::new(),
            scanned: 0,
            max_line_bytes: DEFAULT_MAX_LINE_BYTES,
            discarding: false,
            done: false,
        }
    }

    #[must_use]
    pub const fn with_max_line_bytes(mut self, max_line_bytes: usize) -> Self {
        self.max_line_bytes = max_line_bytes;
        self
    }

    /// Feeds a chunk of bytes and returns the results of every line it completes.
    ///
    /// Once `[DONE]` has been seen nothing further is decoded; the sentinel is
    /// always the last result returned. A `data:` line longer than the limit
    /// is reported once as malformed and the rest of it is skipped.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<ParseResult> {
        let mut results = Vec::new();
        if self.done {
            return results;
        }

        self.buffer.extend_from_slice(chunk);

        let mut consumed = 0;
        let mut search_from = self.scanned;
        while let Some(offset) = self.buffer[search_from..].iter().position(|b| *b == b'\n') {
            let line_end = search_from + offset;
            let result = if self.discarding {
                self.discarding = false;
                None
            } else {
                decode_line(&self.buffer[consumed..line_end], self.kind)
            };
            consumed = line_end + 1;
            search_from = consumed;

            if let Some(result) = result {
                let is_done = result == ParseResult::Done;
                results.push(result);
                if is_done {
                    self.done = true;
                    self.clear();
                    return results;
                }
            }
        }

        self.buffer.drain(..consumed);
        self.scanned = self.buffer.len();

        if self.buffer.len() > self.max_line_bytes {
            if !self.discarding && self.buffer.starts_with(DATA_PREFIX) {
                let preview = &self.buffer[..PREVIEW_BYTES.min(self.buffer.len())];
                results.push(ParseResult::Malformed {
                    raw_line: format!("{}...", String::from_utf8_lossy(preview)),
                    error: format!("line exceeds {} bytes", self.max_line_bytes),
                });
            }
            self.discarding = true;
            self.buffer.clear();
            self.scanned = 0;
        }

        results
    }

    /// Decodes a trailing line that arrived without a terminating newline.
    ///
    /// Call once the byte stream is exhausted.
    pub fn finish(&mut self) -> Option<ParseResult> {
        if self.done || self.discarding || self.buffer.is_empty() {
            self.clear();
            return None;
        }
        let line = std::mem::take(&mut self.buffer);
        self.scanned = 0;
        let result = decode_line(&line, self.kind);
        if result == Some(ParseResult::Done) {
            self.done = true;
        }
        result
    }

    /// Returns `true` once the `[DONE]` sentinel has been decoded.
    #[must_use]
    pub const fn is_done(&self) -> bool {
        self.done
    }

    /// Returns any buffered partial line (for debugging/testing).
    #[must_use]
    pub fn remaining_buffer(&self) -> &[u8] {
        &self.buffer
    }

    /// Clears the internal buffer.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.scanned = 0;
        self.discarding = false;
    }
}

/// Decodes one line. Returns `None` for lines that are blank or not `data: ` fields.
#[must_use]
pub fn decode_line(line: &[u8], kind: EndpointKind) -> Option<ParseResult> {
    let line = line.strip_suffix(b"\r").unwrap_or(line);
    let data = line.strip_prefix(DATA_PREFIX)?;

    if data == DONE_SENTINEL {
        return Some(ParseResult::Done);
    }

    let raw_line = match std::str::from_utf8(line) {
        Ok(s) => s,
        Err(e) => {
            return Some(ParseResult::Malformed {
                raw_line: String::from_utf8_lossy(line).into_owned(),
                error: e.to_string(),
            });
        }
    };

    match serde_json::from_slice::<Value>(data) {
        Ok(payload) => {
            let fragment = Some(stream_fragment(kind, &payload))
                .filter(|f| !f.is_empty())
                .map(str::to_string);
            Some(ParseResult::Event(StreamEvent {
                raw_line: raw_line.to_string(),
                payload,
                fragment,
            }))
        }
        Err(e) => Some(ParseResult::Malformed {
            raw_line: raw_line.to_string(),
            error: e.to_string(),
        }),
    }
}
