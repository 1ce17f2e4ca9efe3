//! Colourised console report for probe runs.

use std::io::Write;

use serde_json::Value;

use crate::ai::{AggregatedResult, ApiResult};
use crate::core::models::ChatMessage;

const BOLD: &str = "\x1b[1m";
const GREEN: &str = "\x1b[32m";
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const RESET: &str = "\x1b[0m";

/// Writes the human-readable report. Colour codes are omitted when disabled.
#[derive(Debug)]
pub struct Console<W: Write> {
    out: W,
    color: bool,
}

impl<W: Write> Console<W> {
    pub const fn new(out: W, color: bool) -> Self {
        Self { out, color }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn paint(&self, style: &'static str, text: &str) -> String {
        if self.color {
            format!("{style}{text}{RESET}")
        } else {
            text.to_string()
        }
    }

    pub fn header(&mut self, title: &str) -> std::io::Result<()> {
        let line = self.paint(BOLD, &format!("[{title}]"));
        writeln!(self.out, "\n{line}")
    }

    pub fn prompt(&mut self, prompt: &str) -> std::io::Result<()> {
        writeln!(self.out, "Prompt: {prompt}")
    }

    pub fn messages(&mut self, messages: &[ChatMessage]) -> std::io::Result<()> {
        let rendered = serde_json::to_string_pretty(messages).unwrap_or_default();
        writeln!(self.out, "Messages: {rendered}")
    }

    pub fn api_result(&mut self, result: &ApiResult) -> std::io::Result<()> {
        match result {
            ApiResult::Success {
                body,
                text,
                elapsed_seconds,
            } => {
                let label = self.paint(GREEN, &format!("Response (in {elapsed_seconds:.2}s):"));
                writeln!(self.out, "\n{label}")?;
                if has_choices(body) {
                    let text = self.paint(GREEN, text);
                    writeln!(self.out, "{text}")?;
                }
                let pretty = serde_json::to_string_pretty(body).unwrap_or_default();
                writeln!(self.out, "\nFull response:\n{pretty}")
            }
            ApiResult::Failed { status, body } => self.status_error(*status, body),
        }
    }

    pub fn stream_start(&mut self) -> std::io::Result<()> {
        let label = self.paint(GREEN, "Response:");
        writeln!(self.out, "\n{label}")
    }

    /// Prints one fragment immediately, without a line break.
    pub fn fragment(&mut self, fragment: &str) -> std::io::Result<()> {
        write!(self.out, "{fragment}")?;
        self.out.flush()
    }

    /// Reports a skipped stream line; the stream carries on after it.
    pub fn decode_error(&mut self, json_str: &str) -> std::io::Result<()> {
        let line = self.paint(RED, &format!("Error decoding JSON: {json_str}"));
        writeln!(self.out, "\n{line}")
    }

    pub fn stream_summary(&mut self, aggregate: &AggregatedResult) -> std::io::Result<()> {
        let completed = self.paint(
            GREEN,
            &format!("Completed in {:.2}s", aggregate.elapsed_seconds()),
        );
        let full_text = self.paint(GREEN, &format!("Full text: {}", aggregate.full_text()));
        writeln!(self.out, "\n\n{completed}\n{full_text}")?;

        if !aggregate.terminated_normally() {
            let note = self.paint(YELLOW, "Note: stream ended without [DONE]");
            writeln!(self.out, "{note}")?;
        }
        if aggregate.malformed_lines() > 0 {
            let note = self.paint(
                YELLOW,
                &format!("Note: skipped {} malformed line(s)", aggregate.malformed_lines()),
            );
            writeln!(self.out, "{note}")?;
        }
        Ok(())
    }

    pub fn status_error(&mut self, status: u16, body: &str) -> std::io::Result<()> {
        let label = self.paint(RED, &format!("Error: {status}"));
        writeln!(self.out, "\n{label}\n{body}")
    }

    pub fn failure(&mut self, message: &str) -> std::io::Result<()> {
        let line = self.paint(RED, &format!("Error: {message}"));
        writeln!(self.out, "\n{line}")
    }

    pub fn run_summary(&mut self, failed: &[&str]) -> std::io::Result<()> {
        if failed.is_empty() {
            let line = self.paint(GREEN, "All selected modes completed.");
            writeln!(self.out, "\n{line}")
        } else {
            let line = self.paint(RED, &format!("Failed modes: {}", failed.join(", ")));
            writeln!(self.out, "\n{line}")
        }
    }
}

fn has_choices(body: &Value) -> bool {
    body.get("choices")
        .and_then(Value::as_array)
        .is_some_and(|c| !c.is_empty())
}
