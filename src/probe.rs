//! Runs the selected test modes against a server with fixed example inputs.
//!
//! Each step is independent: a failing step is reported and the next one
//! still runs.

use std::io::Write;

use tracing::{error, info};
use url::Url;

use crate::ai::{
    AggregatedResult, ApiResult, GenerationParams, InfernoClient, RequestInput, StreamItem,
    StreamingResponse, build_request,
};
use crate::console::Console;
use crate::core::config::ProbeConfig;
use crate::core::models::{ChatMessage, EndpointKind, ProbeStep, TestMode};
use crate::errors::ProbeError;

pub const TEST_PROMPT: &str = "Once upon a time in a land far away,";

#[must_use]
pub fn test_messages() -> Vec<ChatMessage> {
    vec![
        ChatMessage::system("You are a helpful assistant."),
        ChatMessage::user("I feel really happy today because I just got a promotion!"),
    ]
}

#[derive(Debug)]
pub enum StepOutcome {
    Completed(ApiResult),
    Streamed(AggregatedResult),
    /// Streaming request answered with a non-success status.
    Rejected { status: u16, body: String },
    /// Transport failure, or a success body that could not be decoded.
    TransportFailed(String),
}

#[derive(Debug)]
pub struct StepReport {
    pub step: ProbeStep,
    pub outcome: StepOutcome,
}

impl StepReport {
    #[must_use]
    pub fn is_failure(&self) -> bool {
        match &self.outcome {
            StepOutcome::Completed(result) => !result.is_success(),
            StepOutcome::Streamed(_) => false,
            StepOutcome::Rejected { .. } | StepOutcome::TransportFailed(_) => true,
        }
    }
}

pub struct Probe<W: Write> {
    client: InfernoClient,
    base: Url,
    params: GenerationParams,
    prompt: String,
    messages: Vec<ChatMessage>,
    console: Console<W>,
}

impl<W: Write> Probe<W> {
    /// # Errors
    ///
    /// Returns an error if the configured host does not form a valid URL or
    /// the HTTP client cannot be built.
    pub fn new(config: &ProbeConfig, console: Console<W>) -> Result<Self, ProbeError> {
        Ok(Self {
            client: InfernoClient::from_config(config)?,
            base: config.base_url()?,
            params: GenerationParams {
                max_tokens: config.max_tokens,
                temperature: config.temperature,
                model: config.model.clone(),
            },
            prompt: TEST_PROMPT.to_string(),
            messages: test_messages(),
            console,
        })
    }

    pub fn into_console(self) -> Console<W> {
        self.console
    }

    /// Runs every step of `mode` in order.
    ///
    /// # Errors
    ///
    /// Only console write failures abort the run.
    pub async fn run(&mut self, mode: TestMode) -> Result<Vec<StepReport>, ProbeError> {
        let mut reports = Vec::new();
        for step in mode.steps() {
            let report = self.run_step(step).await?;
            if report.is_failure() {
                error!(mode = step.label(), "Probe step failed");
            } else {
                info!(mode = step.label(), "Probe step finished");
            }
            reports.push(report);
        }

        let failed: Vec<&str> = reports
            .iter()
            .filter(|r| r.is_failure())
            .map(|r| r.step.label())
            .collect();
        self.console.run_summary(&failed)?;
        Ok(reports)
    }

    async fn run_step(&mut self, step: ProbeStep) -> Result<StepReport, ProbeError> {
        self.console.header(step.title())?;
        let input = match step.kind {
            EndpointKind::Completion => {
                self.console.prompt(&self.prompt)?;
                RequestInput::Prompt(&self.prompt)
            }
            EndpointKind::Chat => {
                self.console.messages(&self.messages)?;
                RequestInput::Messages(&self.messages)
            }
        };
        let request = build_request(&self.base, input, &self.params, step.stream);

        let outcome = if step.stream {
            self.console.stream_start()?;
            match self.client.stream(&request).await {
                Ok(StreamingResponse::Active(mut response)) => {
                    while let Some(item) = response.next_item().await {
                        match item {
                            StreamItem::Fragment(fragment) => self.console.fragment(&fragment)?,
                            StreamItem::Malformed { raw_line, .. } => {
                                let json_str =
                                    raw_line.strip_prefix("data: ").unwrap_or(&raw_line);
                                self.console.decode_error(json_str)?;
                            }
                        }
                    }
                    let aggregate = response.finish();
                    self.console.stream_summary(&aggregate)?;
                    StepOutcome::Streamed(aggregate)
                }
                Ok(StreamingResponse::Rejected { status, body }) => {
                    self.console.status_error(status, &body)?;
                    StepOutcome::Rejected { status, body }
                }
                Err(e) => {
                    self.console.failure(&e.to_string())?;
                    StepOutcome::TransportFailed(e.to_string())
                }
            }
        } else {
            match self.client.complete(&request).await {
                Ok(result) => {
                    self.console.api_result(&result)?;
                    StepOutcome::Completed(result)
                }
                Err(e) => {
                    self.console.failure(&e.to_string())?;
                    StepOutcome::TransportFailed(e.to_string())
                }
            }
        };

        Ok(StepReport { step, outcome })
    }
}
