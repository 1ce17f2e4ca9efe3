//! HTTP client for the completion endpoints.
//!
//! Issues the POST and hands the body to the decoders: read whole for plain
//! requests, decoded line by line for streaming ones.

use std::collections::VecDeque;
use std::pin::Pin;
use std::time::{Duration, Instant};

use futures::{Stream, StreamExt};
use reqwest::Client;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use tracing::{debug, error, info, warn};

use super::request::PreparedRequest;
use super::response::{AggregatedResult, ApiResult, decode_response};
use super::sse::{ParseResult, SseLineParser};
use crate::core::config::ProbeConfig;
use crate::core::models::EndpointKind;
use crate::errors::ProbeError;

const API_KEY_HEADER: HeaderName = HeaderName::from_static("x-api-key");

/// Client for an Inferno-compatible completion server.
#[derive(Debug, Clone)]
pub struct InfernoClient {
    http: Client,
    api_key: String,
}

impl InfernoClient {
    /// Creates a client. `timeout` bounds each whole request when set.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(api_key: impl Into<String>, timeout: Option<Duration>) -> Result<Self, ProbeError> {
        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder
            .build()
            .map_err(|e| ProbeError::HttpError(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            api_key: api_key.into(),
        })
    }

    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn from_config(config: &ProbeConfig) -> Result<Self, ProbeError> {
        Self::new(config.api_key.clone(), config.timeout)
    }

    fn headers(&self, streaming: bool) -> Result<HeaderMap, ProbeError> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let key_value = HeaderValue::from_str(&self.api_key)
            .map_err(|e| ProbeError::ConfigError(format!("Invalid API key header: {e}")))?;
        headers.insert(API_KEY_HEADER, key_value);

        if streaming {
            headers.insert(ACCEPT, HeaderValue::from_static("text/event-stream"));
        }
        Ok(headers)
    }

    async fn send(&self, request: &PreparedRequest) -> Result<reqwest::Response, ProbeError> {
        info!(
            url = %request.url,
            stream = request.is_streaming(),
            "Sending completion request"
        );
        #[cfg(feature = "debug-logs")]
        debug!(body = ?request.body, "Completion request body");

        let headers = self.headers(request.is_streaming())?;
        self.http
            .post(&request.url)
            .headers(headers)
            .json(&request.body)
            .send()
            .await
            .map_err(|e| {
                error!(url = %request.url, "Completion request failed: {e}");
                ProbeError::HttpError(format!("Completion request failed: {e}"))
            })
    }

    /// Sends a non-streaming request and decodes the whole response.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure or when a success body is not JSON.
    /// A non-success status is reported as [`ApiResult::Failed`].
    pub async fn complete(&self, request: &PreparedRequest) -> Result<ApiResult, ProbeError> {
        let started = Instant::now();
        let response = self.send(request).await?;
        let status = response.status();
        let body = response.text().await.map_err(|e| {
            ProbeError::HttpError(format!(
                "Failed to read response body (status {status}): {e}"
            ))
        })?;
        let elapsed_seconds = started.elapsed().as_secs_f64();

        if !status.is_success() {
            warn!(status = status.as_u16(), "Completion request rejected");
        }
        decode_response(request.kind, status, &body, elapsed_seconds)
    }

    /// Sends a streaming request.
    ///
    /// Returns a `StreamingResponse` that yields text fragments as they arrive.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP request fails before a response arrives.
    pub async fn stream(&self, request: &PreparedRequest) -> Result<StreamingResponse, ProbeError> {
        let started = Instant::now();
        let response = self.send(request).await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_else(|e| {
                format!("Failed to read error response body (status {status}): {e}")
            });
            warn!(status = status.as_u16(), "Streaming request rejected");
            return Ok(StreamingResponse::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        Ok(StreamingResponse::Active(ActiveStreamingResponse::with_start(
            request.kind,
            response.bytes_stream(),
            started,
        )))
    }
}

/// Response from [`InfernoClient::stream`].
#[derive(Debug)]
pub enum StreamingResponse {
    /// The server answered with a non-success status; no line was decoded.
    Rejected { status: u16, body: String },
    /// Active streaming response.
    Active(ActiveStreamingResponse),
}

/// One item handed to the consumer of a stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamItem {
    /// A non-empty text delta, already appended to the aggregate.
    Fragment(String),
    /// A `data:` line that could not be decoded. It was skipped.
    Malformed { raw_line: String, error: String },
}

/// Type alias for the boxed byte stream.
type ByteStream = Pin<Box<dyn Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Send>>;

/// An in-progress streamed response.
///
/// Fragments are pulled one at a time; the aggregate grows as they are
/// produced. The sequence is finite and cannot be restarted.
pub struct ActiveStreamingResponse {
    byte_stream: ByteStream,
    parser: SseLineParser,
    pending_results: VecDeque<ParseResult>,
    aggregate: AggregatedResult,
    started: Instant,
    completed: bool,
}

impl std::fmt::Debug for ActiveStreamingResponse {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActiveStreamingResponse")
            .field("completed", &self.completed)
            .field("aggregate", &self.aggregate)
            .field("pending_results_len", &self.pending_results.len())
            .field("parser_buffer_len", &self.parser.remaining_buffer().len())
            .finish_non_exhaustive()
    }
}

impl ActiveStreamingResponse {
    /// Wraps a raw body stream of `kind` events, timing from now.
    pub fn new<S>(kind: EndpointKind, byte_stream: S) -> Self
    where
        S: Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Send + 'static,
    {
        Self::with_start(kind, byte_stream, Instant::now())
    }

    fn with_start<S>(kind: EndpointKind, byte_stream: S, started: Instant) -> Self
    where
        S: Stream<Item = Result<bytes::Bytes, reqwest::Error>> + Send + 'static,
    {
        Self {
            byte_stream: Box::pin(byte_stream),
            parser: SseLineParser::new(kind),
            pending_results: VecDeque::new(),
            aggregate: AggregatedResult::new(),
            started,
            completed: false,
        }
    }

    fn complete_with(&mut self, terminated_normally: bool) {
        self.completed = true;
        self.pending_results.clear();
        self.aggregate
            .finalize(terminated_normally, self.started.elapsed().as_secs_f64());
    }

    fn drain_pending_results(&mut self) -> Option<StreamItem> {
        while let Some(result) = self.pending_results.pop_front() {
            match result {
                ParseResult::Event(event) => {
                    debug!(line = %event.raw_line, "Decoded stream event");
                    if let Some(fragment) = event.fragment {
                        self.aggregate.push_fragment(&fragment);
                        return Some(StreamItem::Fragment(fragment));
                    }
                }
                ParseResult::Malformed { raw_line, error } => {
                    self.aggregate.record_malformed();
                    warn!(line = %raw_line, "Error decoding stream frame: {error}");
                    return Some(StreamItem::Malformed { raw_line, error });
                }
                ParseResult::Done => {
                    debug!("Stream terminated with [DONE]");
                    self.complete_with(true);
                    return None;
                }
            }
        }
        None
    }

    /// Returns the next fragment or skipped malformed line.
    ///
    /// Returns `None` once the stream has ended, whether through `[DONE]`,
    /// the server closing the body, or a read failure mid-stream. None of
    /// these discards fragments already produced.
    pub async fn next_item(&mut self) -> Option<StreamItem> {
        loop {
            // Results already parsed from earlier chunks come first.
            if let Some(item) = self.drain_pending_results() {
                return Some(item);
            }
            if self.completed {
                return None;
            }

            match self.byte_stream.next().await {
                Some(Ok(bytes)) => {
                    self.pending_results.extend(self.parser.feed(&bytes));
                }
                Some(Err(e)) => {
                    warn!("Error reading streaming response, treating as end of stream: {e}");
                    self.complete_with(false);
                    return None;
                }
                None => {
                    // A final line may arrive without its newline.
                    let item = self.parser.finish().and_then(|result| {
                        self.pending_results.push_back(result);
                        self.drain_pending_results()
                    });
                    if !self.completed {
                        warn!("Stream ended without [DONE]");
                        self.complete_with(false);
                    }
                    return item;
                }
            }
        }
    }

    /// Returns the next non-empty text fragment, skipping malformed lines.
    pub async fn next_fragment(&mut self) -> Option<String> {
        while let Some(item) = self.next_item().await {
            if let StreamItem::Fragment(fragment) = item {
                return Some(fragment);
            }
        }
        None
    }

    /// Lazily yields the remaining fragments.
    pub fn fragments(&mut self) -> impl Stream<Item = String> + '_ {
        futures::stream::unfold(self, |this| async move {
            let fragment = this.next_fragment().await?;
            Some((fragment, this))
        })
    }

    /// Returns `true` if the stream has ended.
    #[must_use]
    pub const fn is_completed(&self) -> bool {
        self.completed
    }

    /// Aggregate of the fragments produced so far.
    #[must_use]
    pub const fn aggregate(&self) -> &AggregatedResult {
        &self.aggregate
    }

    /// Stops reading and returns the aggregate.
    ///
    /// Lines already received are still applied, including a `[DONE]`.
    /// Dropping the body closes the connection; a stream cut short this way
    /// is reported with `terminated_normally == false`.
    #[must_use]
    pub fn finish(mut self) -> AggregatedResult {
        while !self.completed && !self.pending_results.is_empty() {
            self.drain_pending_results();
        }
        if !self.completed {
            self.complete_with(false);
        }
        self.aggregate
    }

    /// Consumes the whole stream and returns the aggregate.
    pub async fn collect_text(mut self) -> AggregatedResult {
        while self.next_fragment().await.is_some() {}
        self.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response_from(kind: EndpointKind, chunks: Vec<&'static str>) -> ActiveStreamingResponse {
        let stream = futures::stream::iter(
            chunks
                .into_iter()
                .map(|c| Ok(bytes::Bytes::from_static(c.as_bytes()))),
        );
        ActiveStreamingResponse::new(kind, stream)
    }

    #[tokio::test]
    async fn test_next_fragment_does_not_drop_multiple_lines_in_single_chunk() {
        let sse = concat!(
            "data: {\"choices\":[{\"text\":\"Hello\"}]}\n\n",
            "data: {\"choices\":[{\"text\":\" World\"}]}\n\n",
            "data: [DONE]\n\n"
        );
        let mut resp = response_from(EndpointKind::Completion, vec![sse]);

        assert_eq!(resp.next_fragment().await.as_deref(), Some("Hello"));
        assert_eq!(resp.aggregate().full_text(), "Hello");
        assert_eq!(resp.next_fragment().await.as_deref(), Some(" World"));
        assert_eq!(resp.next_fragment().await, None);
        assert!(resp.is_completed());
        assert!(resp.aggregate().terminated_normally());
        assert_eq!(resp.next_fragment().await, None);
    }

    #[tokio::test]
    async fn test_lines_after_done_are_not_read() {
        let mut resp = response_from(
            EndpointKind::Completion,
            vec![
                "data: {\"choices\":[{\"text\":\"a\"}]}\ndata: [DONE]\n",
                "data: {\"choices\":[{\"text\":\"b\"}]}\n",
            ],
        );

        assert_eq!(resp.next_fragment().await.as_deref(), Some("a"));
        assert_eq!(resp.next_fragment().await, None);
        assert_eq!(resp.finish().full_text(), "a");
    }

    #[tokio::test]
    async fn test_fragments_stream_yields_in_order() {
        let mut resp = response_from(
            EndpointKind::Chat,
            vec![
                "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\"}}]}\n\n",
                "data: {\"choices\":[{\"delta\":{\"content\":\"Con\"}}]}\n\n",
                "data: {\"choices\":[{\"delta\":{\"content\":\"grats\"}}]}\n\n",
                "data: [DONE]\n\n",
            ],
        );

        let fragments: Vec<String> = resp.fragments().collect().await;
        assert_eq!(fragments, vec!["Con".to_string(), "grats".to_string()]);

        let aggregate = resp.finish();
        assert_eq!(aggregate.full_text(), "Congrats");
        assert_eq!(aggregate.fragment_count(), 2);
        assert!(aggregate.terminated_normally());
    }

    #[tokio::test]
    async fn test_unterminated_last_line_is_decoded_at_end_of_input() {
        let resp = response_from(
            EndpointKind::Completion,
            vec!["data: {\"choices\":[{\"text\":\"x\"}]}\n", "data: {\"choices\":[{\"text\":\"y\"}]}"],
        );

        let aggregate = resp.collect_text().await;
        assert_eq!(aggregate.full_text(), "xy");
        assert!(!aggregate.terminated_normally());
    }

    #[tokio::test]
    async fn test_read_error_mid_stream_keeps_fragments() {
        // Build a reqwest::Error without doing any network I/O.
        let req_err = reqwest::Client::new().get("not a url").build().unwrap_err();
        let stream = futures::stream::iter(vec![
            Ok(bytes::Bytes::from_static(b"data: {\"choices\":[{\"text\":\"kept\"}]}\n")),
            Err(req_err),
            Ok(bytes::Bytes::from_static(b"data: {\"choices\":[{\"text\":\"lost\"}]}\n")),
        ]);

        let aggregate = ActiveStreamingResponse::new(EndpointKind::Completion, stream)
            .collect_text()
            .await;

        assert_eq!(aggregate.full_text(), "kept");
        assert!(!aggregate.terminated_normally());
    }

    #[tokio::test]
    async fn test_malformed_lines_are_counted() {
        let resp = response_from(
            EndpointKind::Completion,
            vec![
                "data: {\"choices\":[{\"text\":\"a\"}]}\n",
                "data: {broken\n",
                "data: {\"choices\":[{\"text\":\"b\"}]}\n",
                "data: [DONE]\n",
            ],
        );

        let aggregate = resp.collect_text().await;
        assert_eq!(aggregate.full_text(), "ab");
        assert_eq!(aggregate.malformed_lines(), 1);
        assert!(aggregate.terminated_normally());
    }

    #[tokio::test]
    async fn test_finish_before_end_reports_abnormal_termination() {
        let mut resp = response_from(
            EndpointKind::Completion,
            vec![
                "data: {\"choices\":[{\"text\":\"first\"}]}\n",
                "data: {\"choices\":[{\"text\":\"second\"}]}\n",
                "data: [DONE]\n",
            ],
        );

        assert_eq!(resp.next_fragment().await.as_deref(), Some("first"));
        let aggregate = resp.finish();
        assert_eq!(aggregate.full_text(), "first");
        assert!(!aggregate.terminated_normally());
    }

    #[tokio::test]
    async fn test_finish_applies_lines_already_received() {
        let mut resp = response_from(
            EndpointKind::Completion,
            vec![concat!(
                "data: {\"choices\":[{\"text\":\"first\"}]}\n",
                "data: {broken\n",
                "data: {\"choices\":[{\"text\":\"second\"}]}\n",
                "data: [DONE]\n"
            )],
        );

        assert_eq!(resp.next_fragment().await.as_deref(), Some("first"));
        let aggregate = resp.finish();
        assert_eq!(aggregate.full_text(), "firstsecond");
        assert_eq!(aggregate.fragment_count(), 2);
        assert_eq!(aggregate.malformed_lines(), 1);
        assert!(aggregate.terminated_normally());
    }

    #[tokio::test]
    async fn test_next_item_surfaces_malformed_lines_in_order() {
        let mut resp = response_from(
            EndpointKind::Chat,
            vec![
                "data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\n",
                "data: {oops\n",
                "data: {\"choices\":[{\"delta\":{\"content\":\"b\"}}]}\n",
                "data: [DONE]\n",
            ],
        );

        assert_eq!(resp.next_item().await, Some(StreamItem::Fragment("a".to_string())));
        assert!(matches!(
            resp.next_item().await,
            Some(StreamItem::Malformed { ref raw_line, .. }) if raw_line == "data: {oops"
        ));
        assert_eq!(resp.next_item().await, Some(StreamItem::Fragment("b".to_string())));
        assert_eq!(resp.next_item().await, None);
        assert!(resp.aggregate().terminated_normally());
    }

    #[test]
    fn test_headers_carry_api_key() {
        let client = InfernoClient::new("secret", None).unwrap();
        let headers = client.headers(true).unwrap();

        assert_eq!(headers.get("x-api-key").unwrap(), "secret");
        assert_eq!(headers.get(CONTENT_TYPE).unwrap(), "application/json");
        assert_eq!(headers.get(ACCEPT).unwrap(), "text/event-stream");
    }

    #[test]
    fn test_invalid_api_key_header() {
        let client = InfernoClient::new("bad\nkey", None).unwrap();
        assert!(matches!(
            client.headers(false),
            Err(ProbeError::ConfigError(_))
        ));
    }
}
