//! Completion API access: request building, transport and stream decoding

pub mod client;
pub mod request;
pub mod response;
pub mod sse;

// Re-export main types for convenience
pub use client::{ActiveStreamingResponse, InfernoClient, StreamItem, StreamingResponse};
pub use request::{GenerationParams, PreparedRequest, RequestInput, build_request};
pub use response::{AggregatedResult, ApiResult};
pub use sse::{ParseResult, SseLineParser, StreamEvent};
