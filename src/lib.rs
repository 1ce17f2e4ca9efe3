//! Inferno probe - exercises a text/chat completion HTTP API.
//!
//! The crate sends completion and chat-completion requests, either as a
//! single request/response or as a server-sent event stream, and decodes what
//! comes back. Streamed responses are decoded line by line into text
//! fragments that are handed out as soon as they arrive and accumulated into
//! one aggregate. Malformed frames are logged and skipped, and a stream that
//! ends without its `[DONE]` sentinel keeps everything received so far.
//!
//! # Architecture
//!
//! - `ai::request` builds the JSON body and target URL
//! - `ai::client` posts it with reqwest and wraps the response body
//! - `ai::sse` decodes `data:` lines into fragments
//! - `probe` runs the selected test modes and reports through `console`
//!
//! # Example
//!
//! ```no_run
//! use inferno_probe::ai::{GenerationParams, InfernoClient, RequestInput, StreamingResponse, build_request};
//! use inferno_probe::core::config::ProbeConfig;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     inferno_probe::setup_logging();
//!
//!     let config = ProbeConfig::default();
//!     let client = InfernoClient::from_config(&config)?;
//!     let params = GenerationParams {
//!         max_tokens: config.max_tokens,
//!         temperature: config.temperature,
//!         model: None,
//!     };
//!     let request = build_request(
//!         &config.base_url()?,
//!         RequestInput::Prompt("Once upon a time"),
//!         &params,
//!         true,
//!     );
//!
//!     match client.stream(&request).await? {
//!         StreamingResponse::Active(mut response) => {
//!             while let Some(fragment) = response.next_fragment().await {
//!                 print!("{fragment}");
//!             }
//!             let aggregate = response.finish();
//!             println!("\n{} chars in {:.2}s", aggregate.full_text().len(), aggregate.elapsed_seconds());
//!         }
//!         StreamingResponse::Rejected { status, body } => eprintln!("{status}: {body}"),
//!     }
//!
//!     Ok(())
//! }
//! ```

// Module declarations
pub mod ai;
pub mod console;
pub mod core;
pub mod errors;
pub mod probe;

pub use errors::ProbeError;

/// Configure structured JSON logging on stderr.
///
/// Stdout is left to the console report. The level comes from `RUST_LOG`
/// and defaults to `warn`. Calling this more than once is harmless.
///
/// # Example
///
/// ```
/// inferno_probe::setup_logging();
/// ```
pub fn setup_logging() {
    use tracing_subscriber::prelude::*;
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let fmt_layer = tracing_subscriber::fmt::layer()
        .json()
        .with_target(true)
        .with_writer(std::io::stderr);

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init();
}
