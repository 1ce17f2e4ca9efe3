//! Request construction for the completion endpoints.
//!
//! Building a request is pure: no network access, no validation errors. An
//! empty prompt or message list is a caller bug and is only flagged in debug
//! builds.

use url::Url;

use crate::core::config::endpoint_url;
use crate::core::models::{ChatMessage, CompletionRequest, EndpointKind};

/// Generation parameters shared by both endpoint variants.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationParams {
    pub max_tokens: u32,
    pub temperature: f64,
    pub model: Option<String>,
}

/// Input for one endpoint variant.
#[derive(Debug, Clone, Copy)]
pub enum RequestInput<'a> {
    Prompt(&'a str),
    Messages(&'a [ChatMessage]),
}

impl RequestInput<'_> {
    #[must_use]
    pub const fn kind(&self) -> EndpointKind {
        match self {
            Self::Prompt(_) => EndpointKind::Completion,
            Self::Messages(_) => EndpointKind::Chat,
        }
    }
}

/// A fully built request together with the URL it must be posted to.
#[derive(Debug, Clone, PartialEq)]
pub struct PreparedRequest {
    pub kind: EndpointKind,
    pub url: String,
    pub body: CompletionRequest,
}

impl PreparedRequest {
    #[must_use]
    pub const fn is_streaming(&self) -> bool {
        self.body.stream
    }
}

/// Builds the request body and target URL for `input` against the `/v1` `base`.
#[must_use]
pub fn build_request(
    base: &Url,
    input: RequestInput<'_>,
    params: &GenerationParams,
    stream: bool,
) -> PreparedRequest {
    debug_assert!(params.max_tokens > 0, "max_tokens must be positive");
    debug_assert!(params.temperature >= 0.0, "temperature must be non-negative");

    let (prompt, messages) = match input {
        RequestInput::Prompt(prompt) => {
            debug_assert!(!prompt.is_empty(), "completion prompt must not be empty");
            (Some(prompt.to_string()), None)
        }
        RequestInput::Messages(messages) => {
            debug_assert!(!messages.is_empty(), "chat message list must not be empty");
            (None, Some(messages.to_vec()))
        }
    };

    let kind = input.kind();
    PreparedRequest {
        kind,
        url: endpoint_url(base, kind),
        body: CompletionRequest {
            prompt,
            messages,
            max_tokens: params.max_tokens,
            temperature: params.temperature,
            model: params.model.clone(),
            stream,
        },
    }
}
