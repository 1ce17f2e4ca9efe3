use serde::{Deserialize, Serialize};

/// Which of the two completion endpoints a request targets.
///
/// The variant also decides where generated text lives in a response payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointKind {
    Completion,
    Chat,
}

impl EndpointKind {
    /// Path of the endpoint relative to the `/v1` base.
    #[must_use]
    pub const fn path(self) -> &'static str {
        match self {
            Self::Completion => "completions",
            Self::Chat => "chat/completions",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

/// JSON body sent to either completion endpoint.
///
/// Exactly one of `prompt` / `messages` is populated. `stream` is only
/// serialized when set, matching what the server expects from a plain request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub messages: Option<Vec<ChatMessage>>,
    pub max_tokens: u32,
    pub temperature: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub stream: bool,
}

/// Test modes selectable from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum TestMode {
    All,
    Completion,
    Chat,
    StreamCompletion,
    StreamChat,
}

/// A single request/response exchange run by the probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeStep {
    pub kind: EndpointKind,
    pub stream: bool,
}

impl ProbeStep {
    #[must_use]
    pub const fn label(self) -> &'static str {
        match (self.kind, self.stream) {
            (EndpointKind::Completion, false) => "completion",
            (EndpointKind::Completion, true) => "stream-completion",
            (EndpointKind::Chat, false) => "chat",
            (EndpointKind::Chat, true) => "stream-chat",
        }
    }

    #[must_use]
    pub const fn title(self) -> &'static str {
        match (self.kind, self.stream) {
            (EndpointKind::Completion, false) => "Regular Completion Request",
            (EndpointKind::Completion, true) => "Streaming Completion Request",
            (EndpointKind::Chat, false) => "Regular Chat Completion Request",
            (EndpointKind::Chat, true) => "Streaming Chat Completion Request",
        }
    }
}

impl TestMode {
    /// Steps run for this mode, in execution order.
    #[must_use]
    pub fn steps(self) -> Vec<ProbeStep> {
        let completion = ProbeStep {
            kind: EndpointKind::Completion,
            stream: false,
        };
        let stream_completion = ProbeStep {
            kind: EndpointKind::Completion,
            stream: true,
        };
        let chat = ProbeStep {
            kind: EndpointKind::Chat,
            stream: false,
        };
        let stream_chat = ProbeStep {
            kind: EndpointKind::Chat,
            stream: true,
        };

        match self {
            Self::All => vec![completion, stream_completion, chat, stream_chat],
            Self::Completion => vec![completion],
            Self::Chat => vec![chat],
            Self::StreamCompletion => vec![stream_completion],
            Self::StreamChat => vec![stream_chat],
        }
    }
}
