//! Response payload extraction and result types.

use reqwest::StatusCode;
use serde_json::{Value, json};

use crate::core::models::EndpointKind;
use crate::errors::ProbeError;

fn first_choice(payload: &Value) -> Option<&Value> {
    payload.get("choices")?.as_array()?.first()
}

/// Text delta carried by one streamed payload, or `""` when there is none.
///
/// Completion streams put it at `choices[0].text`, chat streams at
/// `choices[0].delta.content`.
#[must_use]
pub fn stream_fragment(kind: EndpointKind, payload: &Value) -> &str {
    let Some(choice) = first_choice(payload) else {
        return "";
    };
    let field = match kind {
        EndpointKind::Completion => choice.get("text"),
        EndpointKind::Chat => choice.get("delta").and_then(|d| d.get("content")),
    };
    field.and_then(Value::as_str).unwrap_or("")
}

/// Generated text of a non-streaming response, or `""` when there is none.
#[must_use]
pub fn response_text(kind: EndpointKind, payload: &Value) -> String {
    let Some(choice) = first_choice(payload) else {
        return String::new();
    };
    let field = match kind {
        EndpointKind::Completion => choice.get("text"),
        EndpointKind::Chat => choice.get("message").and_then(|m| m.get("content")),
    };
    field.and_then(Value::as_str).unwrap_or("").to_string()
}

/// Outcome of a non-streaming request.
#[derive(Debug, Clone, PartialEq)]
pub enum ApiResult {
    Success {
        body: Value,
        text: String,
        elapsed_seconds: f64,
    },
    /// The server answered with a non-success status.
    Failed { status: u16, body: String },
}

impl ApiResult {
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    #[must_use]
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Success { text, .. } => Some(text),
            Self::Failed { .. } => None,
        }
    }

    /// The full response body, or `{"error": <raw body>}` for a failed request.
    #[must_use]
    pub fn to_json(&self) -> Value {
        match self {
            Self::Success { body, .. } => body.clone(),
            Self::Failed { body, .. } => json!({ "error": body }),
        }
    }
}

/// Decodes a complete, non-streamed response body.
///
/// A non-success status is not an error: it becomes [`ApiResult::Failed`]
/// carrying the raw body. Only a success body that is not JSON fails.
pub fn decode_response(
    kind: EndpointKind,
    status: StatusCode,
    body: &str,
    elapsed_seconds: f64,
) -> Result<ApiResult, ProbeError> {
    if !status.is_success() {
        return Ok(ApiResult::Failed {
            status: status.as_u16(),
            body: body.to_string(),
        });
    }

    let payload: Value = serde_json::from_str(body)?;
    let text = response_text(kind, &payload);
    Ok(ApiResult::Success {
        body: payload,
        text,
        elapsed_seconds,
    })
}

/// Text reconstructed from a stream, in arrival order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregatedResult {
    full_text: String,
    elapsed_seconds: f64,
    terminated_normally: bool,
    fragment_count: usize,
    malformed_lines: usize,
}

impl AggregatedResult {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn full_text(&self) -> &str {
        &self.full_text
    }

    #[must_use]
    pub const fn elapsed_seconds(&self) -> f64 {
        self.elapsed_seconds
    }

    /// `true` only when the stream ended with the `[DONE]` sentinel.
    #[must_use]
    pub const fn terminated_normally(&self) -> bool {
        self.terminated_normally
    }

    #[must_use]
    pub const fn fragment_count(&self) -> usize {
        self.fragment_count
    }

    #[must_use]
    pub const fn malformed_lines(&self) -> usize {
        self.malformed_lines
    }

    pub(crate) fn push_fragment(&mut self, fragment: &str) {
        if fragment.is_empty() {
            return;
        }
        self.full_text.push_str(fragment);
        self.fragment_count += 1;
    }

    pub(crate) fn record_malformed(&mut self) {
        self.malformed_lines += 1;
    }

    pub(crate) fn finalize(&mut self, terminated_normally: bool, elapsed_seconds: f64) {
        self.terminated_normally = terminated_normally;
        self.elapsed_seconds = elapsed_seconds;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_completion_text() {
        let result = decode_response(
            EndpointKind::Completion,
            StatusCode::OK,
            r#"{"choices":[{"text":"hello"}]}"#,
            0.1,
        )
        .unwrap();

        assert_eq!(result.text(), Some("hello"));
    }

    #[test]
    fn test_decode_empty_choices() {
        let result = decode_response(
            EndpointKind::Completion,
            StatusCode::OK,
            r#"{"choices":[]}"#,
            0.1,
        )
        .unwrap();

        assert_eq!(result.text(), Some(""));
    }

    #[test]
    fn test_decode_chat_message_content() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"Congrats!"}}]}"#;
        let result = decode_response(EndpointKind::Chat, StatusCode::OK, body, 0.0).unwrap();

        assert_eq!(result.text(), Some("Congrats!"));
        assert_eq!(result.to_json()["choices"][0]["message"]["role"], "assistant");
    }

    #[test]
    fn test_decode_error_status_keeps_raw_body() {
        let result = decode_response(
            EndpointKind::Chat,
            StatusCode::INTERNAL_SERVER_ERROR,
            "server error",
            0.0,
        )
        .unwrap();

        assert!(!result.is_success());
        assert_eq!(
            result,
            ApiResult::Failed {
                status: 500,
                body: "server error".to_string()
            }
        );
        assert_eq!(result.to_json(), json!({"error": "server error"}));
    }

    #[test]
    fn test_decode_invalid_success_body() {
        let err = decode_response(EndpointKind::Completion, StatusCode::OK, "<html>", 0.0)
            .unwrap_err();

        assert!(matches!(err, ProbeError::DecodeError(_)));
    }

    #[test]
    fn test_stream_fragment_tolerates_wrong_types() {
        let payload = json!({"choices": [{"text": 42}]});
        assert_eq!(stream_fragment(EndpointKind::Completion, &payload), "");

        let payload = json!({"choices": "nope"});
        assert_eq!(stream_fragment(EndpointKind::Chat, &payload), "");
    }

    #[test]
    fn test_aggregate_skips_empty_fragments() {
        let mut aggregate = AggregatedResult::new();
        aggregate.push_fragment("a");
        aggregate.push_fragment("");
        aggregate.push_fragment("b");

        assert_eq!(aggregate.full_text(), "ab");
        assert_eq!(aggregate.fragment_count(), 2);
    }
}
