//! Chat-completions wire format and failure classification.
//!
//! Only the fields this adapter reads are modelled; unknown fields in server
//! responses are ignored so that llama.cpp, Ollama and vLLM extensions do not
//! break decoding.

use std::time::Duration;

use pipeline::{ChatMessage, GatewayError};
use serde::{Deserialize, Serialize};

/// Longest server error body kept in a [`GatewayError::ServerError`] message.
const MAX_ERROR_BODY_CHARS: usize = 500;

/// Body of `POST /chat/completions`.
#[derive(Debug, Serialize)]
pub struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [ChatMessage],
    pub temperature: f32,
    pub stream: bool,
}

#[derive(Debug, Deserialize)]
pub struct ChatResponse {
    #[serde(default)]
    pub choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
pub struct Choice {
    #[serde(default)]
    pub message: Option<ResponseMessage>,
}

#[derive(Debug, Deserialize)]
pub struct ResponseMessage {
    #[serde(default)]
    pub content: Option<String>,
}

/// Extracts `choices[0].message.content` from a success body.
///
/// An empty content string is a valid completion; the stages decide what an
/// empty answer means.
pub fn parse_completion(body: &[u8]) -> Result<String, GatewayError> {
    let response: ChatResponse =
        serde_json::from_slice(body).map_err(|e| GatewayError::MalformedResponse {
            message: format!("invalid JSON body: {e}"),
        })?;

    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| GatewayError::MalformedResponse {
            message: "response contained no choices".to_string(),
        })?;

    choice
        .message
        .and_then(|m| m.content)
        .ok_or_else(|| GatewayError::MalformedResponse {
            message: "first choice has no message content".to_string(),
        })
}

/// Maps a transport-level `reqwest` failure onto the gateway taxonomy.
pub fn transport_error(err: &reqwest::Error) -> GatewayError {
    if err.is_timeout() {
        GatewayError::Timeout
    } else if err.is_decode() || err.is_body() {
        GatewayError::MalformedResponse {
            message: err.to_string(),
        }
    } else {
        GatewayError::ConnectionRefused {
            message: err.to_string(),
        }
    }
}

/// Builds the error for a non-success status, keeping a bounded excerpt of
/// the body for the log.
pub fn status_error(status: u16, retry_after: Option<Duration>, body: &str) -> GatewayError {
    let body = body.trim();
    let message = if body.is_empty() {
        "empty response body".to_string()
    } else if body.chars().count() > MAX_ERROR_BODY_CHARS {
        let excerpt: String = body.chars().take(MAX_ERROR_BODY_CHARS).collect();
        format!("{excerpt}…")
    } else {
        body.to_string()
    };
    GatewayError::ServerError {
        status,
        message,
        retry_after,
    }
}

/// Parses a `Retry-After` header given in delta-seconds.
///
/// The HTTP-date form is not used by the servers this adapter targets and
/// yields `None`, which falls back to the configured back-off.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serializes_roles_in_lowercase() {
        let messages = [ChatMessage::system("frame"), ChatMessage::user("ask")];
        let body = serde_json::to_value(ChatRequest {
            model: "m",
            messages: &messages,
            temperature: 0.5,
            stream: false,
        })
        .unwrap();
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "ask");
        assert_eq!(body["stream"], false);
    }

    #[test]
    fn completion_content_is_extracted() {
        let body = br#"{"id":"x","choices":[{"index":0,"message":{"role":"assistant","content":"hello"},"finish_reason":"stop"}],"usage":{}}"#;
        assert_eq!(parse_completion(body).unwrap(), "hello");
    }

    #[test]
    fn empty_content_is_a_valid_completion() {
        let body = br#"{"choices":[{"message":{"content":""}}]}"#;
        assert_eq!(parse_completion(body).unwrap(), "");
    }

    #[test]
    fn missing_choices_is_malformed() {
        let bodies: [&[u8]; 4] = [
            br#"{"choices":[]}"#,
            br#"{}"#,
            br#"{"choices":[{"message":{}}]}"#,
            b"<html>",
        ];
        for body in bodies {
            assert!(
                matches!(parse_completion(body), Err(GatewayError::MalformedResponse { .. })),
                "{}",
                String::from_utf8_lossy(body)
            );
        }
    }

    #[test]
    fn long_error_bodies_are_truncated() {
        let body = "x".repeat(2_000);
        let GatewayError::ServerError { message, status, .. } = status_error(502, None, &body)
        else {
            panic!("expected a server error");
        };
        assert_eq!(status, 502);
        assert_eq!(message.chars().count(), MAX_ERROR_BODY_CHARS + 1);
    }

    #[test]
    fn retry_after_accepts_delta_seconds_only() {
        assert_eq!(parse_retry_after(" 7 "), Some(Duration::from_secs(7)));
        assert_eq!(parse_retry_after("Wed, 21 Oct 2015 07:28:00 GMT"), None);
    }
}
