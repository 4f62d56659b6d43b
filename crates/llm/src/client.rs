//! The HTTP client and its retry loop.

use async_trait::async_trait;
use pipeline::{ChatMessage, GatewayError, LlmGateway, RetryPolicy};
use reqwest::header::RETRY_AFTER;
use thiserror::Error;
use tracing::{debug, warn};

use crate::wire::{self, ChatRequest};
use crate::LlmConfig;

/// Errors raised while constructing a client from configuration.
#[derive(Debug, Error)]
pub enum LlmSetupError {
    #[error("LLM base URL must not be empty")]
    EmptyBaseUrl,

    #[error("LLM model name must not be empty")]
    EmptyModel,

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// [`LlmGateway`] backed by an OpenAI-compatible chat-completions endpoint.
///
/// Retryable failures (see [`GatewayError::retry_policy`]) are retried up to
/// `max_retries` times. The delay is the server's `Retry-After` value when
/// present, otherwise the exponential back-off from [`LlmConfig::backoff`].
/// Callers only ever see the last failure.
#[derive(Debug, Clone)]
pub struct OpenAiCompatibleClient {
    http: reqwest::Client,
    endpoint: String,
    config: LlmConfig,
}

impl OpenAiCompatibleClient {
    pub fn new(config: LlmConfig) -> Result<Self, LlmSetupError> {
        let base = config.base_url.trim().trim_end_matches('/');
        if base.is_empty() {
            return Err(LlmSetupError::EmptyBaseUrl);
        }
        if config.model.trim().is_empty() {
            return Err(LlmSetupError::EmptyModel);
        }
        let http = reqwest::Client::builder().timeout(config.timeout()).build()?;
        Ok(Self {
            endpoint: format!("{base}/chat/completions"),
            http,
            config,
        })
    }

    pub fn config(&self) -> &LlmConfig {
        &self.config
    }

    async fn attempt(&self, messages: &[ChatMessage]) -> Result<String, GatewayError> {
        let body = ChatRequest {
            model: &self.config.model,
            messages,
            temperature: self.config.temperature,
            stream: false,
        };
        let mut request = self.http.post(&self.endpoint).json(&body);
        if let Some(key) = &self.config.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| wire::transport_error(&e))?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(wire::parse_retry_after);
            let text = response.text().await.unwrap_or_default();
            return Err(wire::status_error(status.as_u16(), retry_after, &text));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| wire::transport_error(&e))?;
        wire::parse_completion(&bytes)
    }
}

#[async_trait]
impl LlmGateway for OpenAiCompatibleClient {
    async fn generate(&self, messages: &[ChatMessage]) -> Result<String, GatewayError> {
        let mut retries = 0;
        loop {
            match self.attempt(messages).await {
                Ok(text) => {
                    debug!(
                        model = %self.config.model,
                        retries,
                        chars = text.chars().count(),
                        "LLM completion received"
                    );
                    return Ok(text);
                }
                Err(err) => {
                    let after = match err.retry_policy() {
                        RetryPolicy::Retryable { after } if retries < self.config.max_retries => {
                            after
                        }
                        _ => return Err(err),
                    };
                    let delay = after.unwrap_or_else(|| self.config.backoff(retries));
                    retries += 1;
                    warn!(
                        error = %err,
                        retry = retries,
                        max_retries = self.config.max_retries,
                        delay_ms = delay.as_millis() as u64,
                        "LLM request failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mock_server::{MockResponse, MockServer};

    const OK_BODY: &str = r#"{"choices":[{"message":{"role":"assistant","content":"answer"}}]}"#;

    fn config_for(base_url: &str, max_retries: u32) -> LlmConfig {
        LlmConfig {
            base_url: format!("{base_url}/v1/"),
            model: "test-model".to_string(),
            max_retries,
            retry_backoff_ms: 1,
            timeout_secs: 5,
            ..LlmConfig::default()
        }
    }

    #[test]
    fn empty_base_url_is_rejected() {
        let config = LlmConfig {
            base_url: "  ".to_string(),
            ..LlmConfig::default()
        };
        assert!(matches!(
            OpenAiCompatibleClient::new(config),
            Err(LlmSetupError::EmptyBaseUrl)
        ));
    }

    #[tokio::test]
    async fn sends_chat_request_and_returns_content() {
        let server = MockServer::scripted(vec![MockResponse::json(200, OK_BODY)]).await;
        let mut config = config_for(server.base_url(), 0);
        config.api_key = Some("secret".to_string());
        let client = OpenAiCompatibleClient::new(config).unwrap();

        let answer = client
            .generate(&[ChatMessage::system("frame"), ChatMessage::user("ask")])
            .await
            .unwrap();

        assert_eq!(answer, "answer");
        let requests = server.requests();
        assert_eq!(requests.len(), 1);
        let request = &requests[0];
        assert_eq!(request.method, "POST");
        assert_eq!(request.path_and_query(), "/v1/chat/completions");
        assert_eq!(request.header("authorization"), Some("Bearer secret"));
        let body = request.json();
        assert_eq!(body["model"], "test-model");
        assert_eq!(body["stream"], false);
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["messages"][1]["content"], "ask");
    }

    #[tokio::test]
    async fn retries_retryable_status_then_succeeds() {
        let server = MockServer::scripted(vec![
            MockResponse::json(503, "busy").with_header("retry-after", "0"),
            MockResponse::json(429, ""),
            MockResponse::json(200, OK_BODY),
        ])
        .await;
        let client = OpenAiCompatibleClient::new(config_for(server.base_url(), 2)).unwrap();

        let answer = client.generate(&[ChatMessage::user("ask")]).await.unwrap();

        assert_eq!(answer, "answer");
        assert_eq!(server.requests().len(), 3);
    }

    #[tokio::test]
    async fn gives_up_after_max_retries() {
        let server = MockServer::scripted(vec![
            MockResponse::json(500, "boom"),
            MockResponse::json(500, "boom"),
        ])
        .await;
        let client = OpenAiCompatibleClient::new(config_for(server.base_url(), 1)).unwrap();

        let err = client.generate(&[ChatMessage::user("ask")]).await.unwrap_err();

        assert!(matches!(err, GatewayError::ServerError { status: 500, ref message, .. } if message == "boom"));
        assert_eq!(server.requests().len(), 2);
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let server =
            MockServer::scripted(vec![MockResponse::json(400, r#"{"error":"unknown model"}"#)])
                .await;
        let client = OpenAiCompatibleClient::new(config_for(server.base_url(), 3)).unwrap();

        let err = client.generate(&[ChatMessage::user("ask")]).await.unwrap_err();

        assert!(matches!(err, GatewayError::ServerError { status: 400, .. }));
        assert_eq!(server.requests().len(), 1);
    }

    #[tokio::test]
    async fn undecodable_success_body_is_malformed() {
        let server = MockServer::scripted(vec![MockResponse::json(200, "not json")]).await;
        let client = OpenAiCompatibleClient::new(config_for(server.base_url(), 0)).unwrap();

        let err = client.generate(&[ChatMessage::user("ask")]).await.unwrap_err();

        assert!(matches!(err, GatewayError::MalformedResponse { .. }));
    }

    #[tokio::test]
    async fn unreachable_server_is_connection_refused() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let client =
            OpenAiCompatibleClient::new(config_for(&format!("http://{addr}"), 0)).unwrap();

        let err = client.generate(&[ChatMessage::user("ask")]).await.unwrap_err();

        assert!(matches!(err, GatewayError::ConnectionRefused { .. }), "{err:?}");
    }
}
