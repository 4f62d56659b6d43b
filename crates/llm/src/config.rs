//! Connection and retry settings for the LLM server.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Settings for [`crate::OpenAiCompatibleClient`].
///
/// Deserialized from the `[llm]` table of the configuration file; every field
/// is optional there and falls back to [`LlmConfig::default`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Base URL of the OpenAI-compatible API, including any `/v1` prefix.
    pub base_url: String,

    /// Model name sent with every request.
    pub model: String,

    /// Bearer token. Local servers usually need none.
    pub api_key: Option<String>,

    /// Sampling temperature.
    pub temperature: f32,

    /// Per-request timeout, covering connect and the full response body.
    pub timeout_secs: u64,

    /// Retries after the first attempt for retryable failures.
    pub max_retries: u32,

    /// Back-off before the first retry; doubled for every further retry.
    pub retry_backoff_ms: u64,
}

impl LlmConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Delay before retry number `attempt` (zero-based) when the server gave
    /// no `Retry-After` hint. Capped at [`MAX_BACKOFF`].
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        Duration::from_millis(self.retry_backoff_ms.saturating_mul(factor)).min(MAX_BACKOFF)
    }
}

/// Upper bound for a single computed back-off.
pub const MAX_BACKOFF: Duration = Duration::from_secs(30);

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434/v1".to_string(),
            model: "qwen2.5:7b".to_string(),
            api_key: None,
            temperature: 0.3,
            timeout_secs: 180,
            max_retries: 2,
            retry_backoff_ms: 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_per_attempt() {
        let config = LlmConfig {
            retry_backoff_ms: 250,
            ..LlmConfig::default()
        };
        assert_eq!(config.backoff(0), Duration::from_millis(250));
        assert_eq!(config.backoff(1), Duration::from_millis(500));
        assert_eq!(config.backoff(3), Duration::from_millis(2000));
    }

    #[test]
    fn backoff_is_capped() {
        let config = LlmConfig::default();
        assert_eq!(config.backoff(20), MAX_BACKOFF);
        assert_eq!(config.backoff(200), MAX_BACKOFF);
    }

    #[test]
    fn partial_toml_style_input_keeps_defaults() {
        let config: LlmConfig =
            serde_json::from_str(r#"{"model": "llama3.1:8b", "max_retries": 0}"#).unwrap();
        assert_eq!(config.model, "llama3.1:8b");
        assert_eq!(config.max_retries, 0);
        assert_eq!(config.base_url, LlmConfig::default().base_url);
    }
}
