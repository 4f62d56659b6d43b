//! Collaborator capabilities consumed by the workflow stages.
//!
//! Infrastructure crates implement these traits; the `nodes` crate depends only
//! on the traits. All three are object-safe (`async_trait`) so the composition
//! root can hand the engine `Arc<dyn …>` values chosen at runtime.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{ChatMessage, CollectorError, GatewayError, NormalizerError, SourceRecord};

/// Text generation against the local LLM server.
///
/// Implementations own their retry loop and timeout; a returned error means
/// the retries are exhausted.
#[async_trait]
pub trait LlmGateway: Send + Sync {
    /// Generates a completion for `messages`.
    async fn generate(&self, messages: &[ChatMessage]) -> Result<String, GatewayError>;
}

/// Web search.
#[async_trait]
pub trait SourceCollector: Send + Sync {
    /// Returns up to `max_count` sources for `query`.
    ///
    /// Returning fewer than `min_count` records is not an error; coverage is
    /// judged by the quality gate. Partial results on error are allowed only
    /// through `Ok`.
    async fn search(
        &self,
        query: &str,
        min_count: usize,
        max_count: usize,
    ) -> Result<Vec<SourceRecord>, CollectorError>;
}

/// Cleaning of raw text blocks.
#[async_trait]
pub trait ContentNormalizer: Send + Sync {
    /// Normalizes `texts`.
    ///
    /// The output may be shorter than the input if some blocks were
    /// unprocessable; callers must not assume positional correspondence.
    async fn normalize(&self, texts: Vec<String>) -> Result<Vec<String>, NormalizerError>;
}

// ---------------------------------------------------------------------------
// Forwarding impls so shared handles can be passed where a port is expected.
// ---------------------------------------------------------------------------

#[async_trait]
impl<T: LlmGateway + ?Sized> LlmGateway for Arc<T> {
    async fn generate(&self, messages: &[ChatMessage]) -> Result<String, GatewayError> {
        (**self).generate(messages).await
    }
}

#[async_trait]
impl<T: SourceCollector + ?Sized> SourceCollector for Arc<T> {
    async fn search(
        &self,
        query: &str,
        min_count: usize,
        max_count: usize,
    ) -> Result<Vec<SourceRecord>, CollectorError> {
        (**self).search(query, min_count, max_count).await
    }
}

#[async_trait]
impl<T: ContentNormalizer + ?Sized> ContentNormalizer for Arc<T> {
    async fn normalize(&self, texts: Vec<String>) -> Result<Vec<String>, NormalizerError> {
        (**self).normalize(texts).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Echo;

    #[async_trait]
    impl LlmGateway for Echo {
        async fn generate(&self, messages: &[ChatMessage]) -> Result<String, GatewayError> {
            Ok(messages.last().map(|m| m.content.clone()).unwrap_or_default())
        }
    }

    #[tokio::test]
    async fn shared_handles_forward_to_the_inner_port() {
        let gateway: Arc<dyn LlmGateway> = Arc::new(Echo);
        let shared = Arc::new(gateway);
        let reply = shared.generate(&[ChatMessage::user("hi")]).await.unwrap();
        assert_eq!(reply, "hi");
    }
}
