//! Client for the containerised normalizer service.

use async_trait::async_trait;
use pipeline::{ContentNormalizer, NormalizerError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::NormalizerConfig;

/// Errors raised while constructing an [`HttpNormalizer`].
#[derive(Debug, Error)]
pub enum NormalizerSetupError {
    #[error("Normalizer base URL is not configured")]
    MissingBaseUrl,

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

#[derive(Debug, Serialize)]
struct NormalizeRequest<'a> {
    texts: &'a [String],
}

#[derive(Debug, Deserialize)]
struct NormalizeResponse {
    texts: Vec<String>,
}

/// [`ContentNormalizer`] that delegates to `POST {base_url}/normalize`.
///
/// Request and response bodies are `{"texts": [...]}`. Blank blocks in the
/// response are dropped. No retries: a failed call is isolated to one query
/// by the process stage and the next pass tries again.
#[derive(Debug, Clone)]
pub struct HttpNormalizer {
    http: reqwest::Client,
    endpoint: String,
}

impl HttpNormalizer {
    pub fn new(config: &NormalizerConfig) -> Result<Self, NormalizerSetupError> {
        let base = config
            .base_url
            .as_deref()
            .map(|url| url.trim().trim_end_matches('/'))
            .filter(|url| !url.is_empty())
            .ok_or(NormalizerSetupError::MissingBaseUrl)?;
        let http = reqwest::Client::builder().timeout(config.timeout()).build()?;
        Ok(Self {
            endpoint: format!("{base}/normalize"),
            http,
        })
    }
}

#[async_trait]
impl ContentNormalizer for HttpNormalizer {
    async fn normalize(&self, texts: Vec<String>) -> Result<Vec<String>, NormalizerError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let response = self
            .http
            .post(&self.endpoint)
            .json(&NormalizeRequest { texts: &texts })
            .send()
            .await
            .map_err(unavailable)?;

        let status = response.status();
        if !status.is_success() {
            return Err(NormalizerError::Status {
                status: status.as_u16(),
            });
        }
        let body = response.bytes().await.map_err(unavailable)?;
        let blocks = decode_response(&body)?;
        debug!(input = texts.len(), output = blocks.len(), "normalizer responded");
        Ok(blocks)
    }
}

fn unavailable(err: reqwest::Error) -> NormalizerError {
    NormalizerError::Unavailable {
        message: err.to_string(),
    }
}

fn decode_response(body: &[u8]) -> Result<Vec<String>, NormalizerError> {
    let response: NormalizeResponse =
        serde_json::from_slice(body).map_err(|e| NormalizerError::Decode {
            message: e.to_string(),
        })?;
    Ok(response
        .texts
        .into_iter()
        .map(|block| block.trim().to_string())
        .filter(|block| !block.is_empty())
        .collect())
}
