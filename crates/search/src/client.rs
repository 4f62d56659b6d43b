//! The SearxNG HTTP client.

use async_trait::async_trait;
use pipeline::{CollectorError, SourceCollector, SourceRecord, Timestamp};
use thiserror::Error;
use tracing::{debug, warn};

use crate::results::{self, ResultSet, SearchHit};
use crate::SearchConfig;

/// Back-off between retries of a failed page request.
const RETRY_DELAY: std::time::Duration = std::time::Duration::from_millis(300);

/// Errors raised while constructing a collector from configuration.
#[derive(Debug, Error)]
pub enum SearchSetupError {
    #[error("Search base URL must not be empty")]
    EmptyBaseUrl,

    #[error("Failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}

/// [`SourceCollector`] backed by `GET {base_url}/search?format=json`.
///
/// Result pages are requested one after the other until `min_count` distinct
/// URLs are collected, `max_count` is reached, a page brings nothing new, or
/// `max_pages` is exhausted. A failure on any page after the first keeps the
/// results collected so far.
#[derive(Debug, Clone)]
pub struct SearxngCollector {
    http: reqwest::Client,
    endpoint: String,
    config: SearchConfig,
}

impl SearxngCollector {
    pub fn new(config: SearchConfig) -> Result<Self, SearchSetupError> {
        let base = config.base_url.trim().trim_end_matches('/');
        if base.is_empty() {
            return Err(SearchSetupError::EmptyBaseUrl);
        }
        let http = reqwest::Client::builder().timeout(config.timeout()).build()?;
        Ok(Self {
            endpoint: format!("{base}/search"),
            http,
            config,
        })
    }

    fn params(&self, query: &str, page: u32) -> Vec<(&'static str, String)> {
        let mut params = vec![("q", query.to_string()), ("format", "json".to_string())];
        if page > 1 {
            params.push(("pageno", page.to_string()));
        }
        if let Some(language) = &self.config.language {
            params.push(("language", language.clone()));
        }
        if !self.config.engines.is_empty() {
            params.push(("engines", self.config.engines.join(",")));
        }
        params
    }

    async fn fetch_page(&self, query: &str, page: u32) -> Result<Vec<SearchHit>, CollectorError> {
        let response = self
            .http
            .get(&self.endpoint)
            .query(&self.params(query, page))
            .send()
            .await
            .map_err(request_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(CollectorError::Status {
                status: status.as_u16(),
            });
        }
        let body = response.bytes().await.map_err(request_error)?;
        Ok(results::decode(&body)?.results)
    }

    async fn fetch_page_with_retry(
        &self,
        query: &str,
        page: u32,
    ) -> Result<Vec<SearchHit>, CollectorError> {
        let mut retries = 0;
        loop {
            match self.fetch_page(query, page).await {
                Ok(hits) => return Ok(hits),
                Err(err) if err.retry_policy().is_retryable() && retries < self.config.max_retries => {
                    retries += 1;
                    warn!(query, page, error = %err, retry = retries, "search request failed, retrying");
                    tokio::time::sleep(RETRY_DELAY * retries).await;
                }
                Err(err) => return Err(err),
            }
        }
    }
}

fn request_error(err: reqwest::Error) -> CollectorError {
    CollectorError::Request {
        message: err.to_string(),
    }
}

#[async_trait]
impl SourceCollector for SearxngCollector {
    async fn search(
        &self,
        query: &str,
        min_count: usize,
        max_count: usize,
    ) -> Result<Vec<SourceRecord>, CollectorError> {
        let mut collected = ResultSet::new(max_count);
        let mut page = 1;
        while !collected.is_full() && page <= self.config.max_pages.max(1) {
            let hits = match self.fetch_page_with_retry(query, page).await {
                Ok(hits) => hits,
                Err(err) if page > 1 => {
                    warn!(query, page, error = %err, "search paging failed, keeping earlier pages");
                    break;
                }
                Err(err) => return Err(err),
            };
            let fresh = collected.extend(hits, Timestamp::now());
            if fresh == 0 || collected.len() >= min_count {
                break;
            }
            page += 1;
        }

        debug!(query, sources = collected.len(), pages = page, "search finished");
        Ok(collected.into_records())
    }
}
