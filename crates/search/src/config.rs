use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Settings for [`crate::SearxngCollector`], read from the `[search]` table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Base URL of the SearxNG instance.
    pub base_url: String,

    /// Per-request timeout.
    pub timeout_secs: u64,

    /// SearxNG `language` parameter (for example `en` or `de-CH`). Omitted
    /// when unset, leaving the choice to the instance defaults.
    pub language: Option<String>,

    /// Upstream engines to query. Empty means the instance defaults.
    pub engines: Vec<String>,

    /// Result pages fetched at most per query while fewer than the requested
    /// minimum of sources has been found.
    pub max_pages: u32,

    /// Retries after the first attempt for retryable failures.
    pub max_retries: u32,
}

impl SearchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            timeout_secs: 20,
            language: None,
            engines: Vec::new(),
            max_pages: 2,
            max_retries: 1,
        }
    }
}
