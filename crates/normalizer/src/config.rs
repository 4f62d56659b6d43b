use std::time::Duration;

use serde::{Deserialize, Serialize};

/// The `[normalizer]` configuration table.
///
/// Without a `base_url` the in-process [`crate::LocalNormalizer`] is used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizerConfig {
    pub base_url: Option<String>,
    pub timeout_secs: u64,
}

impl NormalizerConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout_secs: 30,
        }
    }
}
