//! Error and retry-policy types for the research workflow domain.
//!
//! [`ResearchError`] covers conditions that abort a run before any report
//! exists. Collaborator failures ([`GatewayError`], [`CollectorError`],
//! [`NormalizerError`]) are recoverable from the engine's point of view: the
//! stage that hit them wraps them in a [`StageError`], which is recorded in the
//! run's `error_log` instead of unwinding.
//!
//! [`RetryPolicy`] is a cross-cutting concern: any error type that participates
//! in retry decisions must be able to produce a [`RetryPolicy`].

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::Stage;

// ---------------------------------------------------------------------------
// Retry semantics
// ---------------------------------------------------------------------------

/// Whether an error condition is safe to retry and, if so, after what delay.
///
/// Returned by collaborator error types to let the infrastructure adapters
/// decide whether to re-issue a request before giving up.
///
/// - `Retryable` errors: timeouts, refused connections, 5xx and 429 responses.
/// - `NonRetryable` errors: client errors (4xx other than 429), invalid
///   configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RetryPolicy {
    /// The operation may be retried.
    ///
    /// `after` optionally specifies the minimum delay before retrying (e.g.
    /// derived from a `Retry-After` response header).
    Retryable {
        /// Minimum back-off before the next attempt. `None` means apply the
        /// caller's own back-off schedule.
        after: Option<Duration>,
    },
    /// The operation must not be retried.
    NonRetryable,
}

impl RetryPolicy {
    /// Returns `true` for [`RetryPolicy::Retryable`].
    pub fn is_retryable(&self) -> bool {
        matches!(self, RetryPolicy::Retryable { .. })
    }
}

/// Classifies an HTTP status code the same way for every collaborator.
fn status_retry_policy(status: Option<u16>, retry_after: Option<Duration>) -> RetryPolicy {
    match status {
        Some(429) | Some(500..=599) | None => RetryPolicy::Retryable { after: retry_after },
        Some(_) => RetryPolicy::NonRetryable,
    }
}

// ---------------------------------------------------------------------------
// Run-level (fatal) errors
// ---------------------------------------------------------------------------

/// Errors that abort a research run.
///
/// A run that fails with one of these never reaches `finalize`; its
/// `final_report` stays empty and the caller reports the reason to the user.
#[derive(Debug, Error)]
pub enum ResearchError {
    /// The prompt is empty once whitespace and control characters are removed.
    #[error("Prompt is empty after normalization")]
    EmptyPrompt,

    /// The LLM gateway could not produce a query plan.
    ///
    /// Unparsable output is not an error (the normalized prompt becomes the sole
    /// query); only a gateway failure reaches this variant.
    #[error("Query generation failed: {source}")]
    QueryGeneration {
        /// The gateway failure after its internal retries were exhausted.
        #[source]
        source: GatewayError,
    },

    /// The engine detected a broken internal invariant (a bug, not a user error).
    ///
    /// Produced when the quality gate would be evaluated more than
    /// `max_loops + 1` times, or with `loop_count > max_loops`.
    #[error("Internal invariant violated: {message}")]
    InvariantViolation {
        /// Description of the violated invariant.
        message: String,
    },

    /// The run configuration is inconsistent.
    ///
    /// Produced at run start; the engine never starts with an invalid config.
    #[error("Configuration error: {message}")]
    ConfigurationError {
        /// Description of the configuration problem.
        message: String,
    },
}

// ---------------------------------------------------------------------------
// Collaborator errors
// ---------------------------------------------------------------------------

/// Failure classes of the LLM gateway, reported after its internal retries.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GatewayError {
    /// The request did not complete within the configured timeout.
    #[error("LLM request timed out")]
    Timeout,

    /// The LLM server could not be reached.
    #[error("LLM server unreachable: {message}")]
    ConnectionRefused {
        /// Transport-level detail.
        message: String,
    },

    /// The server answered with a non-success status.
    #[error("LLM server error (status {status}): {message}")]
    ServerError {
        /// HTTP status code.
        status: u16,
        /// Response body or reason phrase.
        message: String,
        /// Delay requested by the server via `Retry-After`, if any.
        retry_after: Option<Duration>,
    },

    /// The server answered, but the body did not contain a completion.
    #[error("Malformed LLM response: {message}")]
    MalformedResponse {
        /// What was missing or could not be decoded.
        message: String,
    },
}

impl GatewayError {
    /// Returns the retry policy for this failure.
    ///
    /// Malformed responses are retried: local servers occasionally truncate a
    /// body under load and a second request usually succeeds.
    pub fn retry_policy(&self) -> RetryPolicy {
        match self {
            GatewayError::Timeout
            | GatewayError::ConnectionRefused { .. }
            | GatewayError::MalformedResponse { .. } => RetryPolicy::Retryable { after: None },
            GatewayError::ServerError {
                status,
                retry_after,
                ..
            } => status_retry_policy(Some(*status), *retry_after),
        }
    }
}

/// Failures of the web-search source collector.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CollectorError {
    /// The search backend could not be reached or timed out.
    #[error("Search request failed: {message}")]
    Request {
        /// Transport-level detail.
        message: String,
    },

    /// The search backend answered with a non-success status.
    #[error("Search backend returned status {status}")]
    Status {
        /// HTTP status code.
        status: u16,
    },

    /// The search response could not be decoded.
    #[error("Search response could not be decoded: {message}")]
    Decode {
        /// Decoder detail.
        message: String,
    },
}

impl CollectorError {
    /// Returns the retry policy for this failure.
    pub fn retry_policy(&self) -> RetryPolicy {
        match self {
            CollectorError::Request { .. } => RetryPolicy::Retryable { after: None },
            CollectorError::Status { status } => status_retry_policy(Some(*status), None),
            CollectorError::Decode { .. } => RetryPolicy::NonRetryable,
        }
    }
}

/// Failures of the content normalizer.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum NormalizerError {
    /// The normalizer service could not be reached or timed out.
    #[error("Normalizer unavailable: {message}")]
    Unavailable {
        /// Transport-level detail.
        message: String,
    },

    /// The normalizer service answered with a non-success status.
    #[error("Normalizer returned status {status}")]
    Status {
        /// HTTP status code.
        status: u16,
    },

    /// The normalizer response could not be decoded.
    #[error("Normalizer response could not be decoded: {message}")]
    Decode {
        /// Decoder detail.
        message: String,
    },
}

// ---------------------------------------------------------------------------
// Stage errors
// ---------------------------------------------------------------------------

/// The underlying cause of a [`StageError`].
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StageFailure {
    /// LLM gateway failure.
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    /// Source collector failure.
    #[error(transparent)]
    Collector(#[from] CollectorError),
    /// Content normalizer failure.
    #[error(transparent)]
    Normalizer(#[from] NormalizerError),
    /// The stage had nothing to work on (e.g. no draft to critique).
    #[error("{0}")]
    MissingInput(String),
    /// The stage panicked; the engine caught the unwind at the stage boundary.
    #[error("stage panicked: {0}")]
    Panicked(String),
}

/// An isolated stage failure, recorded in the run's `error_log`.
///
/// The `Display` form is exactly the line appended to the log, so it always
/// names the stage and, for per-query failures, the query.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{stage} failed{}: {failure}", query_suffix(.query.as_deref()))]
pub struct StageError {
    /// Stage that failed.
    pub stage: Stage,
    /// Query the failure is scoped to, for per-query fan-out stages.
    pub query: Option<String>,
    /// Root cause.
    #[source]
    pub failure: StageFailure,
}

impl StageError {
    /// Creates a stage-wide error.
    pub fn new(stage: Stage, failure: impl Into<StageFailure>) -> Self {
        Self {
            stage,
            query: None,
            failure: failure.into(),
        }
    }

    /// Creates an error scoped to one query.
    pub fn for_query(stage: Stage, query: &str, failure: impl Into<StageFailure>) -> Self {
        Self {
            stage,
            query: Some(query.to_string()),
            failure: failure.into(),
        }
    }
}

fn query_suffix(query: Option<&str>) -> String {
    query
        .map(|q| format!(" for query '{q}'"))
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_errors_retry_only_for_transient_statuses() {
        let err = |status| GatewayError::ServerError {
            status,
            message: String::new(),
            retry_after: None,
        };
        assert!(err(503).retry_policy().is_retryable());
        assert!(err(429).retry_policy().is_retryable());
        assert_eq!(err(400).retry_policy(), RetryPolicy::NonRetryable);
        assert_eq!(err(404).retry_policy(), RetryPolicy::NonRetryable);
    }

    #[test]
    fn retry_after_is_carried_into_the_policy() {
        let err = GatewayError::ServerError {
            status: 429,
            message: "slow down".into(),
            retry_after: Some(Duration::from_secs(7)),
        };
        assert_eq!(
            err.retry_policy(),
            RetryPolicy::Retryable {
                after: Some(Duration::from_secs(7))
            }
        );
    }

    #[test]
    fn stage_error_names_stage_and_query() {
        let err = StageError::for_query(
            Stage::Research,
            "rust async",
            CollectorError::Status { status: 502 },
        );
        assert_eq!(
            err.to_string(),
            "research failed for query 'rust async': Search backend returned status 502"
        );

        let err = StageError::new(Stage::Draft, GatewayError::Timeout);
        assert_eq!(err.to_string(), "draft failed: LLM request timed out");
    }
}
