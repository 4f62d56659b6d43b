//! Shared value types for the research workflow domain.
//!
//! Unlike the newtype identifiers in [`crate::identifiers`], these types carry
//! meaningful values that flow between stages and collaborators.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// A UTC wall-clock timestamp.
///
/// Wraps [`chrono::DateTime<Utc>`] so callers never depend on `chrono` types
/// directly; the underlying representation can change without affecting the
/// domain API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Returns the current UTC time as a [`Timestamp`].
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Creates a [`Timestamp`] from a [`DateTime<Utc>`].
    pub fn from_utc(dt: DateTime<Utc>) -> Self {
        Self(dt)
    }

    /// Returns the underlying [`DateTime<Utc>`].
    pub fn as_datetime(self) -> DateTime<Utc> {
        self.0
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_rfc3339())
    }
}

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

/// One web source returned by the source collector for a query.
///
/// Immutable once constructed: fields are private and only readable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRecord {
    url: String,
    title: String,
    content: String,
    timestamp: Timestamp,
}

impl SourceRecord {
    /// Creates a new record.
    pub fn new(
        url: impl Into<String>,
        title: impl Into<String>,
        content: impl Into<String>,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            url: url.into(),
            title: title.into(),
            content: content.into(),
            timestamp,
        }
    }

    /// Location of the source.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Page title as reported by the search backend.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Snippet or extracted page content.
    pub fn content(&self) -> &str {
        &self.content
    }

    /// When the source was collected.
    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }

    /// Text handed to the content normalizer: title and content, separated by
    /// a blank line. Blank parts are omitted.
    pub fn text_block(&self) -> String {
        match (self.title.trim(), self.content.trim()) {
            ("", content) => content.to_string(),
            (title, "") => title.to_string(),
            (title, content) => format!("{title}\n\n{content}"),
        }
    }
}

// ---------------------------------------------------------------------------
// LLM messages
// ---------------------------------------------------------------------------

/// Author role of a chat message sent to the LLM gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatRole {
    /// Instructions that frame the whole exchange.
    System,
    /// The request itself.
    User,
    /// A previous model answer (used for multi-turn prompts).
    Assistant,
}

/// A single role/content message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Who authored the message.
    pub role: ChatRole,
    /// Message text.
    pub content: String,
}

impl ChatMessage {
    /// Creates a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::System,
            content: content.into(),
        }
    }

    /// Creates a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

// ---------------------------------------------------------------------------
// Stages
// ---------------------------------------------------------------------------

/// The named steps of the research workflow, in execution order.
///
/// `Gate` and `Done` are engine states rather than transformations; they are
/// listed here so the engine can be driven by a single enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Trim and clean the user prompt.
    Normalize,
    /// Ask the LLM for the search plan.
    GenerateQueries,
    /// Collect sources for every query.
    Research,
    /// Normalize collected source text into per-query notes.
    Process,
    /// Synthesize the draft report.
    Draft,
    /// Quality gate decision.
    Gate,
    /// Critique the draft and count the loop.
    Validate,
    /// Produce the final report.
    Finalize,
    /// Terminal state.
    Done,
}

impl Stage {
    /// Stable lowercase name used in logs and `error_log` entries.
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Normalize => "normalize",
            Stage::GenerateQueries => "generate_queries",
            Stage::Research => "research",
            Stage::Process => "process",
            Stage::Draft => "draft",
            Stage::Gate => "gate",
            Stage::Validate => "validate",
            Stage::Finalize => "finalize",
            Stage::Done => "done",
        }
    }

    /// Whether a failure in this stage aborts the run.
    ///
    /// Without a prompt or a query plan there is nothing to loop on, so only
    /// those two stages are fatal; every later failure is isolated.
    pub fn is_fatal_on_failure(self) -> bool {
        matches!(self, Stage::Normalize | Stage::GenerateQueries)
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
