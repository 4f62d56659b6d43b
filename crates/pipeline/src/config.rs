//! Run configuration handed to the engine at run start.
//!
//! The composition root (the CLI) builds a [`RunConfig`] from its config file
//! and flags; the engine calls [`RunConfig::validate`] before the first stage
//! and never re-reads configuration afterwards.

use serde::{Deserialize, Serialize};

use crate::{Language, ModelName, ResearchError};

/// Inclusive bounds on the number of validation loops.
///
/// `min` loops are unconditional; `max` is a hard ceiling independent of
/// draft quality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopBounds {
    /// Loops that always run, whatever the quality heuristics say.
    pub min: u32,
    /// Loops after which the run is finalized regardless of quality.
    pub max: u32,
}

impl Default for LoopBounds {
    fn default() -> Self {
        Self { min: 1, max: 3 }
    }
}

/// Per-query bounds on the number of collected sources.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceBounds {
    /// Sources a query needs for the coverage heuristic to pass.
    pub min: usize,
    /// Upper limit requested from the source collector. Zero disables
    /// searching: every query gets an empty result list.
    pub max: usize,
}

impl Default for SourceBounds {
    fn default() -> Self {
        Self { min: 3, max: 8 }
    }
}

/// Tunable thresholds for the draft-sufficiency heuristic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityThresholds {
    /// Minimum draft length in characters (after trimming).
    pub min_draft_chars: usize,
    /// Section titles that must each appear in a markdown heading of the
    /// draft. Matching is case-insensitive and substring-based.
    pub required_sections: Vec<String>,
}

impl Default for QualityThresholds {
    fn default() -> Self {
        Self {
            min_draft_chars: 400,
            required_sections: Vec::new(),
        }
    }
}

/// Everything the engine needs to know about a run besides the prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    /// Language for queries and the report.
    pub language: Language,
    /// Maximum number of search queries kept from the plan.
    pub max_queries: usize,
    /// Validation loop bounds.
    pub loops: LoopBounds,
    /// Per-query source bounds.
    pub sources: SourceBounds,
    /// Draft-sufficiency thresholds.
    pub quality: QualityThresholds,
    /// Model used for the run; informational, echoed in the report metadata.
    pub model: Option<ModelName>,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            language: Language::default(),
            max_queries: 5,
            loops: LoopBounds::default(),
            sources: SourceBounds::default(),
            quality: QualityThresholds::default(),
            model: None,
        }
    }
}

impl RunConfig {
    /// Checks the cross-field invariants of the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ResearchError::ConfigurationError`] when `min_loops > max_loops`,
    /// `min_sources > max_sources`, or `max_queries == 0`.
    pub fn validate(&self) -> Result<(), ResearchError> {
        let fail = |message: String| Err(ResearchError::ConfigurationError { message });

        if self.loops.min > self.loops.max {
            return fail(format!(
                "min_loops ({}) must not exceed max_loops ({})",
                self.loops.min, self.loops.max
            ));
        }
        if self.sources.min > self.sources.max {
            return fail(format!(
                "min_sources ({}) must not exceed max_sources ({})",
                self.sources.min, self.sources.max
            ));
        }
        if self.max_queries == 0 {
            return fail("max_queries must be at least 1".to_string());
        }
        Ok(())
    }
}
