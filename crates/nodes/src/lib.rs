//! Research workflow stages and the engine that sequences them.
//!
//! This crate provides the seven stage functions (normalize through finalize),
//! the defensive parsers for free-text LLM output, the prompt builders, and
//! the [`WorkflowEngine`] that drives the stage loop and applies the quality
//! gate.
//!
//! ## Architectural Layer
//!
//! **Orchestration layer.** Stages sequence calls between the domain rules in
//! the [`pipeline`] crate and the collaborator ports (LLM gateway, source
//! collector, content normalizer). They contain no transport details.

pub mod engine;
pub mod parse;
pub mod prompts;
pub mod stages;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

pub use engine::WorkflowEngine;
pub use tokio_util::sync::CancellationToken;
pub use parse::{parse_query_list, parse_review, strip_reasoning, Review};
pub use stages::compose_final_report;
