//! Core domain of the local research agent.
//!
//! This crate contains the run state, the quality gate, every newtype
//! identifier and shared value type, the error taxonomy, and the collaborator
//! port traits. Infrastructure crates implement the traits defined here; they
//! never add domain rules.
//!
//! ## Architectural Layer
//!
//! **Business logic + port definitions.** This crate has no I/O dependencies.
//! It defines *what* is needed; infrastructure crates define *how* to supply it.
//!
//! ## Module Layout
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`identifiers`] | Newtype identifiers (`RunId`, `Language`, `ModelName`) |
//! | [`types`] | Shared value types (`SourceRecord`, `ChatMessage`, `Stage`, `Timestamp`) |
//! | [`config`] | Run configuration and its validation |
//! | [`state`] | `RunState`, the aggregate threaded through every stage |
//! | [`gate`] | The quality gate |
//! | [`ports`] | `LlmGateway`, `SourceCollector`, `ContentNormalizer` |
//! | [`errors`] | Run-level, collaborator, and stage error types; retry policy |

pub mod config;
pub mod errors;
pub mod gate;
pub mod identifiers;
pub mod ports;
pub mod state;
pub mod types;

// Re-export everything at the crate root for ergonomic usage by downstream crates.
pub use config::{LoopBounds, QualityThresholds, RunConfig, SourceBounds};
pub use errors::{
    CollectorError, GatewayError, NormalizerError, ResearchError, RetryPolicy, StageError,
    StageFailure,
};
pub use gate::{GateDecision, GateReason, HeuristicFailure, QualityGate};
pub use identifiers::{Language, ModelName, RunId};
pub use ports::{ContentNormalizer, LlmGateway, SourceCollector};
pub use state::RunState;
pub use types::{ChatMessage, ChatRole, SourceRecord, Stage, Timestamp};
