//! The seven stage functions of the research workflow.
//!
//! Every stage receives the run state by mutable reference from the engine,
//! which owns it for the whole run. Stages touch nothing but the state and
//! the one collaborator they are handed.
//!
//! Two result shapes are used:
//!
//! - `normalize` and `generate_queries` return `Result<(), ResearchError>`;
//!   any error is fatal.
//! - The looping stages return a [`StageOutcome`]: the outer `Err` is reserved
//!   for internal invariant violations, the inner list carries isolated
//!   failures that the engine appends to the error log.
//!
//! `finalize` cannot fail.

mod draft;
mod finalize;
mod normalize;
mod process;
mod queries;
mod research;
mod validate;

pub use draft::draft;
pub use finalize::{compose_final_report, finalize};
pub use normalize::{clean_prompt, normalize};
pub use process::process;
pub use queries::generate_queries;
pub use research::research;
pub use validate::validate;

use pipeline::{ResearchError, StageError};

/// Result of a recoverable stage: isolated failures, or a fatal invariant break.
pub type StageOutcome = Result<Vec<StageError>, ResearchError>;
