//! Persisted task queue for batch research runs.
//!
//! Prompts are queued with [`TaskQueue::add`] and executed later, strictly one
//! after the other, by [`TaskQueue::run_pending`]. Every status transition is
//! written to the queue file before the next step starts, so a crash loses at
//! most the run that was in flight.
//!
//! ```text
//! scheduled ──▶ running ──▶ done
//!     ▲            │
//!     │            └──────▶ failed ──(reset_failed)──┐
//!     └──────────────────────────────────────────────┘
//! ```
//!
//! A task found in `running` when the file is loaded was interrupted by a
//! crash and is treated as `scheduled` again.
//!
//! ## Architectural Layer
//!
//! **Infrastructure.** The queue knows nothing about research runs; the
//! composition root supplies the closure that executes one task.
//!
//! ## Module Organisation
//!
//! | Module | Contents |
//! |--------|----------|
//! | [`task`] | [`TaskId`], [`TaskStatus`], [`TaskRecord`] |
//! | [`queue`] | [`TaskQueue`] and [`QueueRunSummary`] |
//! | [`errors`] | [`QueueError`] |

pub mod errors;
pub mod queue;
pub mod task;

pub use errors::QueueError;
pub use queue::{QueueRunSummary, TaskOutcome, TaskQueue};
pub use task::{TaskId, TaskRecord, TaskStatus};
