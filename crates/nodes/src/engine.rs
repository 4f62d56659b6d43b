//! The workflow engine: drives one [`RunState`] through the stage sequence.
//!
//! ```text
//! Normalize -> GenerateQueries -> Research -> Process -> Draft -> Gate
//! Gate(continue) -> Validate -> Research -> Process -> Draft -> Gate
//! Gate(done)     -> Finalize -> Done
//! ```
//!
//! The loop re-enters at `Research`; the query plan is made once. Failures in
//! `Normalize` and `GenerateQueries` abort the run. Every later stage runs
//! inside a guard that turns failures (including panics) into `error_log`
//! entries and passes the state on.
//!
//! Cancellation is observed between stages only. A cancelled run with a draft
//! goes straight to `Finalize`; without a draft it ends with the error log as
//! its only output.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use futures::FutureExt;
use pipeline::{
    ContentNormalizer, GateDecision, GateReason, LlmGateway, QualityGate, ResearchError,
    RunState, SourceCollector, Stage, StageError, StageFailure,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, info_span, warn, Instrument};

use crate::stages::{self, StageOutcome};

/// Drives research runs against a fixed set of collaborators.
///
/// The engine holds no per-run state; one instance can execute any number of
/// runs, one after the other.
#[derive(Clone)]
pub struct WorkflowEngine {
    gateway: Arc<dyn LlmGateway>,
    collector: Arc<dyn SourceCollector>,
    normalizer: Arc<dyn ContentNormalizer>,
    gate: QualityGate,
}

impl WorkflowEngine {
    /// Creates an engine over the three collaborator capabilities.
    pub fn new(
        gateway: Arc<dyn LlmGateway>,
        collector: Arc<dyn SourceCollector>,
        normalizer: Arc<dyn ContentNormalizer>,
    ) -> Self {
        Self {
            gateway,
            collector,
            normalizer,
            gate: QualityGate::new(),
        }
    }

    /// Runs `state` to completion without external cancellation.
    ///
    /// # Errors
    ///
    /// See [`WorkflowEngine::run_with_cancellation`].
    pub async fn run(&self, state: RunState) -> Result<RunState, ResearchError> {
        self.run_with_cancellation(state, CancellationToken::new())
            .await
    }

    /// Runs `state` to completion, checking `cancel` at every stage boundary.
    ///
    /// Returns the final state. `final_report` is set unless the run was
    /// cancelled before a draft existed.
    ///
    /// # Errors
    ///
    /// - [`ResearchError::ConfigurationError`] for inconsistent bounds.
    /// - [`ResearchError::EmptyPrompt`] and [`ResearchError::QueryGeneration`]
    ///   from the two fatal stages.
    /// - [`ResearchError::InvariantViolation`] for engine bugs.
    pub async fn run_with_cancellation(
        &self,
        state: RunState,
        cancel: CancellationToken,
    ) -> Result<RunState, ResearchError> {
        let span = info_span!(
            "research_run",
            run_id = %state.run_id(),
            prompt_chars = state.original_prompt().chars().count(),
        );
        async move {
            let result = self.drive(state, &cancel).await;
            match &result {
                Ok(state) => info!(
                    loops = state.loop_count(),
                    queries = state.queries().len(),
                    sources = state.total_sources(),
                    errors = state.error_log().len(),
                    report = state.final_report().is_some(),
                    "run finished"
                ),
                Err(err) => error!(error = %err, "run failed"),
            }
            result
        }
        .instrument(span)
        .await
    }

    async fn drive(
        &self,
        mut state: RunState,
        cancel: &CancellationToken,
    ) -> Result<RunState, ResearchError> {
        state.config().validate()?;

        let mut stage = Stage::Normalize;
        let mut gate_evaluations: u32 = 0;
        let mut concern: Option<String> = None;

        loop {
            if cancel.is_cancelled() && !matches!(stage, Stage::Finalize | Stage::Done) {
                stage = on_cancel(&mut state, stage);
            }
            debug!(%stage, "entering stage");

            stage = match stage {
                Stage::Normalize => {
                    stages::normalize(&mut state)?;
                    Stage::GenerateQueries
                }
                Stage::GenerateQueries => {
                    stages::generate_queries(&mut state, self.gateway.as_ref()).await?;
                    Stage::Research
                }
                Stage::Research => {
                    state.begin_pass();
                    let failures =
                        guarded(Stage::Research, stages::research(&mut state, self.collector.as_ref()))
                            .await?;
                    record(&mut state, failures);
                    Stage::Process
                }
                Stage::Process => {
                    let failures =
                        guarded(Stage::Process, stages::process(&mut state, self.normalizer.as_ref()))
                            .await?;
                    record(&mut state, failures);
                    Stage::Draft
                }
                Stage::Draft => {
                    let failures =
                        guarded(Stage::Draft, stages::draft(&mut state, self.gateway.as_ref()))
                            .await?;
                    record(&mut state, failures);
                    Stage::Gate
                }
                Stage::Gate => {
                    gate_evaluations += 1;
                    check_gate_limit(gate_evaluations, &state)?;
                    let decision = self.gate.decide(&mut state);
                    info!(
                        loop_count = state.loop_count(),
                        done = decision.is_done(),
                        "quality gate decided"
                    );
                    concern = gate_concern(&decision);
                    if decision.is_done() {
                        Stage::Finalize
                    } else {
                        Stage::Validate
                    }
                }
                Stage::Validate => {
                    let failures = guarded(
                        Stage::Validate,
                        stages::validate(&mut state, self.gateway.as_ref(), concern.as_deref()),
                    )
                    .await?;
                    record(&mut state, failures);
                    Stage::Research
                }
                Stage::Finalize => {
                    stages::finalize(&mut state);
                    Stage::Done
                }
                Stage::Done => return Ok(state),
            };
        }
    }
}

/// Routes a cancelled run: finalize what exists, or stop if there is no draft.
fn on_cancel(state: &mut RunState, next: Stage) -> Stage {
    if state.draft_report().is_some() {
        warn!(%next, "run cancelled, finalizing the current draft");
        state.record_error(format!("run cancelled before {next}; report reflects partial work"));
        Stage::Finalize
    } else {
        warn!(%next, "run cancelled before a draft existed");
        state.record_error(format!("run cancelled before {next}; no draft was available"));
        Stage::Done
    }
}

/// The gate may run at most `max_loops + 1` times and never with
/// `loop_count > max_loops`. Either breach is an engine bug.
fn check_gate_limit(evaluations: u32, state: &RunState) -> Result<(), ResearchError> {
    let max = state.config().loops.max;
    if evaluations > max.saturating_add(1) {
        return Err(ResearchError::InvariantViolation {
            message: format!(
                "quality gate evaluated {evaluations} times, limit is max_loops + 1 = {}",
                max.saturating_add(1)
            ),
        });
    }
    if state.loop_count() > max {
        return Err(ResearchError::InvariantViolation {
            message: format!(
                "loop_count {} exceeds max_loops {max} at the quality gate",
                state.loop_count()
            ),
        });
    }
    Ok(())
}

fn gate_concern(decision: &GateDecision) -> Option<String> {
    match decision.reason() {
        GateReason::HeuristicFailed(failure) => Some(failure.to_string()),
        _ => None,
    }
}

/// Runs a recoverable stage, converting a panic into an isolated failure.
async fn guarded<F>(stage: Stage, future: F) -> StageOutcome
where
    F: Future<Output = StageOutcome>,
{
    match AssertUnwindSafe(future).catch_unwind().await {
        Ok(outcome) => outcome,
        Err(panic) => {
            let message = panic_message(panic.as_ref());
            error!(%stage, %message, "stage panicked");
            Ok(vec![StageError::new(stage, StageFailure::Panicked(message))])
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_string())
}

fn record(state: &mut RunState, failures: Vec<StageError>) {
    for failure in failures {
        state.record_error(failure);
    }
}
