//! The quality gate: decides after every draft whether the run loops back into
//! research or proceeds to finalize.
//!
//! The hard loop bounds are checked before any heuristic, so a misbehaving
//! heuristic can neither loop forever nor stop a run short of `min_loops`:
//!
//! 1. `loop_count < min_loops` ⇒ continue.
//! 2. `loop_count >= max_loops` ⇒ done.
//! 3. Heuristics, first failure wins ⇒ continue:
//!    coverage, draft sufficiency, no open errors in this pass.
//! 4. Otherwise ⇒ done.

use tracing::debug;

use crate::RunState;

// ---------------------------------------------------------------------------
// Decision types
// ---------------------------------------------------------------------------

/// A quality heuristic that did not hold for the current pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeuristicFailure {
    /// A query has fewer sources than `min_sources`.
    Coverage {
        /// The under-covered query.
        query: String,
        /// Sources collected in this pass.
        found: usize,
        /// Configured minimum.
        required: usize,
    },
    /// No draft exists.
    DraftMissing,
    /// The draft is shorter than `min_draft_chars`.
    DraftTooShort {
        /// Length of the trimmed draft in characters.
        chars: usize,
        /// Configured minimum.
        required: usize,
    },
    /// A required section has no matching heading in the draft.
    SectionMissing {
        /// The configured section title.
        section: String,
    },
    /// Research, process or draft logged errors during this pass.
    OpenErrors {
        /// Number of entries appended since the pass began.
        count: usize,
    },
}

impl std::fmt::Display for HeuristicFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HeuristicFailure::Coverage {
                query,
                found,
                required,
            } => write!(
                f,
                "coverage: query '{query}' has {found} of {required} required sources"
            ),
            HeuristicFailure::DraftMissing => f.write_str("draft sufficiency: no draft report"),
            HeuristicFailure::DraftTooShort { chars, required } => write!(
                f,
                "draft sufficiency: draft has {chars} characters, {required} required"
            ),
            HeuristicFailure::SectionMissing { section } => {
                write!(f, "draft sufficiency: section '{section}' is missing")
            }
            HeuristicFailure::OpenErrors { count } => {
                write!(f, "open errors: {count} error(s) logged during this pass")
            }
        }
    }
}

/// Why the gate decided the way it did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateReason {
    /// Fewer than `min_loops` loops have run.
    BelowMinimumLoops {
        /// Loops completed so far.
        loop_count: u32,
        /// Configured minimum.
        min: u32,
    },
    /// `max_loops` reached; the run stops whatever the heuristics say.
    MaximumLoopsReached {
        /// Loops completed so far.
        loop_count: u32,
        /// Configured maximum.
        max: u32,
        /// First heuristic still failing at the ceiling, if any.
        unmet: Option<HeuristicFailure>,
    },
    /// A heuristic failed between the bounds.
    HeuristicFailed(HeuristicFailure),
    /// Every heuristic held.
    AllHeuristicsPassed,
}

/// Routing decision of the quality gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// Loop back into research.
    Continue(GateReason),
    /// Proceed to finalize.
    Done(GateReason),
}

impl GateDecision {
    /// Returns `true` for [`GateDecision::Done`].
    pub fn is_done(&self) -> bool {
        matches!(self, GateDecision::Done(_))
    }

    /// The reason behind the decision.
    pub fn reason(&self) -> &GateReason {
        match self {
            GateDecision::Continue(reason) | GateDecision::Done(reason) => reason,
        }
    }
}

// ---------------------------------------------------------------------------
// Gate
// ---------------------------------------------------------------------------

/// The quality gate. Thresholds come from the run's [`crate::RunConfig`].
#[derive(Debug, Clone, Copy, Default)]
pub struct QualityGate;

impl QualityGate {
    /// Creates the gate.
    pub fn new() -> Self {
        Self
    }

    /// Pure decision over `state`. Does not touch the state.
    pub fn evaluate(&self, state: &RunState) -> GateDecision {
        let loops = state.config().loops;
        let loop_count = state.loop_count();

        if loop_count < loops.min {
            return GateDecision::Continue(GateReason::BelowMinimumLoops {
                loop_count,
                min: loops.min,
            });
        }
        if loop_count >= loops.max {
            return GateDecision::Done(GateReason::MaximumLoopsReached {
                loop_count,
                max: loops.max,
                unmet: self.first_failing_heuristic(state),
            });
        }
        match self.first_failing_heuristic(state) {
            Some(failure) => GateDecision::Continue(GateReason::HeuristicFailed(failure)),
            None => GateDecision::Done(GateReason::AllHeuristicsPassed),
        }
    }

    /// Evaluates the gate and applies the decision to `state`.
    ///
    /// This is the only writer of `validation_complete`. Heuristic failures,
    /// including one left unmet when the loop ceiling forces completion, are
    /// appended to the error log.
    pub fn decide(&self, state: &mut RunState) -> GateDecision {
        let decision = self.evaluate(state);
        debug!(
            loop_count = state.loop_count(),
            done = decision.is_done(),
            reason = ?decision.reason(),
            "quality gate evaluated"
        );

        match decision.reason() {
            GateReason::HeuristicFailed(failure) => {
                state.record_error(format!("quality gate: {failure}"));
            }
            GateReason::MaximumLoopsReached {
                max,
                unmet: Some(failure),
                ..
            } => {
                state.record_error(format!(
                    "quality gate: maximum of {max} loop(s) reached with unmet check: {failure}"
                ));
            }
            _ => {}
        }
        state.set_validation_complete(decision.is_done());
        decision
    }

    fn first_failing_heuristic(&self, state: &RunState) -> Option<HeuristicFailure> {
        check_coverage(state)
            .or_else(|| check_draft(state))
            .or_else(|| check_open_errors(state))
    }
}

// ---------------------------------------------------------------------------
// Heuristics
// ---------------------------------------------------------------------------

fn check_coverage(state: &RunState) -> Option<HeuristicFailure> {
    let required = state.config().sources.min;
    state.queries().iter().find_map(|query| {
        let found = state.sources_for(query).len();
        (found < required).then(|| HeuristicFailure::Coverage {
            query: query.clone(),
            found,
            required,
        })
    })
}

fn check_draft(state: &RunState) -> Option<HeuristicFailure> {
    let Some(draft) = state.draft_report() else {
        return Some(HeuristicFailure::DraftMissing);
    };
    let quality = &state.config().quality;

    let chars = draft.trim().chars().count();
    if chars < quality.min_draft_chars {
        return Some(HeuristicFailure::DraftTooShort {
            chars,
            required: quality.min_draft_chars,
        });
    }

    let headings: Vec<String> = draft
        .lines()
        .map(str::trim_start)
        .filter(|line| line.starts_with('#'))
        .map(str::to_lowercase)
        .collect();
    quality
        .required_sections
        .iter()
        .find(|section| {
            let wanted = section.to_lowercase();
            !headings.iter().any(|heading| heading.contains(&wanted))
        })
        .map(|section| HeuristicFailure::SectionMissing {
            section: section.clone(),
        })
}

fn check_open_errors(state: &RunState) -> Option<HeuristicFailure> {
    let count = state.errors_this_pass().len();
    (count > 0).then_some(HeuristicFailure::OpenErrors { count })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{LoopBounds, QualityThresholds, RunConfig, SourceBounds, SourceRecord, Timestamp};

    fn config(min_loops: u32, max_loops: u32) -> RunConfig {
        RunConfig {
            loops: LoopBounds {
                min: min_loops,
                max: max_loops,
            },
            sources: SourceBounds { min: 2, max: 5 },
            quality: QualityThresholds {
                min_draft_chars: 20,
                required_sections: vec!["Summary".into()],
            },
            ..RunConfig::default()
        }
    }

    /// A state that passes every heuristic.
    fn healthy_state(min_loops: u32, max_loops: u32) -> RunState {
        let mut state = RunState::new("prompt", config(min_loops, max_loops));
        state.set_queries(vec!["a".into(), "b".into()]).unwrap();
        for query in ["a", "b"] {
            let sources = (0..2)
                .map(|i| SourceRecord::new(format!("https://{query}/{i}"), "t", "c", Timestamp::now()))
                .collect();
            state.store_sources(query, sources).unwrap();
        }
        state.set_draft("# Summary\n\nA sufficiently long draft body.".into());
        state.begin_pass();
        state
    }

    #[test]
    fn minimum_loops_are_unconditional() {
        let state = healthy_state(2, 3);
        let decision = QualityGate::new().evaluate(&state);
        assert_eq!(
            decision,
            GateDecision::Continue(GateReason::BelowMinimumLoops {
                loop_count: 0,
                min: 2
            })
        );
    }

    #[test]
    fn maximum_loops_is_a_hard_ceiling() {
        let mut state = healthy_state(0, 1);
        state.record_loop();
        state.record_error("research failed");
        let decision = QualityGate::new().evaluate(&state);
        assert!(decision.is_done());
        assert!(matches!(
            decision.reason(),
            GateReason::MaximumLoopsReached {
                unmet: Some(HeuristicFailure::OpenErrors { count: 1 }),
                ..
            }
        ));
    }

    #[test]
    fn zero_max_loops_finishes_immediately() {
        let state = RunState::new("prompt", config(0, 0));
        assert!(QualityGate::new().evaluate(&state).is_done());
    }

    #[test]
    fn healthy_state_between_bounds_is_done() {
        let state = healthy_state(0, 3);
        assert_eq!(
            QualityGate::new().evaluate(&state),
            GateDecision::Done(GateReason::AllHeuristicsPassed)
        );
    }

    #[test]
    fn coverage_is_checked_first() {
        let mut state = healthy_state(0, 3);
        state.store_sources("b", Vec::new()).unwrap();
        state.record_error("unrelated");
        let decision = QualityGate::new().evaluate(&state);
        assert_eq!(
            decision,
            GateDecision::Continue(GateReason::HeuristicFailed(HeuristicFailure::Coverage {
                query: "b".into(),
                found: 0,
                required: 2,
            }))
        );
    }

    #[test]
    fn short_or_sectionless_drafts_fail() {
        let mut state = healthy_state(0, 3);
        state.set_draft("tiny".into());
        assert!(matches!(
            QualityGate::new().evaluate(&state).reason(),
            GateReason::HeuristicFailed(HeuristicFailure::DraftTooShort { chars: 4, .. })
        ));

        state.set_draft("# Findings\n\nPlenty of text but no summary heading.".into());
        assert!(matches!(
            QualityGate::new().evaluate(&state).reason(),
            GateReason::HeuristicFailed(HeuristicFailure::SectionMissing { .. })
        ));
    }

    #[test]
    fn only_errors_from_this_pass_are_open() {
        let mut state = healthy_state(0, 3);
        state.record_error("from this pass");
        assert!(!QualityGate::new().evaluate(&state).is_done());

        state.begin_pass();
        assert!(QualityGate::new().evaluate(&state).is_done());
    }

    #[test]
    fn decide_routes_and_logs_failures() {
        let mut state = healthy_state(0, 3);
        state.set_draft("tiny".into());
        let decision = QualityGate::new().decide(&mut state);
        assert!(!decision.is_done());
        assert!(!state.validation_complete());
        assert_eq!(state.error_log().len(), 1);
        assert!(state.error_log()[0].starts_with("quality gate: draft sufficiency"));

        state.set_draft("# Summary\n\nA sufficiently long draft body.".into());
        state.begin_pass();
        assert!(QualityGate::new().decide(&mut state).is_done());
        assert!(state.validation_complete());
        assert_eq!(state.error_log().len(), 1);
    }
}
