//! The mutable aggregate threaded through every stage of one research run.
//!
//! Fields are private; each mutator enforces one of the lifecycle rules:
//!
//! - `normalized_prompt` and `queries` are written once.
//! - `query_results` entries are overwritten per pass, never appended to.
//! - `processed_notes` is cleared at the start of every process pass and only
//!   holds keys present in `queries`.
//! - `error_log` is append-only.
//! - `final_report` is written once, by finalize.
//! - `validation_complete` is written only by the quality gate.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{ResearchError, RunConfig, RunId, SourceRecord};

/// State of one research run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunState {
    run_id: RunId,
    original_prompt: String,
    config: RunConfig,
    normalized_prompt: Option<String>,
    queries: Vec<String>,
    query_results: BTreeMap<String, Vec<SourceRecord>>,
    processed_notes: BTreeMap<String, String>,
    draft_report: Option<String>,
    critique: Option<String>,
    loop_count: u32,
    validation_complete: bool,
    error_log: Vec<String>,
    pass_error_mark: usize,
    final_report: Option<String>,
}

impl RunState {
    /// Creates the initial state: only the prompt and configuration are set.
    pub fn new(original_prompt: impl Into<String>, config: RunConfig) -> Self {
        Self::with_run_id(RunId::new_random(), original_prompt, config)
    }

    /// Creates the initial state with a caller-chosen run id.
    pub fn with_run_id(run_id: RunId, original_prompt: impl Into<String>, config: RunConfig) -> Self {
        Self {
            run_id,
            original_prompt: original_prompt.into(),
            config,
            normalized_prompt: None,
            queries: Vec::new(),
            query_results: BTreeMap::new(),
            processed_notes: BTreeMap::new(),
            draft_report: None,
            critique: None,
            loop_count: 0,
            validation_complete: false,
            error_log: Vec::new(),
            pass_error_mark: 0,
            final_report: None,
        }
    }

    // -----------------------------------------------------------------------
    // Read access
    // -----------------------------------------------------------------------

    pub fn run_id(&self) -> RunId {
        self.run_id
    }

    pub fn original_prompt(&self) -> &str {
        &self.original_prompt
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn normalized_prompt(&self) -> Option<&str> {
        self.normalized_prompt.as_deref()
    }

    pub fn queries(&self) -> &[String] {
        &self.queries
    }

    pub fn query_results(&self) -> &BTreeMap<String, Vec<SourceRecord>> {
        &self.query_results
    }

    /// Sources collected for `query` in the latest pass; empty if none.
    pub fn sources_for(&self, query: &str) -> &[SourceRecord] {
        self.query_results
            .get(query)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Total number of sources across all queries.
    pub fn total_sources(&self) -> usize {
        self.query_results.values().map(Vec::len).sum()
    }

    pub fn processed_notes(&self) -> &BTreeMap<String, String> {
        &self.processed_notes
    }

    pub fn draft_report(&self) -> Option<&str> {
        self.draft_report.as_deref()
    }

    /// Reviewer feedback from the latest successful validate pass.
    pub fn critique(&self) -> Option<&str> {
        self.critique.as_deref()
    }

    pub fn loop_count(&self) -> u32 {
        self.loop_count
    }

    pub fn validation_complete(&self) -> bool {
        self.validation_complete
    }

    pub fn error_log(&self) -> &[String] {
        &self.error_log
    }

    /// Errors appended since the current pass began.
    pub fn errors_this_pass(&self) -> &[String] {
        &self.error_log[self.pass_error_mark.min(self.error_log.len())..]
    }

    pub fn final_report(&self) -> Option<&str> {
        self.final_report.as_deref()
    }

    // -----------------------------------------------------------------------
    // Mutation
    // -----------------------------------------------------------------------

    /// Records the normalized prompt.
    ///
    /// # Errors
    ///
    /// [`ResearchError::InvariantViolation`] if it was already set.
    pub fn set_normalized_prompt(&mut self, prompt: String) -> Result<(), ResearchError> {
        if self.normalized_prompt.is_some() {
            return Err(invariant("normalized_prompt is write-once"));
        }
        self.normalized_prompt = Some(prompt);
        Ok(())
    }

    /// Records the query plan.
    ///
    /// # Errors
    ///
    /// [`ResearchError::InvariantViolation`] if a plan was already recorded.
    pub fn set_queries(&mut self, queries: Vec<String>) -> Result<(), ResearchError> {
        if !self.queries.is_empty() {
            return Err(invariant("queries are write-once"));
        }
        self.queries = queries;
        Ok(())
    }

    /// Marks the start of a research pass: errors logged from here on count
    /// as "open" for the quality gate.
    pub fn begin_pass(&mut self) {
        self.pass_error_mark = self.error_log.len();
    }

    /// Replaces the sources for `query` with this pass's results.
    ///
    /// # Errors
    ///
    /// [`ResearchError::InvariantViolation`] if `query` is not part of the plan.
    pub fn store_sources(
        &mut self,
        query: &str,
        sources: Vec<SourceRecord>,
    ) -> Result<(), ResearchError> {
        self.ensure_planned(query)?;
        self.query_results.insert(query.to_string(), sources);
        Ok(())
    }

    /// Drops every note from the previous pass.
    pub fn clear_notes(&mut self) {
        self.processed_notes.clear();
    }

    /// Stores the processed note for `query`.
    ///
    /// # Errors
    ///
    /// [`ResearchError::InvariantViolation`] if `query` is not part of the plan.
    pub fn store_note(&mut self, query: &str, note: String) -> Result<(), ResearchError> {
        self.ensure_planned(query)?;
        self.processed_notes.insert(query.to_string(), note);
        Ok(())
    }

    /// Overwrites the draft report.
    pub fn set_draft(&mut self, draft: String) {
        self.draft_report = Some(draft);
    }

    /// Stores reviewer feedback for the next draft pass.
    pub fn set_critique(&mut self, critique: String) {
        self.critique = Some(critique);
    }

    /// Counts one validation attempt, successful or not.
    pub fn record_loop(&mut self) {
        self.loop_count += 1;
    }

    /// Appends a line to the error log.
    pub fn record_error(&mut self, entry: impl std::fmt::Display) {
        self.error_log.push(entry.to_string());
    }

    /// Sets the final report.
    ///
    /// Returns `false` (and leaves the existing report untouched) if a final
    /// report was already produced.
    pub fn set_final_report(&mut self, report: String) -> bool {
        if self.final_report.is_some() {
            return false;
        }
        self.final_report = Some(report);
        true
    }

    /// Only the quality gate routes the run.
    pub(crate) fn set_validation_complete(&mut self, complete: bool) {
        self.validation_complete = complete;
    }

    fn ensure_planned(&self, query: &str) -> Result<(), ResearchError> {
        if self.queries.iter().any(|q| q == query) {
            Ok(())
        } else {
            Err(invariant(format!("query '{query}' is not part of the plan")))
        }
    }
}

fn invariant(message: impl Into<String>) -> ResearchError {
    ResearchError::InvariantViolation {
        message: message.into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Timestamp;

    fn planned_state(queries: &[&str]) -> RunState {
        let mut state = RunState::new("prompt", RunConfig::default());
        state
            .set_queries(queries.iter().map(|q| q.to_string()).collect())
            .unwrap();
        state
    }

    fn sources(n: usize) -> Vec<SourceRecord> {
        (0..n)
            .map(|i| SourceRecord::new(format!("https://e.x/{i}"), "t", "c", Timestamp::now()))
            .collect()
    }

    #[test]
    fn new_state_has_only_prompt_and_config() {
        let state = RunState::new("  explain X ", RunConfig::default());
        assert_eq!(state.original_prompt(), "  explain X ");
        assert!(state.normalized_prompt().is_none());
        assert!(state.queries().is_empty());
        assert!(state.draft_report().is_none());
        assert!(state.final_report().is_none());
        assert_eq!(state.loop_count(), 0);
        assert!(!state.validation_complete());
    }

    #[test]
    fn write_once_fields_reject_second_write() {
        let mut state = planned_state(&["a"]);
        assert!(state.set_queries(vec!["b".into()]).is_err());
        state.set_normalized_prompt("p".into()).unwrap();
        assert!(state.set_normalized_prompt("q".into()).is_err());
    }

    #[test]
    fn sources_are_overwritten_per_pass() {
        let mut state = planned_state(&["a"]);
        state.store_sources("a", sources(3)).unwrap();
        state.store_sources("a", sources(1)).unwrap();
        assert_eq!(state.sources_for("a").len(), 1);
        assert_eq!(state.total_sources(), 1);
    }

    #[test]
    fn unplanned_queries_are_rejected() {
        let mut state = planned_state(&["a"]);
        assert!(state.store_sources("b", sources(1)).is_err());
        assert!(state.store_note("b", "note".into()).is_err());
    }

    #[test]
    fn errors_this_pass_only_sees_new_entries() {
        let mut state = planned_state(&["a"]);
        state.record_error("old");
        state.begin_pass();
        assert!(state.errors_this_pass().is_empty());
        state.record_error("new");
        assert_eq!(state.errors_this_pass().to_vec(), vec!["new".to_string()]);
        assert_eq!(state.error_log().len(), 2);
    }

    #[test]
    fn final_report_is_never_replaced() {
        let mut state = planned_state(&["a"]);
        assert!(state.set_final_report("first".into()));
        assert!(!state.set_final_report("second".into()));
        assert_eq!(state.final_report(), Some("first"));
    }
}
