use pipeline::{GatewayError, LlmGateway, RunState, Stage, StageError, StageFailure};
use tracing::{info, warn};

use super::StageOutcome;
use crate::parse::parse_review;
use crate::prompts;

/// Critiques the current draft and counts one validation loop.
///
/// `loop_count` is incremented before anything else, so a failed critique
/// still advances the loop and the run still terminates. On success the
/// critique is kept for the next draft pass and, if the model supplied one,
/// the revised report replaces the draft. The next draft pass revises that
/// draft instead of starting from scratch.
///
/// `concern` is the quality gate's reason for requesting another loop.
pub async fn validate(
    state: &mut RunState,
    gateway: &dyn LlmGateway,
    concern: Option<&str>,
) -> StageOutcome {
    state.record_loop();
    let loop_count = state.loop_count();

    let Some(current) = state.draft_report() else {
        warn!(loop_count, "no draft to critique");
        return Ok(vec![StageError::new(
            Stage::Validate,
            StageFailure::MissingInput("no draft report to critique".to_string()),
        )]);
    };
    let prompt = state.normalized_prompt().unwrap_or(state.original_prompt());
    let messages = prompts::review(prompt, &state.config().language, current, concern);

    let raw = match gateway.generate(&messages).await {
        Ok(raw) => raw,
        Err(err) => {
            warn!(loop_count, error = %err, "critique failed");
            return Ok(vec![StageError::new(Stage::Validate, err)]);
        }
    };

    let Some(review) = parse_review(&raw) else {
        warn!(loop_count, "critique response was empty");
        return Ok(vec![StageError::new(
            Stage::Validate,
            GatewayError::MalformedResponse {
                message: "critique response contained no feedback".to_string(),
            },
        )]);
    };

    let revised = review.revised_report.is_some();
    if let Some(report) = review.revised_report {
        state.set_draft(report);
    }
    state.set_critique(review.critique);
    info!(loop_count, revised, "draft reviewed");
    Ok(Vec::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parse::REVISED_REPORT_MARKER;
    use crate::test_support::{planned_state, ScriptedLlm};
    use pipeline::RunConfig;

    #[tokio::test]
    async fn failed_critique_still_counts_the_loop() {
        let mut state = planned_state(&["A"], RunConfig::default());
        state.set_draft("draft".into());
        let llm = ScriptedLlm::failing(GatewayError::Timeout);

        let failures = validate(&mut state, &llm, None).await.unwrap();

        assert_eq!(state.loop_count(), 1);
        assert_eq!(failures.len(), 1);
        assert_eq!(state.draft_report(), Some("draft"));
        assert!(state.critique().is_none());
    }

    #[tokio::test]
    async fn revised_report_replaces_the_draft() {
        let mut state = planned_state(&["A"], RunConfig::default());
        state.set_draft("draft".into());
        let llm = ScriptedLlm::always(format!(
            "- add numbers\n{REVISED_REPORT_MARKER}\n# Better draft"
        ));

        let failures = validate(&mut state, &llm, Some("coverage is thin"))
            .await
            .unwrap();

        assert!(failures.is_empty());
        assert_eq!(state.draft_report(), Some("# Better draft"));
        assert_eq!(state.critique(), Some("- add numbers"));
        assert!(llm.requests()[0][1].content.contains("coverage is thin"));
    }

    #[tokio::test]
    async fn critique_without_revision_keeps_the_draft() {
        let mut state = planned_state(&["A"], RunConfig::default());
        state.set_draft("draft".into());
        let llm = ScriptedLlm::always("needs a summary");

        validate(&mut state, &llm, None).await.unwrap();
        assert_eq!(state.draft_report(), Some("draft"));
        assert_eq!(state.critique(), Some("needs a summary"));
    }

    #[tokio::test]
    async fn missing_draft_is_an_isolated_failure() {
        let mut state = planned_state(&["A"], RunConfig::default());
        let llm = ScriptedLlm::always("unused");

        let failures = validate(&mut state, &llm, None).await.unwrap();
        assert_eq!(state.loop_count(), 1);
        assert_eq!(failures.len(), 1);
        assert!(llm.requests().is_empty());
    }
}
