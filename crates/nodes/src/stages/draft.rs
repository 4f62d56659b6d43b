use pipeline::{LlmGateway, RunState, Stage, StageError};
use tracing::{info, warn};

use super::StageOutcome;
use crate::prompts::{self, QueryEvidence};

/// Synthesizes the draft report from the processed notes.
///
/// Each query's note is sent with the URLs of its sources. When a draft
/// already exists (from an earlier pass, possibly revised by `validate`) it
/// is sent as the base to revise. The response is stored verbatim and
/// replaces the draft. On gateway failure the previous draft (if any) is
/// left in place.
pub async fn draft(state: &mut RunState, gateway: &dyn LlmGateway) -> StageOutcome {
    let prompt = state.normalized_prompt().unwrap_or(state.original_prompt());
    let evidence: Vec<QueryEvidence<'_>> = state
        .queries()
        .iter()
        .filter_map(|query| {
            state.processed_notes().get(query).map(|note| QueryEvidence {
                query,
                note,
                sources: state.sources_for(query),
            })
        })
        .collect();
    let messages = prompts::draft(
        prompt,
        &state.config().language,
        &evidence,
        state.draft_report(),
        state.critique(),
    );
    let notes = evidence.len();

    match gateway.generate(&messages).await {
        Ok(report) => {
            info!(chars = report.chars().count(), notes, "draft written");
            state.set_draft(report);
            Ok(Vec::new())
        }
        Err(err) => {
            warn!(error = %err, kept_previous = state.draft_report().is_some(), "draft failed");
            Ok(vec![StageError::new(Stage::Draft, err)])
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{planned_state, sources, ScriptedLlm};
    use pipeline::{GatewayError, RunConfig};

    #[tokio::test]
    async fn draft_is_stored_verbatim() {
        let mut state = planned_state(&["A"], RunConfig::default());
        state.store_note("A", "note about A".into()).unwrap();
        let llm = ScriptedLlm::always("  # Report\n\n<think>x</think> body ");

        let failures = draft(&mut state, &llm).await.unwrap();

        assert!(failures.is_empty());
        assert_eq!(
            state.draft_report(),
            Some("  # Report\n\n<think>x</think> body ")
        );
        let sent = llm.requests();
        assert!(sent[0][1].content.contains("note about A"));
    }

    #[tokio::test]
    async fn prompt_carries_source_urls_and_the_current_draft() {
        let mut state = planned_state(&["A"], RunConfig::default());
        state.store_sources("A", sources("A", 2)).unwrap();
        state.store_note("A", "note about A".into()).unwrap();
        state.set_draft("# Revised by review".into());
        let llm = ScriptedLlm::always("# New draft");

        draft(&mut state, &llm).await.unwrap();

        let user = &llm.requests()[0][1].content;
        assert!(user.contains("https://example.org/A/0"));
        assert!(user.contains("https://example.org/A/1"));
        assert!(user.contains("# Revised by review"));
        assert_eq!(state.draft_report(), Some("# New draft"));
    }

    #[tokio::test]
    async fn failure_keeps_the_previous_draft() {
        let mut state = planned_state(&["A"], RunConfig::default());
        state.set_draft("old draft".into());
        let llm = ScriptedLlm::failing(GatewayError::ConnectionRefused {
            message: "refused".into(),
        });

        let failures = draft(&mut state, &llm).await.unwrap();

        assert_eq!(failures.len(), 1);
        assert!(failures[0].to_string().starts_with("draft failed"));
        assert_eq!(state.draft_report(), Some("old draft"));
    }
}
