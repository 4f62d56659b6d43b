use pipeline::RunState;
use tracing::{debug, info};

/// Writes `final_report`: metadata block, draft (or a degraded notice), and a
/// caveats section derived from the error log.
///
/// Never fails and never replaces a report that already exists.
pub fn finalize(state: &mut RunState) {
    let report = compose_final_report(state);
    let chars = report.chars().count();
    if state.set_final_report(report) {
        info!(
            chars,
            degraded = state.draft_report().is_none(),
            caveats = state.error_log().len(),
            "final report ready"
        );
    } else {
        debug!("final report already set, keeping the first one");
    }
}

/// Renders the final report for `state` without modifying it.
///
/// The output depends only on the state, so rendering the same state twice is
/// byte-identical.
pub fn compose_final_report(state: &RunState) -> String {
    let mut report = metadata_block(state);
    report.push('\n');

    match state.draft_report() {
        Some(draft) => report.push_str(draft.trim()),
        None => report.push_str(
            "# Research report unavailable\n\n\
             No draft report could be generated for this request. \
             The caveats below record what went wrong.",
        ),
    }
    report.push('\n');

    if !state.error_log().is_empty() {
        report.push_str("\n## Caveats\n\n");
        for entry in state.error_log() {
            report.push_str(&format!("- {}\n", single_line(entry)));
        }
    }
    report
}

fn metadata_block(state: &RunState) -> String {
    let config = state.config();
    let prompt = state.normalized_prompt().unwrap_or(state.original_prompt());
    let model = config
        .model
        .as_ref()
        .map(|m| m.as_str())
        .unwrap_or("unspecified");

    format!(
        "---\n\
         run_id: {}\n\
         prompt: {}\n\
         language: {}\n\
         model: {}\n\
         queries: {}\n\
         sources: {}\n\
         validation_loops: {}\n\
         errors: {}\n\
         ---\n",
        state.run_id(),
        single_line(prompt),
        config.language,
        model,
        state.queries().len(),
        state.total_sources(),
        state.loop_count(),
        state.error_log().len(),
    )
}

fn single_line(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{planned_state, sources};
    use pipeline::{ModelName, RunConfig};

    fn metadata_of(report: &str) -> &str {
        let end = report[4..].find("---\n").unwrap() + 4 + 4;
        &report[..end]
    }

    #[test]
    fn metadata_block_reports_counts() {
        let config = RunConfig {
            model: ModelName::new("qwen2.5"),
            ..RunConfig::default()
        };
        let mut state = planned_state(&["A", "B"], config);
        state.store_sources("A", sources("A", 3)).unwrap();
        state.store_sources("B", sources("B", 1)).unwrap();
        state.record_loop();
        state.set_draft("# Report".into());

        let report = compose_final_report(&state);
        let metadata = metadata_of(&report);
        assert!(metadata.contains("prompt: prompt for A B\n"), "{metadata}");
        assert!(metadata.contains("language: English\n"));
        assert!(metadata.contains("model: qwen2.5\n"));
        assert!(metadata.contains("queries: 2\n"));
        assert!(metadata.contains("sources: 4\n"));
        assert!(metadata.contains("validation_loops: 1\n"));
        assert!(metadata.contains("errors: 0\n"));
        assert!(report.ends_with("# Report\n"));
        assert!(!report.contains("## Caveats"));
    }

    #[test]
    fn composing_twice_is_byte_identical() {
        let mut state = planned_state(&["A"], RunConfig::default());
        state.set_draft("# Report".into());
        state.record_error("research failed for query 'A': boom");
        assert_eq!(compose_final_report(&state), compose_final_report(&state));
    }

    #[test]
    fn missing_draft_yields_a_degraded_report() {
        let mut state = planned_state(&["A"], RunConfig::default());
        state.record_error("draft failed: LLM request timed out");

        finalize(&mut state);

        let report = state.final_report().unwrap();
        assert!(report.contains("# Research report unavailable"));
        assert!(report.contains("## Caveats\n\n- draft failed: LLM request timed out\n"));
    }

    #[test]
    fn finalize_sets_the_report_once() {
        let mut state = planned_state(&["A"], RunConfig::default());
        state.set_draft("first".into());
        finalize(&mut state);
        let first = state.final_report().unwrap().to_string();

        state.set_draft("second".into());
        finalize(&mut state);
        assert_eq!(state.final_report(), Some(first.as_str()));
    }
}
