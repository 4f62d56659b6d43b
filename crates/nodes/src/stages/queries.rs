use pipeline::{LlmGateway, ResearchError, RunState};
use tracing::{info, warn};

use crate::parse::parse_query_list;
use crate::prompts;

/// Asks the LLM for the search plan and records it in `queries`.
///
/// Unusable output falls back to the normalized prompt as the only query.
///
/// # Errors
///
/// [`ResearchError::QueryGeneration`] when the gateway fails; this stage has
/// no partial result to continue with.
pub async fn generate_queries(
    state: &mut RunState,
    gateway: &dyn LlmGateway,
) -> Result<(), ResearchError> {
    let prompt = state
        .normalized_prompt()
        .ok_or_else(|| ResearchError::InvariantViolation {
            message: "generate_queries ran before normalize".to_string(),
        })?
        .to_string();
    let config = state.config();
    let max_queries = config.max_queries;
    let messages = prompts::query_plan(&prompt, &config.language, max_queries);

    let raw = gateway
        .generate(&messages)
        .await
        .map_err(|source| ResearchError::QueryGeneration { source })?;

    let mut queries = parse_query_list(&raw, max_queries);
    if queries.is_empty() {
        warn!(
            response_chars = raw.chars().count(),
            "no usable queries in LLM response, using the prompt as the only query"
        );
        queries.push(prompt);
    }

    info!(count = queries.len(), ?queries, "search plan ready");
    state.set_queries(queries)
}
