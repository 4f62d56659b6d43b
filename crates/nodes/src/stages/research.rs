use futures::future::join_all;
use pipeline::{RunState, SourceCollector, Stage, StageError};
use tracing::{info, warn};

use super::StageOutcome;

/// Collects sources for every planned query, overwriting the previous pass.
///
/// Queries are searched concurrently and independently: a failing query gets
/// an empty result list and an isolated error, its siblings are unaffected.
/// All searches have finished when this returns. With `max_sources == 0`
/// the collector is not called and every query gets an empty list.
pub async fn research(state: &mut RunState, collector: &dyn SourceCollector) -> StageOutcome {
    let bounds = state.config().sources;
    let queries = state.queries().to_vec();

    if bounds.max == 0 {
        for query in &queries {
            state.store_sources(query, Vec::new())?;
        }
        info!(queries = queries.len(), "source collection disabled, research pass skipped");
        return Ok(Vec::new());
    }

    let searches = queries.iter().map(|query| async move {
        let result = collector.search(query, bounds.min, bounds.max).await;
        (query, result)
    });
    let results = join_all(searches).await;

    let mut failures = Vec::new();
    for (query, result) in results {
        let sources = match result {
            Ok(mut sources) => {
                sources.truncate(bounds.max);
                sources
            }
            Err(err) => {
                warn!(%query, error = %err, "search failed");
                failures.push(StageError::for_query(Stage::Research, query, err));
                Vec::new()
            }
        };
        state.store_sources(query, sources)?;
    }

    info!(
        queries = queries.len(),
        sources = state.total_sources(),
        failed = failures.len(),
        "research pass complete"
    );
    Ok(failures)
}
