use futures::future::join_all;
use pipeline::{ContentNormalizer, RunState, SourceRecord, Stage, StageError};
use tracing::{info, warn};

use super::StageOutcome;

/// Rebuilds `processed_notes` from this pass's sources.
///
/// Notes from the previous pass are dropped first. Queries without sources
/// get no note; a normalizer failure for one query is isolated like a
/// research failure.
pub async fn process(state: &mut RunState, normalizer: &dyn ContentNormalizer) -> StageOutcome {
    state.clear_notes();

    let work: Vec<(String, Vec<String>)> = state
        .queries()
        .iter()
        .filter_map(|query| {
            let sources = state.sources_for(query);
            (!sources.is_empty()).then(|| {
                let texts = sources.iter().map(SourceRecord::text_block).collect();
                (query.clone(), texts)
            })
        })
        .collect();
    let skipped = state.queries().len() - work.len();

    let jobs = work.into_iter().map(|(query, texts)| async move {
        let result = normalizer.normalize(texts).await;
        (query, result)
    });
    let results = join_all(jobs).await;

    let mut failures = Vec::new();
    for (query, result) in results {
        match result {
            Ok(chunks) => {
                let note = join_chunks(&chunks);
                if !note.is_empty() {
                    state.store_note(&query, note)?;
                }
            }
            Err(err) => {
                warn!(%query, error = %err, "normalization failed");
                failures.push(StageError::for_query(Stage::Process, &query, err));
            }
        }
    }

    info!(
        notes = state.processed_notes().len(),
        skipped,
        failed = failures.len(),
        "process pass complete"
    );
    Ok(failures)
}

fn join_chunks(chunks: &[String]) -> String {
    chunks
        .iter()
        .map(|chunk| chunk.trim())
        .filter(|chunk| !chunk.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}
