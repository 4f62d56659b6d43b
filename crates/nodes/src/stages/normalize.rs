use pipeline::{ResearchError, RunState};
use tracing::info;

/// Trims and cleans the original prompt into `normalized_prompt`.
///
/// Never calls a collaborator.
///
/// # Errors
///
/// [`ResearchError::EmptyPrompt`] if nothing is left after cleaning.
pub fn normalize(state: &mut RunState) -> Result<(), ResearchError> {
    let cleaned = clean_prompt(state.original_prompt());
    if cleaned.is_empty() {
        return Err(ResearchError::EmptyPrompt);
    }

    info!(
        original_chars = state.original_prompt().chars().count(),
        normalized_chars = cleaned.chars().count(),
        "prompt normalized"
    );
    state.set_normalized_prompt(cleaned)
}

/// Removes control characters, collapses runs of whitespace inside each line,
/// and drops blank lines. Line structure is otherwise kept.
pub fn clean_prompt(raw: &str) -> String {
    raw.lines()
        .map(|line| {
            line.chars()
                .map(|c| if c.is_control() { ' ' } else { c })
                .collect::<String>()
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
        })
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
