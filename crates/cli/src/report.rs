//! Report persistence: the markdown report plus a JSON run summary next to it.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use pipeline::{RunId, RunState};
use serde::Serialize;

const MAX_SLUG_CHARS: usize = 48;

/// Leading hex digits of the run id appended to report names.
const RUN_ID_CHARS: usize = 8;

/// Machine-readable summary written as `<report stem>.json`.
#[derive(Debug, Serialize)]
pub struct RunSummary<'a> {
    pub run_id: String,
    pub prompt: &'a str,
    pub report: &'a Path,
    pub validation_loops: u32,
    pub queries: &'a [String],
    pub sources: usize,
    pub errors: &'a [String],
}

/// `<timestamp>_<slug>_<run>.md`, for example
/// `20240611-142233_explain-rust-lifetimes_5f0c9a1e.md`.
///
/// The run fragment keeps runs of the same prompt within one second apart.
pub fn report_file_name(now: DateTime<Utc>, prompt: &str, run_id: RunId) -> String {
    let run = run_id.as_uuid().simple().to_string();
    format!(
        "{}_{}_{}.md",
        now.format("%Y%m%d-%H%M%S"),
        slug(prompt),
        &run[..RUN_ID_CHARS]
    )
}

/// Lowercase ASCII words of `prompt` joined by `-`, at most
/// [`MAX_SLUG_CHARS`] long; `report` when nothing is left.
pub fn slug(prompt: &str) -> String {
    let mut slug = String::new();
    for word in prompt
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|w| !w.is_empty())
    {
        let sep = usize::from(!slug.is_empty());
        if slug.len() + sep + word.len() > MAX_SLUG_CHARS {
            if slug.is_empty() {
                slug.push_str(&word[..MAX_SLUG_CHARS]);
            }
            break;
        }
        if sep == 1 {
            slug.push('-');
        }
        slug.push_str(&word.to_ascii_lowercase());
    }
    if slug.is_empty() {
        "report".to_string()
    } else {
        slug.to_ascii_lowercase()
    }
}

/// Writes the final report of `state` into `dir` and returns its path.
///
/// Fails if the run produced no report.
pub fn write_report(dir: &Path, state: &RunState, now: DateTime<Utc>) -> Result<PathBuf> {
    let Some(report) = state.final_report() else {
        bail!(
            "run {} produced no report: {}",
            state.run_id(),
            state.error_log().join("; ")
        );
    };
    let prompt = state.normalized_prompt().unwrap_or(state.original_prompt());

    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create output directory '{}'", dir.display()))?;
    let path = dir.join(report_file_name(now, prompt, state.run_id()));
    std::fs::write(&path, report)
        .with_context(|| format!("failed to write report '{}'", path.display()))?;

    let summary = RunSummary {
        run_id: state.run_id().to_string(),
        prompt,
        report: &path,
        validation_loops: state.loop_count(),
        queries: state.queries(),
        sources: state.total_sources(),
        errors: state.error_log(),
    };
    let summary_path = path.with_extension("json");
    let json = serde_json::to_string_pretty(&summary).context("failed to serialize run summary")?;
    std::fs::write(&summary_path, json)
        .with_context(|| format!("failed to write run summary '{}'", summary_path.display()))?;

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use pipeline::RunConfig;

    fn fixed_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 11, 14, 22, 33).unwrap()
    }

    #[test]
    fn slug_keeps_ascii_words() {
        assert_eq!(slug("Explain Rust's lifetimes, please!"), "explain-rust-s-lifetimes-please");
        assert_eq!(slug("  Größe   der Welt "), "gr-e-der-welt");
        assert_eq!(slug("???"), "report");
    }

    #[test]
    fn slug_is_bounded() {
        let long = "word ".repeat(40);
        let s = slug(&long);
        assert!(s.len() <= MAX_SLUG_CHARS);
        assert!(!s.ends_with('-'));
        assert_eq!(slug(&"x".repeat(100)).len(), MAX_SLUG_CHARS);
    }

    fn run_id(hex: &str) -> RunId {
        RunId::from_uuid(uuid::Uuid::parse_str(hex).unwrap())
    }

    #[test]
    fn file_name_has_timestamp_slug_and_run_fragment() {
        assert_eq!(
            report_file_name(
                fixed_time(),
                "explain X",
                run_id("5f0c9a1e-0000-4000-8000-000000000000")
            ),
            "20240611-142233_explain-x_5f0c9a1e.md"
        );
    }

    #[test]
    fn same_prompt_in_the_same_second_gets_distinct_files() {
        let dir = tempfile::tempdir().unwrap();
        let write = |hex: &str, body: &str| {
            let mut state =
                RunState::with_run_id(run_id(hex), "explain X", RunConfig::default());
            state.set_final_report(body.to_string());
            write_report(dir.path(), &state, fixed_time()).unwrap()
        };

        let first = write("11111111-0000-4000-8000-000000000000", "first");
        let second = write("22222222-0000-4000-8000-000000000000", "second");

        assert_ne!(first, second);
        assert_eq!(std::fs::read_to_string(&first).unwrap(), "first");
        assert_eq!(std::fs::read_to_string(&second).unwrap(), "second");
    }

    #[test]
    fn writes_report_and_summary() {
        let dir = tempfile::tempdir().unwrap();
        let mut state = RunState::new("explain X", RunConfig::default());
        state.set_normalized_prompt("explain X".to_string()).unwrap();
        state.record_error("research failed for query 'x': boom");
        state.set_final_report("# Report\n".to_string());

        let path = write_report(&dir.path().join("out"), &state, fixed_time()).unwrap();

        let name = path.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("20240611-142233_explain-x_"), "{name}");
        assert!(name.ends_with(".md"));
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# Report\n");
        let summary: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(path.with_extension("json")).unwrap())
                .unwrap();
        assert_eq!(summary["run_id"], state.run_id().to_string());
        assert_eq!(summary["prompt"], "explain X");
        assert_eq!(summary["errors"][0], "research failed for query 'x': boom");
    }

    #[test]
    fn state_without_report_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let state = RunState::new("explain X", RunConfig::default());
        let err = write_report(dir.path(), &state, fixed_time()).unwrap_err();
        assert!(err.to_string().contains("produced no report"));
    }
}
