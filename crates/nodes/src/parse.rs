//! Defensive parsing of free-text LLM output.
//!
//! Local models ignore formatting instructions often enough that nothing here
//! assumes a well-formed answer. The query-list chain is:
//!
//! 1. drop `<think>` reasoning blocks,
//! 2. split into lines,
//! 3. strip list markers (`-`, `*`, `•`, `1.`, `2)`, `(3)`, …) and wrapping
//!    quotes or emphasis,
//! 4. drop blank lines, code fences, headings and preamble lines ending in `:`,
//! 5. de-duplicate case-insensitively, keeping the first spelling,
//! 6. cap to the requested count.
//!
//! An empty result is legal; the caller decides the fallback.

use std::collections::HashSet;

const THINK_OPEN: &str = "<think>";
const THINK_CLOSE: &str = "</think>";

/// Separator the review prompt asks the model to put before a revised report.
pub const REVISED_REPORT_MARKER: &str = "=== REVISED REPORT ===";

/// Removes `<think>…</think>` blocks emitted by reasoning models.
///
/// An unterminated `<think>` swallows the rest of the text. A dangling
/// `</think>` (some servers strip the opening tag) keeps only what follows it.
pub fn strip_reasoning(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(start) = rest.find(THINK_OPEN) {
        out.push_str(&rest[..start]);
        let after_open = &rest[start + THINK_OPEN.len()..];
        match after_open.find(THINK_CLOSE) {
            Some(end) => rest = &after_open[end + THINK_CLOSE.len()..],
            None => {
                rest = "";
                break;
            }
        }
    }
    out.push_str(rest);

    match out.rfind(THINK_CLOSE) {
        Some(end) => out[end + THINK_CLOSE.len()..].trim().to_string(),
        None => out.trim().to_string(),
    }
}

/// Extracts at most `max` distinct search queries from an LLM answer.
pub fn parse_query_list(raw: &str, max: usize) -> Vec<String> {
    let text = strip_reasoning(raw);
    let mut seen = HashSet::new();
    let mut queries = Vec::new();

    for line in text.lines() {
        if queries.len() >= max {
            break;
        }
        let Some(query) = clean_query_line(line) else {
            continue;
        };
        if seen.insert(query.to_lowercase()) {
            queries.push(query);
        }
    }
    queries
}

fn clean_query_line(line: &str) -> Option<String> {
    let line = line.trim();
    if line.is_empty() || line.starts_with("```") || line.starts_with('#') {
        return None;
    }

    let line = strip_list_marker(line).trim_matches(|c: char| {
        c.is_whitespace()
            || matches!(c, '"' | '\'' | '`' | '*' | '_' | '-' | '•' | '“' | '”' | '‘' | '’')
    });
    if line.is_empty() || line.ends_with(':') {
        return None;
    }
    Some(line.split_whitespace().collect::<Vec<_>>().join(" "))
}

fn strip_list_marker(line: &str) -> &str {
    for bullet in ["- ", "* ", "• ", "+ ", "– "] {
        if let Some(rest) = line.strip_prefix(bullet) {
            return rest.trim_start();
        }
    }

    // Numbered markers: "1.", "2)", "3:", "(4)". The marker must be followed by
    // whitespace so queries that start with a number ("2024 GPU prices") survive.
    let body = line.strip_prefix('(').unwrap_or(line);
    let digits = body.bytes().take_while(u8::is_ascii_digit).count();
    if digits == 0 {
        return line;
    }
    match body[digits..].strip_prefix(['.', ')', ':']) {
        Some(rest) if rest.is_empty() || rest.starts_with(char::is_whitespace) => rest.trim_start(),
        _ => line,
    }
}

/// A parsed critique answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Review {
    /// Reviewer feedback; never empty.
    pub critique: String,
    /// Full replacement report, if the model produced one.
    pub revised_report: Option<String>,
}

/// Splits a review answer into critique and optional revised report.
///
/// Returns `None` if no critique text remains after stripping reasoning.
pub fn parse_review(raw: &str) -> Option<Review> {
    let text = strip_reasoning(raw);
    let (critique, revised) = match text.find(REVISED_REPORT_MARKER) {
        Some(at) => (
            &text[..at],
            Some(&text[at + REVISED_REPORT_MARKER.len()..]),
        ),
        None => (text.as_str(), None),
    };

    let critique = critique.trim();
    if critique.is_empty() {
        return None;
    }
    Some(Review {
        critique: critique.to_string(),
        revised_report: revised
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_string),
    })
}
