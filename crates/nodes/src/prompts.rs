//! Message builders for every LLM-backed stage.
//!
//! Wording is deliberately plain: small local models follow short, explicit
//! instructions better than elaborate ones.

use pipeline::{ChatMessage, Language, SourceRecord};

use crate::parse::REVISED_REPORT_MARKER;

/// Messages asking for a one-query-per-line search plan.
pub fn query_plan(prompt: &str, language: &Language, count: usize) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(format!(
            "You plan web research. Write exactly {count} web search queries in {language} \
             that together cover the user's request. Output one query per line and nothing \
             else: no numbering, no explanations."
        )),
        ChatMessage::user(prompt.to_string()),
    ]
}

/// What the draft stage knows about one planned query.
#[derive(Debug, Clone, Copy)]
pub struct QueryEvidence<'a> {
    pub query: &'a str,
    pub note: &'a str,
    pub sources: &'a [SourceRecord],
}

/// Messages asking for a structured markdown report from the collected notes.
///
/// `evidence` is in plan order. `previous` is the current draft (possibly
/// revised by the reviewer), which the model extends instead of starting
/// over. `critique` is the reviewer feedback from the previous loop.
pub fn draft(
    prompt: &str,
    language: &Language,
    evidence: &[QueryEvidence<'_>],
    previous: Option<&str>,
    critique: Option<&str>,
) -> Vec<ChatMessage> {
    let mut notes = String::new();
    if evidence.is_empty() {
        notes.push_str("(no sources could be collected)\n");
    }
    for item in evidence {
        notes.push_str(&format!("### Notes for query: {}\n\n{}\n\n", item.query, item.note));
        if !item.sources.is_empty() {
            notes.push_str("Sources:\n");
            for source in item.sources {
                match source.title().trim() {
                    "" => notes.push_str(&format!("- {}\n", source.url())),
                    title => notes.push_str(&format!("- {title}: {}\n", source.url())),
                }
            }
            notes.push('\n');
        }
    }

    let mut request = format!("Research request:\n{prompt}\n\nCollected notes:\n\n{notes}");
    if let Some(previous) = previous {
        request.push_str(&format!(
            "Current draft (revise and extend it, keep what the notes still support):\n\n{previous}\n\n"
        ));
    }
    if let Some(critique) = critique {
        request.push_str(&format!(
            "Reviewer feedback on the current draft (address it):\n{critique}\n"
        ));
    }

    vec![
        ChatMessage::system(format!(
            "You write research reports in {language}. Using only the collected notes, write a \
             markdown report with a title, a `## Summary` section, thematic sections with \
             headings, and a `## Sources` section listing the source URLs you relied on, taken \
             from the notes. Say so explicitly where the notes are thin or contradictory."
        )),
        ChatMessage::user(request),
    ]
}

/// Messages asking for a critique of `draft`, optionally followed by a
/// revised report after [`REVISED_REPORT_MARKER`].
///
/// `concern` is the quality gate's reason for looping, when it named one.
pub fn review(
    prompt: &str,
    language: &Language,
    draft: &str,
    concern: Option<&str>,
) -> Vec<ChatMessage> {
    let mut request = format!("Research request:\n{prompt}\n\nDraft report:\n\n{draft}\n");
    if let Some(concern) = concern {
        request.push_str(&format!("\nAn automated quality check flagged: {concern}\n"));
    }

    vec![
        ChatMessage::system(format!(
            "You review research reports written in {language}. First list the draft's gaps, \
             unsupported claims and follow-up angles worth researching, as a short bullet list. \
             If you can improve the report with the information already present, then write \
             the line `{REVISED_REPORT_MARKER}` followed by the complete improved report."
        )),
        ChatMessage::user(request),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use pipeline::{ChatRole, Timestamp};

    #[test]
    fn query_plan_states_language_and_count() {
        let messages = query_plan("explain X", &Language::new("German").unwrap(), 4);
        assert_eq!(messages[0].role, ChatRole::System);
        assert!(messages[0].content.contains("exactly 4"));
        assert!(messages[0].content.contains("German"));
        assert_eq!(messages[1].content, "explain X");
    }

    #[test]
    fn draft_labels_notes_and_lists_source_urls() {
        let sources = [
            SourceRecord::new("https://x.example/a", "About X", "", Timestamp::now()),
            SourceRecord::new("https://x.example/b", " ", "", Timestamp::now()),
        ];
        let evidence = [QueryEvidence {
            query: "x basics",
            note: "X is a thing.",
            sources: &sources,
        }];

        let messages = draft("explain X", &Language::default(), &evidence, None, Some("cite more"));

        let user = &messages[1].content;
        assert!(user.contains("### Notes for query: x basics\n\nX is a thing."));
        assert!(user.contains("Sources:\n- About X: https://x.example/a\n- https://x.example/b\n"));
        assert!(user.contains("cite more"));
        assert!(!user.contains("Current draft"));
        assert!(messages[0].content.contains("## Sources"));
    }

    #[test]
    fn draft_builds_on_the_current_draft() {
        let messages = draft(
            "explain X",
            &Language::default(),
            &[],
            Some("# Revised X"),
            Some("add history"),
        );
        let user = &messages[1].content;
        let draft_at = user.find("Current draft").unwrap();
        assert!(user[draft_at..].contains("# Revised X"));
        assert!(user.find("add history").unwrap() > draft_at);
    }

    #[test]
    fn draft_without_notes_says_so() {
        let messages = draft("explain X", &Language::default(), &[], None, None);
        assert!(messages[1].content.contains("no sources could be collected"));
    }

    #[test]
    fn review_mentions_marker_and_concern() {
        let messages = review("p", &Language::default(), "draft", Some("coverage is thin"));
        assert!(messages[0].content.contains(REVISED_REPORT_MARKER));
        assert!(messages[1].content.contains("coverage is thin"));
    }
}
