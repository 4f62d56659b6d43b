//! In-process text normalization.

use async_trait::async_trait;
use pipeline::{ContentNormalizer, NormalizerError};

/// Entities decoded by [`LocalNormalizer`]. Anything else is left as written.
const ENTITIES: [(&str, char); 7] = [
    ("&amp;", '&'),
    ("&lt;", '<'),
    ("&gt;", '>'),
    ("&quot;", '"'),
    ("&#39;", '\''),
    ("&apos;", '\''),
    ("&nbsp;", ' '),
];

/// [`ContentNormalizer`] that runs entirely in-process.
///
/// Per block: markup is removed (including the bodies of `<script>` and
/// `<style>` elements), the entities in [`ENTITIES`] are decoded in a single
/// pass, and whitespace runs collapse to one space. Blocks that end up empty
/// are dropped. Never fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalNormalizer;

impl LocalNormalizer {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl ContentNormalizer for LocalNormalizer {
    async fn normalize(&self, texts: Vec<String>) -> Result<Vec<String>, NormalizerError> {
        Ok(texts
            .iter()
            .map(|text| normalize_block(text))
            .filter(|block| !block.is_empty())
            .collect())
    }
}

pub fn normalize_block(text: &str) -> String {
    collapse_whitespace(&decode_entities(&strip_markup(text)))
}

/// Replaces every tag with a space. A `<` that does not open a tag (as in
/// `a < b`) or is never closed is kept as text.
fn strip_markup(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find('<') {
        out.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let opens_tag =
            after.starts_with(|c: char| c.is_ascii_alphabetic() || matches!(c, '/' | '!' | '?'));
        let Some(end) = after.find('>').filter(|_| opens_tag) else {
            out.push('<');
            rest = after;
            continue;
        };

        let tag = &after[..end];
        rest = &after[end + 1..];
        out.push(' ');

        if let Some(name) = raw_text_element(tag) {
            // Skip the element body; its closing tag is stripped next round.
            let closing = format!("</{name}");
            rest = match rest.to_ascii_lowercase().find(&closing) {
                Some(pos) => &rest[pos..],
                None => "",
            };
        }
    }
    out.push_str(rest);
    out
}

fn raw_text_element(tag: &str) -> Option<&'static str> {
    let name: String = tag
        .chars()
        .take_while(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase();
    match name.as_str() {
        "script" => Some("script"),
        "style" => Some("style"),
        _ => None,
    }
}

fn decode_entities(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        match ENTITIES.iter().find(|(entity, _)| tail.starts_with(entity)) {
            Some((entity, decoded)) => {
                out.push(*decoded);
                rest = &tail[entity.len()..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_tags_and_collapses_whitespace() {
        assert_eq!(
            normalize_block("<div class=\"x\">\n  <p>Hello <b>world</b></p>\n</div>"),
            "Hello world"
        );
    }

    #[test]
    fn drops_script_and_style_bodies() {
        let html = "<style>p { color: red }</style>Text<SCRIPT type=\"a\">var x = 1 < 2;</Script> more";
        assert_eq!(normalize_block(html), "Text more");
    }

    #[test]
    fn decodes_entities_once() {
        assert_eq!(
            normalize_block("Tom &amp; Jerry &lt;3 &quot;cats&quot; it&#39;s&nbsp;fine &amp;lt;"),
            "Tom & Jerry <3 \"cats\" it's fine &lt;"
        );
    }

    #[test]
    fn escaped_markup_survives_as_text() {
        assert_eq!(normalize_block("&lt;b&gt;bold&lt;/b&gt;"), "<b>bold</b>");
    }

    #[test]
    fn stray_angle_brackets_are_text() {
        assert_eq!(normalize_block("if a < b and c<d"), "if a < b and c<d");
        assert_eq!(normalize_block("1 <2"), "1 <2");
    }

    #[test]
    fn unknown_entities_are_kept() {
        assert_eq!(normalize_block("&copy; R&D"), "&copy; R&D");
    }

    #[tokio::test]
    async fn empty_blocks_are_dropped() {
        let out = LocalNormalizer::new()
            .normalize(vec![
                "<p> </p>".to_string(),
                "kept".to_string(),
                "&nbsp;".to_string(),
            ])
            .await
            .unwrap();
        assert_eq!(out, vec!["kept".to_string()]);
    }
}
