//! Citation marker parsing for (possibly still streaming) answer text.
//!
//! The parser splits an answer into literal text and bracketed markers,
//! numbers distinct markers in order of first appearance, and renders
//! clickable superscript markup. It is pure: clicks are dispatched later
//! through [`ParsedAnswer::activate`] to a caller-supplied
//! [`CitationHandler`].
//!
//! # Streaming
//!
//! While an answer is still being generated, a marker may be cut off
//! mid-token (`"... see [EWS_A"`). When `is_streaming` is set, the text from
//! an unmatched trailing `[` onward is dropped, so markers only appear once
//! their closing `]` has arrived.

use regex::Regex;
use serde::Serialize;
use std::sync::LazyLock;

use crate::error::CitationError;
use crate::models::{CitationLookup, CitationMarker};
use crate::pattern::looks_like_citation;
use crate::resolver::{clean_label, PathResolver};

static MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[([^\]]+)\]").expect("valid regex"));

/// A piece of parsed answer text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Segment {
    /// Plain text, including bracketed tokens that were not accepted as
    /// citations (re-emitted with their brackets).
    Literal { text: String },
    /// An accepted citation; `ordinal` indexes into
    /// [`ParsedAnswer::citations`].
    Marker { ordinal: usize },
}

/// Which pointer action activated a marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickKind {
    /// Open the citation in the internal viewer.
    Primary,
    /// Context-menu click: the default menu is suppressed and the document
    /// opens in a new top-level view instead.
    Secondary,
}

/// Receives marker activations.
pub trait CitationHandler {
    /// Called on a primary click with the selected marker.
    fn on_select(&mut self, marker: &CitationMarker);

    /// Called on a secondary click with the untagged resolved address.
    fn open_external(&mut self, address: &str);
}

/// Output of [`parse_answer`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedAnswer {
    pub segments: Vec<Segment>,
    /// Distinct markers in order of first appearance; `citations[i].ordinal == i + 1`.
    pub citations: Vec<CitationMarker>,
}

impl ParsedAnswer {
    pub fn marker(&self, ordinal: usize) -> Option<&CitationMarker> {
        ordinal
            .checked_sub(1)
            .and_then(|idx| self.citations.get(idx))
    }

    /// Dispatches a click on marker `ordinal`. Returns false for an unknown
    /// ordinal.
    pub fn activate(
        &self,
        ordinal: usize,
        click: ClickKind,
        handler: &mut impl CitationHandler,
    ) -> bool {
        let Some(marker) = self.marker(ordinal) else {
            return false;
        };
        match click {
            ClickKind::Primary => handler.on_select(marker),
            ClickKind::Secondary => handler.open_external(marker.location.external_address()),
        }
        true
    }

    /// Renders the answer as HTML with one `<a><sup>N</sup></a>` per marker.
    pub fn to_html(&self) -> String {
        let mut html = String::new();
        for segment in &self.segments {
            match segment {
                Segment::Literal { text } => html.push_str(&escape_html(text)),
                Segment::Marker { ordinal } => {
                    if let Some(marker) = self.marker(*ordinal) {
                        html.push_str(&render_marker(marker));
                    }
                }
            }
        }
        html
    }
}

/// Drops a trailing, still-open `[...` so partial markers are never shown.
pub fn truncate_partial_marker(text: &str) -> &str {
    for (idx, ch) in text.char_indices().rev() {
        match ch {
            ']' => return text,
            '[' => return &text[..idx],
            _ => {}
        }
    }
    text
}

/// Checks whether a bracketed `token` is a citation: a prefix of one of
/// `known_citations`, or citation-like by pattern.
pub fn accept_token(token: &str, known_citations: &[String]) -> Result<(), CitationError> {
    if known_citations.iter().any(|c| c.starts_with(token)) || looks_like_citation(token) {
        return Ok(());
    }
    Err(CitationError::MalformedCitation {
        token: token.to_string(),
    })
}

/// Parse `answer` into segments and numbered citations.
///
/// A bracketed token is accepted when it is a prefix of one of
/// `known_citations`, or when it looks like a citation (see
/// [`crate::pattern`]). Repeats of the same raw token share one ordinal.
pub fn parse_answer(
    answer: &str,
    is_streaming: bool,
    known_citations: &[String],
    lookup: &CitationLookup,
    resolver: &PathResolver,
) -> ParsedAnswer {
    let mut text = answer.trim();
    if is_streaming {
        text = truncate_partial_marker(text);
    }

    let mut segments = Vec::new();
    let mut citations: Vec<CitationMarker> = Vec::new();
    let mut literal = String::new();
    let mut last = 0;

    for caps in MARKER.captures_iter(text) {
        let (Some(whole), Some(token)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let token = token.as_str();
        literal.push_str(&text[last..whole.start()]);
        last = whole.end();

        if let Err(e) = accept_token(token, known_citations) {
            tracing::trace!(error = %e, "keeping bracketed text literal");
            literal.push_str(whole.as_str());
            continue;
        }

        let ordinal = match citations.iter().position(|m| m.raw == token) {
            Some(idx) => idx + 1,
            None => {
                citations.push(CitationMarker {
                    raw: token.to_string(),
                    cleaned: clean_label(token),
                    ordinal: citations.len() + 1,
                    location: resolver.resolve(token, lookup),
                });
                citations.len()
            }
        };

        if !literal.is_empty() {
            segments.push(Segment::Literal {
                text: std::mem::take(&mut literal),
            });
        }
        segments.push(Segment::Marker { ordinal });
    }

    literal.push_str(&text[last..]);
    if !literal.is_empty() {
        segments.push(Segment::Literal { text: literal });
    }

    ParsedAnswer {
        segments,
        citations,
    }
}

fn render_marker(marker: &CitationMarker) -> String {
    format!(
        r#"<a class="supContainer" title="{}" data-citation-path="{}" data-external-href="{}"><sup>{}</sup></a>"#,
        escape_html(&marker.raw),
        escape_html(&marker.location.path()),
        escape_html(marker.location.external_address()),
        marker.ordinal
    )
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str, streaming: bool) -> ParsedAnswer {
        parse_answer(
            text,
            streaming,
            &[],
            &CitationLookup::new(),
            &PathResolver::default(),
        )
    }

    #[derive(Default)]
    struct Recorder {
        selected: Vec<String>,
        external: Vec<String>,
    }

    impl CitationHandler for Recorder {
        fn on_select(&mut self, marker: &CitationMarker) {
            self.selected.push(marker.location.path());
        }

        fn open_external(&mut self, address: &str) {
            self.external.push(address.to_string());
        }
    }

    #[test]
    fn test_repeat_marker_reuses_ordinal() {
        let parsed = parse("First [Doc#page=2] and again [Doc#page=2].", false);
        assert_eq!(parsed.citations.len(), 1);
        let ordinals: Vec<usize> = parsed
            .segments
            .iter()
            .filter_map(|s| match s {
                Segment::Marker { ordinal } => Some(*ordinal),
                Segment::Literal { .. } => None,
            })
            .collect();
        assert_eq!(ordinals, vec![1, 1]);
    }

    #[test]
    fn test_ordinals_follow_first_appearance() {
        let parsed = parse("[b.pdf] then [a.pdf] then [b.pdf] then [c.md]", false);
        let raws: Vec<&str> = parsed.citations.iter().map(|m| m.raw.as_str()).collect();
        assert_eq!(raws, vec!["b.pdf", "a.pdf", "c.md"]);
        for (i, m) in parsed.citations.iter().enumerate() {
            assert_eq!(m.ordinal, i + 1);
        }
    }

    #[test]
    fn test_distinct_by_raw_token() {
        let parsed = parse("[a.pdf#page=1 (a.pdf)] and [a.pdf#page=1]", false);
        assert_eq!(parsed.citations.len(), 2);
        assert_eq!(parsed.citations[0].cleaned, "a.pdf#page=1");
        assert_eq!(parsed.citations[1].cleaned, "a.pdf#page=1");
        assert_eq!(parsed.citations[1].ordinal, 2);
    }

    #[test]
    fn test_streaming_truncates_open_marker() {
        let parsed = parse("The answer is here, see [EWS_A", true);
        let html = parsed.to_html();
        assert_eq!(html, "The answer is here, see ");
        assert!(parsed.citations.is_empty());
    }

    #[test]
    fn test_streaming_keeps_closed_marker() {
        let parsed = parse("See [EWS_API#page=3] for details", true);
        assert_eq!(parsed.citations.len(), 1);
        assert!(parsed.to_html().ends_with(" for details"));
    }

    #[test]
    fn test_not_streaming_leaves_open_bracket() {
        let parsed = parse("see [EWS_A", false);
        assert_eq!(parsed.to_html(), "see [EWS_A");
    }

    #[test]
    fn test_truncate_partial_marker() {
        assert_eq!(truncate_partial_marker("a [b] c [d"), "a [b] c ");
        assert_eq!(truncate_partial_marker("a [b] c"), "a [b] c");
        assert_eq!(truncate_partial_marker("no brackets"), "no brackets");
        assert_eq!(truncate_partial_marker("[x"), "");
    }

    #[test]
    fn test_unrecognized_token_stays_literal() {
        let parsed = parse("Array index [1] and [note] remain", false);
        assert!(parsed.citations.is_empty());
        assert_eq!(parsed.to_html(), "Array index [1] and [note] remain");
    }

    #[test]
    fn test_known_citation_prefix_accepted() {
        let known = vec!["Handbook section 4".to_string()];
        let parsed = parse_answer(
            "See [Handbook].",
            false,
            &known,
            &CitationLookup::new(),
            &PathResolver::default(),
        );
        assert_eq!(parsed.citations.len(), 1);
        assert_eq!(parsed.citations[0].location.path(), "/content/Handbook");
    }

    #[test]
    fn test_markup_contains_ordinal_and_path() {
        let mut lookup = CitationLookup::new();
        lookup.insert(
            "CASH.pdf".to_string(),
            "https://x.sharepoint.com/sites/IT/LIST/CASH.pdf".to_string(),
        );
        let parsed = parse_answer(
            "Totals [CASH.pdf#page=5].",
            false,
            &[],
            &lookup,
            &PathResolver::default(),
        );
        let html = parsed.to_html();
        assert!(html.starts_with("Totals <a class=\"supContainer\" title=\"CASH.pdf#page=5\""));
        assert!(html.contains(
            "data-citation-path=\"sharepoint:https://x.sharepoint.com/sites/IT/LIST/CASH.pdf#page=5\""
        ));
        assert!(html.contains(
            "data-external-href=\"https://x.sharepoint.com/sites/IT/LIST/CASH.pdf#page=5\""
        ));
        assert!(html.ends_with("<sup>1</sup></a>."));
    }

    #[test]
    fn test_literal_text_is_escaped() {
        let parsed = parse("a < b & [c.pdf]", false);
        assert!(parsed.to_html().starts_with("a &lt; b &amp; <a"));
    }

    #[test]
    fn test_activate_dispatches_by_click_kind() {
        let parsed = parse("[guide.pdf#page=4]", false);
        let mut recorder = Recorder::default();

        assert!(parsed.activate(1, ClickKind::Primary, &mut recorder));
        assert!(parsed.activate(1, ClickKind::Secondary, &mut recorder));
        assert!(!parsed.activate(2, ClickKind::Primary, &mut recorder));

        assert_eq!(recorder.selected, vec!["/content/guide.pdf#page=4"]);
        assert_eq!(recorder.external, vec!["/content/guide.pdf#page=4"]);
    }

    #[test]
    fn test_accept_token_reports_malformed() {
        assert!(accept_token("EWS_API#page=3", &[]).is_ok());
        assert!(accept_token("Hand", &["Handbook".to_string()]).is_ok());
        assert_eq!(
            accept_token("note", &[]),
            Err(CitationError::MalformedCitation {
                token: "note".to_string()
            })
        );
    }

    #[test]
    fn test_answer_is_trimmed() {
        let parsed = parse("  hello  \n", false);
        assert_eq!(parsed.to_html(), "hello");
    }

    #[test]
    fn test_parse_is_pure() {
        let a = parse("x [a.pdf] y [b.md] z [a.pdf]", false);
        let b = parse("x [a.pdf] y [b.md] z [a.pdf]", false);
        assert_eq!(a, b);
    }
}
