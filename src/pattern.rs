//! The "looks like a citation" predicate.
//!
//! Bracketed tokens that are not in the answer's known citation list are
//! still rendered as markers when they match one of these patterns. Anything
//! else is left in the text as literal brackets.

use regex::Regex;
use std::sync::LazyLock;

static UPPER_SNAKE_PAGE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Z_]+#page=\d+$").expect("valid regex"));

static DOCUMENT_EXTENSION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\.(pdf|docx?|pptx?|xlsx?|txt|md)(?:#page=\d+)?$").expect("valid regex")
});

/// One accepted citation shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CitationPattern {
    /// Contains `#page=`, e.g. `Document#page=5`.
    PageFragment,
    /// Contains `_API`, e.g. `EWS_API`.
    ApiSuffix,
    /// Contains `-api` or `api-`, e.g. `api-docs`.
    ApiHyphen,
    /// Upper snake case with a page anchor, e.g. `EWS_API#page=33`.
    UpperSnakePage,
    /// Ends in a document extension, optionally anchored: `guide.PDF#page=2`.
    DocumentExtension,
}

impl CitationPattern {
    pub const ALL: [CitationPattern; 5] = [
        CitationPattern::PageFragment,
        CitationPattern::ApiSuffix,
        CitationPattern::ApiHyphen,
        CitationPattern::UpperSnakePage,
        CitationPattern::DocumentExtension,
    ];

    pub fn matches(self, token: &str) -> bool {
        match self {
            CitationPattern::PageFragment => token.contains("#page="),
            CitationPattern::ApiSuffix => token.contains("_API"),
            CitationPattern::ApiHyphen => token.contains("-api") || token.contains("api-"),
            CitationPattern::UpperSnakePage => UPPER_SNAKE_PAGE.is_match(token),
            CitationPattern::DocumentExtension => DOCUMENT_EXTENSION.is_match(token),
        }
    }
}

/// The first pattern `token` matches, if any.
pub fn matching_pattern(token: &str) -> Option<CitationPattern> {
    CitationPattern::ALL.into_iter().find(|p| p.matches(token))
}

pub fn looks_like_citation(token: &str) -> bool {
    matching_pattern(token).is_some()
}
