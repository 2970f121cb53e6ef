//! Core data models shared by the resolver, parser, fetcher, and panel.

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Mapping from a citation label, exactly as it appears in answer text, to
/// the stored URL of the cited document.
///
/// Supplied by the answer-generation service. Keys may or may not carry a
/// `#page=N` fragment.
pub type CitationLookup = HashMap<String, String>;

/// Prefix marking a resolved path as SharePoint-hosted, so transport
/// selection can tell it apart from an ordinary remote URL.
pub const SHAREPOINT_TAG: &str = "sharepoint:";

/// Where a resolved document lives, which decides the transport used to
/// fetch it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum LocationKind {
    /// Served by the backend under the content root.
    Local,
    /// Any other absolute `http(s)` address, e.g. blob storage.
    Remote,
    /// SharePoint-hosted; fetched through the SharePoint content endpoint.
    #[serde(rename = "sharepoint")]
    SharePoint,
}

/// A `page=N` anchor used by page-aware viewers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct PageFragment(String);

impl PageFragment {
    /// Extracts the first `#page=N` anchor from `text`.
    pub fn find_in(text: &str) -> Option<Self> {
        let start = text.find("#page=")? + "#page=".len();
        let digits: String = text[start..]
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect();
        if digits.is_empty() {
            None
        } else {
            Some(Self(digits))
        }
    }

    pub fn page(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PageFragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "page={}", self.0)
    }
}

/// Result of resolving a citation label.
///
/// `url` already contains the page fragment when one applies; the fragment
/// is also kept separately so transports can strip it and viewers can put
/// it back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedLocation {
    pub kind: LocationKind,
    pub url: String,
    pub page_fragment: Option<PageFragment>,
}

impl ResolvedLocation {
    /// The transport-tagged path string handed to click handlers, e.g.
    /// `sharepoint:https://x.sharepoint.com/sites/IT/LIST/CASH.pdf#page=5`.
    pub fn path(&self) -> String {
        match self.kind {
            LocationKind::SharePoint => format!("{}{}", SHAREPOINT_TAG, self.url),
            LocationKind::Local | LocationKind::Remote => self.url.clone(),
        }
    }

    /// The untagged address used when opening the document outside the
    /// internal viewer.
    pub fn external_address(&self) -> &str {
        &self.url
    }

    /// The address with any `#...` fragment removed, as sent over the wire.
    pub fn url_without_fragment(&self) -> &str {
        match self.url.find('#') {
            Some(idx) => &self.url[..idx],
            None => &self.url,
        }
    }
}

impl FromStr for ResolvedLocation {
    type Err = std::convert::Infallible;

    /// Reads the tagged string form produced by [`ResolvedLocation::path`].
    fn from_str(path: &str) -> Result<Self, Self::Err> {
        let (kind, url) = match path.strip_prefix(SHAREPOINT_TAG) {
            Some(url) => (LocationKind::SharePoint, url),
            None if path.starts_with("http://") || path.starts_with("https://") => {
                (LocationKind::Remote, path)
            }
            None => (LocationKind::Local, path),
        };
        Ok(Self {
            kind,
            url: url.to_string(),
            page_fragment: PageFragment::find_in(url),
        })
    }
}

impl fmt::Display for ResolvedLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// A citation marker accepted by the parser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CitationMarker {
    /// The bracketed token as written, without brackets.
    pub raw: String,
    /// `raw` without a trailing `(filename)` group and surrounding whitespace.
    pub cleaned: String,
    /// Stable 1-based display number.
    pub ordinal: usize,
    pub location: ResolvedLocation,
}
