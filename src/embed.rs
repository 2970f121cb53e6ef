//! Synthesized SharePoint embed-view addresses.
//!
//! When the metadata service cannot supply an embed address, the viewer
//! falls back to rewriting the document URL into the `Doc.aspx` embed view:
//!
//! ```text
//! https://x.sharepoint.com/sites/IT/LIST/CASH.pdf
//!   → https://x.sharepoint.com/_layouts/15/Doc.aspx?sourcedoc=/sites/IT/LIST/CASH.pdf&action=embedview
//! ```

use serde::Serialize;
use url::Url;

const EMBED_VIEW_PATH: &str = "/_layouts/15/Doc.aspx";

/// Site-collection path prefixes (`/sites/<name>`, `/teams/<name>`).
const SITE_COLLECTIONS: [&str; 2] = ["sites", "teams"];

/// One way of rewriting a document URL into an embed view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EmbedStrategy {
    /// `/sites/<site>/<library>/<file…>` on a site collection.
    SiteDocument,
    /// `/<library>/<file…>` on the tenant root site.
    RootLibrary,
}

impl EmbedStrategy {
    /// Strategies in the order they are attempted.
    pub const ORDER: [EmbedStrategy; 2] = [EmbedStrategy::SiteDocument, EmbedStrategy::RootLibrary];

    pub fn synthesize(self, source: &Url) -> Option<String> {
        let segments: Vec<&str> = source.path_segments()?.collect();
        let site_idx = segments
            .iter()
            .position(|s| SITE_COLLECTIONS.contains(s));

        let document_path = match (self, site_idx) {
            // collection, site name, library, and at least one file segment
            (EmbedStrategy::SiteDocument, Some(idx)) if segments.len() > idx + 3 => {
                &segments[idx..]
            }
            (EmbedStrategy::RootLibrary, None) if segments.len() >= 2 => {
                if segments[0].starts_with('_') {
                    return None;
                }
                &segments[..]
            }
            _ => return None,
        };

        if document_path.iter().any(|s| s.is_empty()) {
            return None;
        }

        let host = source.host_str()?;
        let authority = match source.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        };

        Some(format!(
            "{}://{}{}?sourcedoc=/{}&action=embedview",
            source.scheme(),
            authority,
            EMBED_VIEW_PATH,
            document_path.join("/")
        ))
    }
}

/// Try every strategy in order; the first that applies wins.
pub fn synthesize_embed_url(source_url: &str) -> Option<(EmbedStrategy, String)> {
    let source = match Url::parse(source_url) {
        Ok(url) => url,
        Err(e) => {
            tracing::warn!(source_url, error = %e, "cannot parse SharePoint address");
            return None;
        }
    };

    EmbedStrategy::ORDER
        .into_iter()
        .find_map(|strategy| strategy.synthesize(&source).map(|url| (strategy, url)))
}
