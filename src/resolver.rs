//! Citation label → document location resolution.
//!
//! Resolution never fails: a label with no mapping degrades to a path under
//! the configured content root.
//!
//! # Order of precedence
//!
//! 1. `lookup[label]`
//! 2. `lookup[cleaned]` where `cleaned` drops a trailing `(filename)` group
//! 3. `lookup[cleaned minus #fragment]`, so `CASH.pdf#page=5` finds `CASH.pdf`
//! 4. `cleaned` itself, when it is already a SharePoint address
//! 5. `<content root>/<cleaned>`
//!
//! The stored URL is then classified as SharePoint, remote, or local, and a
//! `#page=N` anchor from the original label is carried over unless the URL
//! already has a fragment.

use regex::Regex;
use std::sync::LazyLock;

use crate::config::Config;
use crate::models::{CitationLookup, LocationKind, PageFragment, ResolvedLocation};

static TRAILING_PARENTHETICAL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s*\(.*?\)\s*$").expect("valid regex"));

/// Strips a trailing `"(...)"` group and surrounding whitespace.
///
/// `"CASH.pdf (CASH.pdf)"` becomes `"CASH.pdf"`.
pub fn clean_label(label: &str) -> String {
    TRAILING_PARENTHETICAL.replace(label, "").trim().to_string()
}

/// Resolves citation labels against a lookup table.
#[derive(Debug, Clone)]
pub struct PathResolver {
    content_root: String,
    sharepoint_hosts: Vec<String>,
}

impl Default for PathResolver {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl PathResolver {
    pub fn new(content_root: impl Into<String>, sharepoint_hosts: Vec<String>) -> Self {
        let content_root = content_root.into().trim_end_matches('/').to_string();
        Self {
            content_root,
            sharepoint_hosts,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.content.root.clone(),
            config.sharepoint.hosts.clone(),
        )
    }

    /// True when `address` contains one of the configured SharePoint hosts.
    ///
    /// Plain substring match; custom domains are only recognized when listed.
    pub fn is_sharepoint(&self, address: &str) -> bool {
        self.sharepoint_hosts
            .iter()
            .any(|host| address.contains(host.as_str()))
    }

    /// Resolve `label` to a classified location.
    pub fn resolve(&self, label: &str, lookup: &CitationLookup) -> ResolvedLocation {
        let cleaned = clean_label(label);
        let page = PageFragment::find_in(label);

        let unanchored = cleaned.split('#').next().unwrap_or_default();

        let stored = lookup
            .get(label)
            .or_else(|| lookup.get(&cleaned))
            .or_else(|| lookup.get(unanchored))
            .map(String::as_str);

        let stored = match stored {
            Some(url) => url,
            None if self.is_sharepoint(&cleaned) => cleaned.as_str(),
            None => {
                // No mapping: the cleaned label is served from the content
                // root as-is, fragment included.
                return ResolvedLocation {
                    kind: LocationKind::Local,
                    url: self.content_path(&cleaned),
                    page_fragment: page,
                };
            }
        };

        let (kind, base) = if self.is_sharepoint(stored) {
            (LocationKind::SharePoint, stored.to_string())
        } else if stored.starts_with("http://") || stored.starts_with("https://") {
            (LocationKind::Remote, stored.to_string())
        } else {
            (LocationKind::Local, self.content_path(stored))
        };

        let url = match &page {
            Some(frag) if !base.contains('#') => format!("{}#{}", base, frag),
            _ => base,
        };

        ResolvedLocation {
            kind,
            url,
            page_fragment: page,
        }
    }

    fn content_path(&self, relative: &str) -> String {
        format!("{}/{}", self.content_root, relative.trim_start_matches('/'))
    }
}
