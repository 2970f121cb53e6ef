//! The citation viewer panel.
//!
//! A [`CitationPanel`] tracks which citation is active, owns the single
//! live [`LocalHandle`] for fetched content, and drives the SharePoint
//! preview session.
//!
//! # Selection tokens
//!
//! Panel methods never await. Selecting a citation returns the async work
//! ([`SelectionWork`]) tagged with a fresh [`SelectionToken`]; the caller
//! runs it and hands the outcome back to `commit_fetch` / `commit_preview`.
//! Outcomes whose token is no longer the active one are dropped, so a slow
//! response for an earlier click can never overwrite a newer selection.
//! In-flight requests are not cancelled.
//!
//! ```rust,no_run
//! # use citeview::panel::{CitationPanel, SelectionWork};
//! # async fn example(panel: &mut CitationPanel) {
//! match panel.select("EWS_API#page=34") {
//!     SelectionWork::Fetch(work) => {
//!         let outcome = work.run().await;
//!         panel.commit_fetch(outcome);
//!     }
//!     SelectionWork::Preview(work) => {
//!         let outcome = work.run().await;
//!         panel.commit_preview(outcome);
//!     }
//! }
//! # }
//! ```

use serde::Serialize;
use std::sync::Arc;

use crate::config::Config;
use crate::error::CitationError;
use crate::fetch::DocumentFetcher;
use crate::handle::{LocalHandle, ObjectStore};
use crate::models::{CitationLookup, LocationKind, ResolvedLocation};
use crate::preview::{transition, PreviewDriver, PreviewEvent, PreviewSession};
use crate::resolver::{clean_label, PathResolver};
use crate::transport::{Payload, Transport};

/// Identity of one selection (or one retry of it).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SelectionToken(u64);

/// How fetched content is displayed, chosen by file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewerKind {
    Image,
    Pdf,
    Markdown,
    Text,
    /// Embedded frame with a download link.
    Download,
}

impl ViewerKind {
    /// Pick a viewer from the extension of `label`, ignoring any page
    /// anchor or trailing `(filename)` group.
    pub fn for_label(label: &str) -> Self {
        let cleaned = clean_label(label);
        let name = cleaned.split('#').next().unwrap_or_default();
        let ext = match name.rsplit_once('.') {
            Some((_, ext)) => ext.to_ascii_lowercase(),
            None => String::new(),
        };

        match ext.as_str() {
            "png" | "jpg" | "jpeg" | "gif" | "bmp" | "webp" => ViewerKind::Image,
            "pdf" => ViewerKind::Pdf,
            "md" => ViewerKind::Markdown,
            "txt" | "csv" => ViewerKind::Text,
            _ => ViewerKind::Download,
        }
    }
}

/// What the panel currently shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelView {
    /// No citation selected.
    Empty,
    Loading {
        label: String,
    },
    Document {
        label: String,
        /// Handle address including the page anchor.
        address: String,
        viewer: ViewerKind,
    },
    /// Fetch failed; shown with a retry action.
    Failed {
        label: String,
        error: CitationError,
    },
    /// Hosts tag the embedded viewer with `token` and pass it back to
    /// [`CitationPanel::viewer_loaded`] / [`CitationPanel::viewer_failed`].
    Preview {
        label: String,
        token: SelectionToken,
        session: PreviewSession,
    },
}

#[derive(Debug, Clone)]
struct ActiveSelection {
    token: SelectionToken,
    label: String,
    location: ResolvedLocation,
}

/// Async work started by a selection.
pub enum SelectionWork {
    Fetch(PendingFetch),
    Preview(PendingPreview),
}

impl SelectionWork {
    pub fn token(&self) -> SelectionToken {
        match self {
            SelectionWork::Fetch(w) => w.token,
            SelectionWork::Preview(w) => w.token,
        }
    }
}

/// A document fetch waiting to run.
pub struct PendingFetch {
    token: SelectionToken,
    label: String,
    location: ResolvedLocation,
    bearer: Option<String>,
    fetcher: DocumentFetcher,
}

impl PendingFetch {
    pub fn token(&self) -> SelectionToken {
        self.token
    }

    pub fn location(&self) -> &ResolvedLocation {
        &self.location
    }

    pub async fn run(self) -> FetchOutcome {
        let result = self
            .fetcher
            .retrieve(&self.location, &self.label, self.bearer.as_deref())
            .await;
        FetchOutcome {
            token: self.token,
            result,
        }
    }
}

/// Result of a [`PendingFetch`], to be committed to the panel.
#[derive(Debug)]
pub struct FetchOutcome {
    pub token: SelectionToken,
    pub result: Result<Payload, CitationError>,
}

/// A preview metadata query waiting to run.
pub struct PendingPreview {
    token: SelectionToken,
    source_url: String,
    bearer: Option<String>,
    driver: PreviewDriver,
}

impl PendingPreview {
    pub fn token(&self) -> SelectionToken {
        self.token
    }

    pub async fn run(self) -> PreviewOutcome {
        let event = self
            .driver
            .query_metadata(&self.source_url, self.bearer.as_deref())
            .await;
        PreviewOutcome {
            token: self.token,
            event,
        }
    }
}

/// Result of a [`PendingPreview`], to be committed to the panel.
#[derive(Debug)]
pub struct PreviewOutcome {
    pub token: SelectionToken,
    pub event: PreviewEvent,
}

/// Viewer panel state for one answer.
pub struct CitationPanel {
    resolver: PathResolver,
    fetcher: DocumentFetcher,
    driver: PreviewDriver,
    store: ObjectStore,
    lookup: CitationLookup,
    bearer: Option<String>,
    inline_preview: bool,
    next_token: u64,
    active: Option<ActiveSelection>,
    handle: Option<LocalHandle>,
    view: PanelView,
}

impl CitationPanel {
    pub fn new(config: &Config, transport: Arc<dyn Transport>, store: ObjectStore) -> Self {
        Self {
            resolver: PathResolver::from_config(config),
            fetcher: DocumentFetcher::new(transport.clone()),
            driver: PreviewDriver::from_config(transport, config),
            store,
            lookup: CitationLookup::new(),
            bearer: None,
            inline_preview: config.sharepoint.inline_preview,
            next_token: 0,
            active: None,
            handle: None,
            view: PanelView::Empty,
        }
    }

    /// Replace the lookup table, e.g. when a different answer is shown.
    pub fn set_lookup(&mut self, lookup: CitationLookup) {
        self.lookup = lookup;
    }

    pub fn set_bearer_token(&mut self, token: Option<String>) {
        self.bearer = token;
    }

    pub fn view(&self) -> &PanelView {
        &self.view
    }

    pub fn active_label(&self) -> Option<&str> {
        self.active.as_ref().map(|a| a.label.as_str())
    }

    pub fn active_token(&self) -> Option<SelectionToken> {
        self.active.as_ref().map(|a| a.token)
    }

    /// Address of the live handle, if a document is displayed.
    pub fn handle_address(&self) -> Option<String> {
        self.handle.as_ref().map(LocalHandle::address)
    }

    /// Make `label` the active citation and return the work to load it.
    pub fn select(&mut self, label: &str) -> SelectionWork {
        let location = self.resolver.resolve(label, &self.lookup);
        tracing::info!(label, path = %location, "citation selected");
        self.start(label.to_string(), location)
    }

    /// Re-run the active selection: refetch a document, or restart a
    /// preview from `LOADING` when it has reached `NEW_TAB` or `ERROR`.
    ///
    /// Returns `None` when nothing is selected or a preview is still in
    /// an automatic run.
    pub fn retry(&mut self) -> Option<SelectionWork> {
        let active = self.active.clone()?;

        if let PanelView::Preview { session, .. } = &self.view {
            let restarted = transition(session, PreviewEvent::ManualRetry);
            if restarted == *session {
                return None;
            }
        }

        Some(self.start(active.label, active.location))
    }

    fn start(&mut self, label: String, location: ResolvedLocation) -> SelectionWork {
        self.next_token += 1;
        let token = SelectionToken(self.next_token);

        let preview = location.kind == LocationKind::SharePoint && self.inline_preview;

        self.active = Some(ActiveSelection {
            token,
            label: label.clone(),
            location: location.clone(),
        });

        if preview {
            // The preview shows an embedded viewer, so the old document
            // handle is no longer displayed.
            self.release_handle();
            let session = PreviewSession::new(location.external_address());
            let work = PendingPreview {
                token,
                source_url: session.source_url.clone(),
                bearer: self.bearer.clone(),
                driver: self.driver.clone(),
            };
            self.view = PanelView::Preview {
                label,
                token,
                session,
            };
            SelectionWork::Preview(work)
        } else {
            self.view = PanelView::Loading {
                label: label.clone(),
            };
            SelectionWork::Fetch(PendingFetch {
                token,
                label,
                location,
                bearer: self.bearer.clone(),
                fetcher: self.fetcher.clone(),
            })
        }
    }

    fn is_current(&self, token: SelectionToken) -> bool {
        self.active.as_ref().is_some_and(|a| a.token == token)
    }

    /// Apply a finished fetch. Returns false if it was stale and dropped.
    pub fn commit_fetch(&mut self, outcome: FetchOutcome) -> bool {
        if !self.is_current(outcome.token) {
            tracing::debug!(token = ?outcome.token, "discarding stale fetch result");
            return false;
        }
        let Some(active) = self.active.clone() else {
            return false;
        };

        // Release before creating the replacement so two handles from this
        // panel never coexist.
        self.release_handle();

        self.view = match outcome.result {
            Ok(payload) => {
                let handle = self
                    .store
                    .create(payload, active.location.page_fragment.clone());
                let address = handle.address();
                self.handle = Some(handle);
                tracing::info!(label = %active.label, "citation loaded");
                PanelView::Document {
                    viewer: ViewerKind::for_label(&active.label),
                    label: active.label,
                    address,
                }
            }
            Err(error) => PanelView::Failed {
                label: active.label,
                error,
            },
        };
        true
    }

    /// Apply a finished metadata query. Returns false if it was stale.
    pub fn commit_preview(&mut self, outcome: PreviewOutcome) -> bool {
        if !self.is_current(outcome.token) {
            tracing::debug!(token = ?outcome.token, "discarding stale preview result");
            return false;
        }
        self.apply_preview_event(outcome.token, outcome.event)
    }

    /// The embedded viewer tagged with `token` loaded.
    pub fn viewer_loaded(&mut self, token: SelectionToken) -> bool {
        self.apply_preview_event(token, PreviewEvent::ViewerLoaded)
    }

    /// The embedded viewer tagged with `token` reported a load error.
    /// Errors from a viewer of an earlier selection are dropped.
    pub fn viewer_failed(&mut self, token: SelectionToken) -> bool {
        self.apply_preview_event(token, PreviewEvent::ViewerFailed)
    }

    fn apply_preview_event(&mut self, token: SelectionToken, event: PreviewEvent) -> bool {
        match &mut self.view {
            PanelView::Preview {
                token: current,
                session,
                ..
            } if *current == token => {
                *session = transition(session, event);
                true
            }
            _ => {
                tracing::debug!(?token, ?event, "discarding stale viewer event");
                false
            }
        }
    }

    /// Deselect the active citation and release its handle.
    pub fn clear(&mut self) {
        self.active = None;
        self.release_handle();
        self.view = PanelView::Empty;
    }

    fn release_handle(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.store.revoke(handle);
        }
    }
}

impl Drop for CitationPanel {
    fn drop(&mut self) {
        self.release_handle();
    }
}
