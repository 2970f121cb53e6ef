//! SharePoint preview strategy selection.
//!
//! Externally hosted documents cannot be fetched into a local handle
//! reliably, so they are shown through an embedded viewer, degrading
//! through progressively simpler strategies:
//!
//! ```text
//!            metadata ok                 viewer error
//! LOADING ───────────────▶ GRAPH_EMBED ───────────────┐
//!    │                                                │ synthesize
//!    │ metadata failed, synthesize                    ▼
//!    └───────────────────────────────────────▶ SHAREPOINT_EMBED
//!    │ synthesis failed                               │ viewer error
//!    └───────────────────────────────────────▶    NEW_TAB ◀┘
//!                                                 ERROR
//! ```
//!
//! [`transition`] is a pure function over [`PreviewSession`]; the only
//! side effects (metadata queries) live in [`PreviewDriver`]. Within one
//! automatic run the state only ever degrades: `GRAPH_EMBED` is never
//! re-entered without a manual retry, which restarts at `LOADING`.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::embed::synthesize_embed_url;
use crate::error::CitationError;
use crate::transport::{PreviewMetadataResponse, Transport};

/// Viewer failures tolerated in `GRAPH_EMBED` before giving up on it.
pub const MAX_GRAPH_EMBED_RETRIES: u32 = 1;
/// Viewer failures tolerated in `SHAREPOINT_EMBED` before giving up on it.
pub const MAX_SHAREPOINT_EMBED_RETRIES: u32 = 2;

const ALL_METHODS_FAILED: &str = "The document preview could not be displayed.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PreviewState {
    #[serde(rename = "LOADING")]
    Loading,
    #[serde(rename = "GRAPH_EMBED")]
    GraphEmbed,
    #[serde(rename = "SHAREPOINT_EMBED")]
    SharePointEmbed,
    #[serde(rename = "NEW_TAB")]
    NewTab,
    #[serde(rename = "ERROR")]
    Error,
}

impl PreviewState {
    /// True for states that show an embedded viewer.
    pub fn is_embed(self) -> bool {
        matches!(self, PreviewState::GraphEmbed | PreviewState::SharePointEmbed)
    }

    /// `NEW_TAB` and `ERROR` hold until a manual retry.
    pub fn is_terminal(self) -> bool {
        matches!(self, PreviewState::NewTab | PreviewState::Error)
    }
}

/// Inputs to the state machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PreviewEvent {
    /// A new source became active.
    Start,
    /// The metadata service answered.
    MetadataResolved { response: PreviewMetadataResponse },
    /// The metadata query failed or timed out.
    MetadataFailed { reason: String },
    /// The embedded viewer loaded.
    ViewerLoaded,
    /// The embedded viewer reported a load error.
    ViewerFailed,
    /// The user pressed "retry".
    ManualRetry,
}

/// Actions offered to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PreviewAction {
    OpenExternally,
    Retry,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviewSession {
    /// Untagged SharePoint address of the document.
    pub source_url: String,
    pub state: PreviewState,
    pub retry_count: u32,
    pub embed_url: Option<String>,
    pub error_message: Option<String>,
}

impl PreviewSession {
    pub fn new(source_url: impl Into<String>) -> Self {
        Self {
            source_url: source_url.into(),
            state: PreviewState::Loading,
            retry_count: 0,
            embed_url: None,
            error_message: None,
        }
    }

    pub fn actions(&self) -> &'static [PreviewAction] {
        if self.state.is_terminal() {
            &[PreviewAction::OpenExternally, PreviewAction::Retry]
        } else {
            &[]
        }
    }

    /// The failure to surface, once every embed strategy is exhausted.
    pub fn failure(&self) -> Option<CitationError> {
        self.state.is_terminal().then(|| CitationError::PreviewUnavailable {
            source_url: self.source_url.clone(),
        })
    }

    /// Address used for the "open externally" action.
    pub fn external_address(&self) -> &str {
        &self.source_url
    }

    fn with_synthesized_embed(mut self) -> Self {
        match synthesize_embed_url(&self.source_url) {
            Some((strategy, url)) => {
                tracing::debug!(?strategy, %url, "using synthesized embed address");
                self.state = PreviewState::SharePointEmbed;
                self.embed_url = Some(url);
            }
            None => {
                tracing::info!(source_url = %self.source_url, "no embeddable address, offering new tab");
                self.state = PreviewState::NewTab;
                self.embed_url = None;
            }
        }
        self
    }
}

/// Compute the session that follows `session` after `event`.
///
/// Events that do not apply to the current state leave it unchanged, which
/// is how late metadata answers and spurious viewer errors are ignored.
pub fn transition(session: &PreviewSession, event: PreviewEvent) -> PreviewSession {
    let current = session.clone();

    match (session.state, event) {
        (_, PreviewEvent::Start) => PreviewSession::new(current.source_url),

        (PreviewState::Loading, PreviewEvent::MetadataResolved { response }) => {
            match response.embed_url() {
                Some(url) => PreviewSession {
                    state: PreviewState::GraphEmbed,
                    embed_url: Some(url.to_string()),
                    ..current
                },
                None => current.with_synthesized_embed(),
            }
        }
        (PreviewState::Loading, PreviewEvent::MetadataFailed { reason }) => {
            tracing::warn!(source_url = %session.source_url, %reason, "preview metadata failed");
            current.with_synthesized_embed()
        }

        (PreviewState::GraphEmbed, PreviewEvent::ViewerFailed)
            if session.retry_count < MAX_GRAPH_EMBED_RETRIES =>
        {
            PreviewSession {
                retry_count: session.retry_count + 1,
                ..current
            }
            .with_synthesized_embed()
        }
        (PreviewState::SharePointEmbed, PreviewEvent::ViewerFailed)
            if session.retry_count < MAX_SHAREPOINT_EMBED_RETRIES =>
        {
            PreviewSession {
                state: PreviewState::NewTab,
                retry_count: session.retry_count + 1,
                embed_url: None,
                ..current
            }
        }
        (PreviewState::GraphEmbed | PreviewState::SharePointEmbed, PreviewEvent::ViewerFailed) => {
            PreviewSession {
                state: PreviewState::Error,
                embed_url: None,
                error_message: Some(ALL_METHODS_FAILED.to_string()),
                ..current
            }
        }

        (PreviewState::NewTab | PreviewState::Error, PreviewEvent::ManualRetry) => {
            PreviewSession::new(current.source_url)
        }

        (_, PreviewEvent::ViewerLoaded) => {
            tracing::debug!(state = ?session.state, "preview loaded");
            current
        }

        _ => current,
    }
}

/// Runs the metadata step of a preview against a [`Transport`].
#[derive(Clone)]
pub struct PreviewDriver {
    transport: Arc<dyn Transport>,
    attempt_timeout: Duration,
}

impl PreviewDriver {
    pub fn new(transport: Arc<dyn Transport>, attempt_timeout: Duration) -> Self {
        Self {
            transport,
            attempt_timeout,
        }
    }

    pub fn from_config(transport: Arc<dyn Transport>, config: &Config) -> Self {
        Self::new(
            transport,
            Duration::from_secs(config.preview.attempt_timeout_secs),
        )
    }

    /// Query the metadata service, bounded by the attempt timeout.
    pub async fn query_metadata(&self, source_url: &str, token: Option<&str>) -> PreviewEvent {
        let source = source_url.split('#').next().unwrap_or(source_url);
        let query = self.transport.preview_metadata(source, token);

        match tokio::time::timeout(self.attempt_timeout, query).await {
            Ok(Ok(response)) => PreviewEvent::MetadataResolved { response },
            Ok(Err(e)) => PreviewEvent::MetadataFailed {
                reason: e.to_string(),
            },
            Err(_) => PreviewEvent::MetadataFailed {
                reason: format!(
                    "metadata lookup timed out after {}s",
                    self.attempt_timeout.as_secs()
                ),
            },
        }
    }

    /// Start a session for `source_url` and carry it through the metadata
    /// step.
    pub async fn start(&self, source_url: &str, token: Option<&str>) -> PreviewSession {
        let session = PreviewSession::new(source_url);
        let event = self.query_metadata(&session.source_url, token).await;
        transition(&session, event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SOURCE: &str = "https://x.sharepoint.com/sites/IT/LIST/CASH.pdf";

    fn resolved(json: &str) -> PreviewEvent {
        PreviewEvent::MetadataResolved {
            response: serde_json::from_str(json).unwrap(),
        }
    }

    fn failed() -> PreviewEvent {
        PreviewEvent::MetadataFailed {
            reason: "HTTP 500".to_string(),
        }
    }

    #[test]
    fn test_new_session_is_loading() {
        let s = PreviewSession::new(SOURCE);
        assert_eq!(s.state, PreviewState::Loading);
        assert_eq!(s.retry_count, 0);
        assert!(s.actions().is_empty());
        assert!(s.failure().is_none());
    }

    #[test]
    fn test_metadata_success_enters_graph_embed() {
        let s = transition(
            &PreviewSession::new(SOURCE),
            resolved(r#"{"success": true, "preview_info": {"embed_url": "https://graph/embed"}}"#),
        );
        assert_eq!(s.state, PreviewState::GraphEmbed);
        assert_eq!(s.embed_url.as_deref(), Some("https://graph/embed"));
    }

    #[test]
    fn test_top_level_embed_url_enters_graph_embed() {
        let s = transition(
            &PreviewSession::new(SOURCE),
            resolved(r#"{"success": true, "embed_url": "https://graph/top"}"#),
        );
        assert_eq!(s.state, PreviewState::GraphEmbed);
        assert_eq!(s.embed_url.as_deref(), Some("https://graph/top"));
    }

    #[test]
    fn test_metadata_without_url_synthesizes() {
        let s = transition(&PreviewSession::new(SOURCE), resolved(r#"{"success": true}"#));
        assert_eq!(s.state, PreviewState::SharePointEmbed);
        assert!(s
            .embed_url
            .as_deref()
            .unwrap()
            .contains("Doc.aspx?sourcedoc=/sites/IT/LIST/CASH.pdf"));
    }

    #[test]
    fn test_metadata_failure_then_viewer_failure_degrades_to_new_tab() {
        let s = transition(&PreviewSession::new(SOURCE), failed());
        assert_eq!(s.state, PreviewState::SharePointEmbed);

        let s = transition(&s, PreviewEvent::ViewerFailed);
        assert_eq!(s.state, PreviewState::NewTab);
        assert_eq!(s.retry_count, 1);
        assert_eq!(
            s.actions(),
            &[PreviewAction::OpenExternally, PreviewAction::Retry]
        );
        assert!(matches!(
            s.failure(),
            Some(CitationError::PreviewUnavailable { .. })
        ));

        // Late metadata cannot pull the session back into GRAPH_EMBED.
        let s = transition(
            &s,
            resolved(r#"{"success": true, "embed_url": "https://graph/late"}"#),
        );
        assert_eq!(s.state, PreviewState::NewTab);
        let s = transition(&s, PreviewEvent::ViewerFailed);
        assert_eq!(s.state, PreviewState::NewTab);
    }

    #[test]
    fn test_unsynthesizable_source_goes_to_new_tab() {
        let s = transition(
            &PreviewSession::new("https://x.sharepoint.com/sites/IT"),
            failed(),
        );
        assert_eq!(s.state, PreviewState::NewTab);
        assert!(s.embed_url.is_none());
    }

    #[test]
    fn test_graph_viewer_failure_falls_back_to_synthesis() {
        let s = transition(
            &PreviewSession::new(SOURCE),
            resolved(r#"{"success": true, "embed_url": "https://graph/embed"}"#),
        );
        let s = transition(&s, PreviewEvent::ViewerFailed);
        assert_eq!(s.state, PreviewState::SharePointEmbed);
        assert_eq!(s.retry_count, 1);

        let s = transition(&s, PreviewEvent::ViewerFailed);
        assert_eq!(s.state, PreviewState::NewTab);
        assert_eq!(s.retry_count, 2);
    }

    #[test]
    fn test_graph_viewer_failure_without_synthesis_goes_to_new_tab() {
        let source = "https://x.sharepoint.com/sites/IT";
        let s = transition(
            &PreviewSession::new(source),
            resolved(r#"{"success": true, "embed_url": "https://graph/embed"}"#),
        );
        assert_eq!(s.state, PreviewState::GraphEmbed);
        let s = transition(&s, PreviewEvent::ViewerFailed);
        assert_eq!(s.state, PreviewState::NewTab);
    }

    #[test]
    fn test_exhausted_embed_goes_to_error() {
        let s = PreviewSession {
            state: PreviewState::SharePointEmbed,
            retry_count: MAX_SHAREPOINT_EMBED_RETRIES,
            embed_url: Some("https://embed".to_string()),
            ..PreviewSession::new(SOURCE)
        };
        let s = transition(&s, PreviewEvent::ViewerFailed);
        assert_eq!(s.state, PreviewState::Error);
        assert!(s.error_message.is_some());
        assert!(s.embed_url.is_none());
    }

    #[test]
    fn test_manual_retry_restarts_from_loading() {
        let s = PreviewSession {
            state: PreviewState::Error,
            retry_count: 2,
            error_message: Some("x".to_string()),
            ..PreviewSession::new(SOURCE)
        };
        let s = transition(&s, PreviewEvent::ManualRetry);
        assert_eq!(s, PreviewSession::new(SOURCE));

        let s = transition(
            &s,
            resolved(r#"{"success": true, "embed_url": "https://graph/embed"}"#),
        );
        assert_eq!(s.state, PreviewState::GraphEmbed);
    }

    #[test]
    fn test_manual_retry_ignored_mid_run() {
        let s = transition(&PreviewSession::new(SOURCE), failed());
        let after = transition(&s, PreviewEvent::ManualRetry);
        assert_eq!(after, s);
    }

    #[test]
    fn test_viewer_loaded_is_noop() {
        let s = transition(&PreviewSession::new(SOURCE), failed());
        assert_eq!(transition(&s, PreviewEvent::ViewerLoaded), s);
    }

    #[test]
    fn test_event_wire_format() {
        let event: PreviewEvent = serde_json::from_str(r#"{"type": "viewer_failed"}"#).unwrap();
        assert_eq!(event, PreviewEvent::ViewerFailed);
        let state = serde_json::to_string(&PreviewState::SharePointEmbed).unwrap();
        assert_eq!(state, "\"SHAREPOINT_EMBED\"");
    }
}
