//! Document retrieval for resolved citations.
//!
//! SharePoint-tagged locations go through the backend's SharePoint content
//! endpoint; everything else is a plain `GET`. Page fragments never go over
//! the wire; they are re-attached to the local handle address instead.

use std::sync::Arc;

use crate::error::CitationError;
use crate::handle::{LocalHandle, ObjectStore};
use crate::models::{LocationKind, PageFragment, ResolvedLocation};
use crate::transport::{Payload, Transport, TransportResponse};

/// Outcome of [`DocumentFetcher::fetch`].
#[derive(Debug)]
pub enum FetchResult {
    Success {
        handle: LocalHandle,
        page_fragment: Option<PageFragment>,
    },
    Failure(CitationError),
}

/// Retrieves document bytes through the transport matching the location.
#[derive(Clone)]
pub struct DocumentFetcher {
    transport: Arc<dyn Transport>,
}

impl DocumentFetcher {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    /// Fetch the bytes for `location`.
    ///
    /// `label` is the citation as the user selected it and is only used in
    /// the not-found message.
    pub async fn retrieve(
        &self,
        location: &ResolvedLocation,
        label: &str,
        token: Option<&str>,
    ) -> Result<Payload, CitationError> {
        let url = location.url_without_fragment();

        let response = match location.kind {
            LocationKind::SharePoint => {
                tracing::info!(sharepoint_url = url, "fetching SharePoint document");
                self.transport.get_sharepoint_content(url, token).await
            }
            LocationKind::Local | LocationKind::Remote => {
                self.transport.get_content(url, token).await
            }
        };

        match response {
            Ok(resp) => classify_response(label, resp),
            Err(e) => {
                tracing::warn!(label, error = %e, "citation request failed");
                Err(CitationError::TransientError {
                    status: None,
                    message: format!("Error loading citation: {}", e),
                })
            }
        }
    }

    /// Fetch and register the payload in `store`.
    ///
    /// Callers that already hold a handle for this view must revoke it
    /// before calling this.
    pub async fn fetch(
        &self,
        location: &ResolvedLocation,
        label: &str,
        token: Option<&str>,
        store: &ObjectStore,
    ) -> FetchResult {
        match self.retrieve(location, label, token).await {
            Ok(payload) => {
                let page_fragment = location.page_fragment.clone();
                let handle = store.create(payload, page_fragment.clone());
                FetchResult::Success {
                    handle,
                    page_fragment,
                }
            }
            Err(e) => FetchResult::Failure(e),
        }
    }
}

/// Maps a transport response to a payload or a classified failure.
pub fn classify_response(label: &str, resp: TransportResponse) -> Result<Payload, CitationError> {
    if resp.is_success() {
        return Ok(Payload {
            bytes: resp.body,
            content_type: resp.content_type,
        });
    }

    tracing::warn!(label, status = resp.status, reason = %resp.reason, "failed to fetch citation");

    if resp.status == 404 {
        return Err(CitationError::NotFound {
            label: label.to_string(),
        });
    }

    Err(CitationError::TransientError {
        status: Some(resp.status),
        message: format!("Failed to load citation ({}): {}", resp.status, resp.reason),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CitationLookup;
    use crate::resolver::PathResolver;
    use crate::transport::PreviewMetadataResponse;
    use anyhow::Result;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Records every call and answers with a fixed status.
    struct FakeTransport {
        status: u16,
        calls: Mutex<Vec<(String, String, Option<String>)>>,
    }

    impl FakeTransport {
        fn new(status: u16) -> Arc<Self> {
            Arc::new(Self {
                status,
                calls: Mutex::new(Vec::new()),
            })
        }

        fn record(&self, kind: &str, url: &str, token: Option<&str>) -> TransportResponse {
            self.calls.lock().unwrap().push((
                kind.to_string(),
                url.to_string(),
                token.map(str::to_string),
            ));
            TransportResponse {
                status: self.status,
                reason: if self.status == 404 {
                    "Not Found".to_string()
                } else {
                    "Bad Gateway".to_string()
                },
                content_type: Some("application/pdf".to_string()),
                body: b"%PDF".to_vec(),
            }
        }
    }

    #[async_trait]
    impl Transport for FakeTransport {
        async fn get_content(&self, url: &str, token: Option<&str>) -> Result<TransportResponse> {
            Ok(self.record("content", url, token))
        }

        async fn get_sharepoint_content(
            &self,
            url: &str,
            token: Option<&str>,
        ) -> Result<TransportResponse> {
            Ok(self.record("sharepoint", url, token))
        }

        async fn preview_metadata(
            &self,
            _url: &str,
            _token: Option<&str>,
        ) -> Result<PreviewMetadataResponse> {
            anyhow::bail!("not used")
        }
    }

    struct DownTransport;

    #[async_trait]
    impl Transport for DownTransport {
        async fn get_content(&self, _url: &str, _token: Option<&str>) -> Result<TransportResponse> {
            anyhow::bail!("connection refused")
        }

        async fn get_sharepoint_content(
            &self,
            _url: &str,
            _token: Option<&str>,
        ) -> Result<TransportResponse> {
            anyhow::bail!("connection refused")
        }

        async fn preview_metadata(
            &self,
            _url: &str,
            _token: Option<&str>,
        ) -> Result<PreviewMetadataResponse> {
            anyhow::bail!("connection refused")
        }
    }

    fn resolve(label: &str, pairs: &[(&str, &str)]) -> ResolvedLocation {
        let lookup: CitationLookup = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        PathResolver::default().resolve(label, &lookup)
    }

    #[tokio::test]
    async fn test_sharepoint_uses_sharepoint_transport_without_fragment() {
        let transport = FakeTransport::new(200);
        let fetcher = DocumentFetcher::new(transport.clone());
        let loc = resolve(
            "CASH.pdf#page=5",
            &[("CASH.pdf", "https://x.sharepoint.com/sites/IT/LIST/CASH.pdf")],
        );

        let store = ObjectStore::new();
        let result = fetcher.fetch(&loc, "CASH.pdf#page=5", Some("tok"), &store).await;

        let calls = transport.calls.lock().unwrap().clone();
        assert_eq!(
            calls,
            vec![(
                "sharepoint".to_string(),
                "https://x.sharepoint.com/sites/IT/LIST/CASH.pdf".to_string(),
                Some("tok".to_string())
            )]
        );

        match result {
            FetchResult::Success {
                handle,
                page_fragment,
            } => {
                assert!(handle.address().ends_with("#page=5"));
                assert_eq!(page_fragment.unwrap().page(), "5");
                assert!(store.revoke(handle));
            }
            FetchResult::Failure(e) => panic!("unexpected failure: {}", e),
        }
    }

    #[tokio::test]
    async fn test_local_uses_direct_get() {
        let transport = FakeTransport::new(200);
        let fetcher = DocumentFetcher::new(transport.clone());
        let loc = resolve("guide.pdf#page=2", &[]);

        let payload = fetcher.retrieve(&loc, "guide.pdf#page=2", None).await.unwrap();
        assert_eq!(payload.bytes, b"%PDF");

        let calls = transport.calls.lock().unwrap().clone();
        assert_eq!(calls[0].0, "content");
        assert_eq!(calls[0].1, "/content/guide.pdf");
        assert_eq!(calls[0].2, None);
    }

    #[tokio::test]
    async fn test_not_found_classified() {
        let fetcher = DocumentFetcher::new(FakeTransport::new(404));
        let loc = resolve("missing.pdf", &[]);
        let err = fetcher.retrieve(&loc, "missing.pdf", None).await.unwrap_err();
        assert_eq!(
            err,
            CitationError::NotFound {
                label: "missing.pdf".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_other_status_is_transient() {
        let fetcher = DocumentFetcher::new(FakeTransport::new(502));
        let loc = resolve("a.pdf", &[]);
        let err = fetcher.retrieve(&loc, "a.pdf", None).await.unwrap_err();
        match err {
            CitationError::TransientError { status, message } => {
                assert_eq!(status, Some(502));
                assert_eq!(message, "Failed to load citation (502): Bad Gateway");
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_network_error_is_transient() {
        let fetcher = DocumentFetcher::new(Arc::new(DownTransport));
        let loc = resolve("a.pdf", &[]);
        let store = ObjectStore::new();
        match fetcher.fetch(&loc, "a.pdf", None, &store).await {
            FetchResult::Failure(CitationError::TransientError { status, message }) => {
                assert_eq!(status, None);
                assert!(message.contains("connection refused"));
            }
            other => panic!("unexpected: {:?}", other),
        }
        assert_eq!(store.live_count(), 0);
    }
}
