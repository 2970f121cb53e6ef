//! Failure taxonomy for citation handling.
//!
//! None of these are fatal. Resolution never fails; fetch and preview
//! failures are stored as view state and shown inline with a retry action;
//! malformed markers are rendered as literal text.

/// A classified citation failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CitationError {
    /// The transport reported the document missing (HTTP 404).
    #[error("Citation file not found: {label}")]
    NotFound {
        /// Citation label as selected by the user.
        label: String,
    },

    /// Any other transport failure: non-2xx status or network error.
    #[error("{message}")]
    TransientError {
        /// HTTP status when the server answered, `None` for network errors.
        status: Option<u16>,
        /// Human-readable detail including the status.
        message: String,
    },

    /// Every embed strategy for an externally hosted document failed.
    #[error("Preview unavailable for {source_url}; open it externally or retry")]
    PreviewUnavailable {
        /// The untagged SharePoint address.
        source_url: String,
    },

    /// A bracketed token is neither a known citation nor citation-like.
    #[error("not a citation: [{token}]")]
    MalformedCitation {
        /// The bracketed text without brackets.
        token: String,
    },
}

impl CitationError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, CitationError::NotFound { .. })
    }

    /// Machine-readable code used in HTTP error bodies and CLI output.
    pub fn code(&self) -> &'static str {
        match self {
            CitationError::NotFound { .. } => "not_found",
            CitationError::TransientError { .. } => "transient_error",
            CitationError::PreviewUnavailable { .. } => "preview_unavailable",
            CitationError::MalformedCitation { .. } => "malformed_citation",
        }
    }
}
