//! JSON HTTP API for citation parsing, resolution, and preview transitions.
//!
//! Lets a browser front end share one implementation of the citation rules
//! instead of re-implementing them in script. Every endpoint is stateless:
//! preview sessions travel in the request and come back updated.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `GET`  | `/health` | Health check (returns version) |
//! | `POST` | `/citations/parse` | Segment an answer, number and resolve its citations |
//! | `POST` | `/citations/resolve` | Resolve a single label |
//! | `POST` | `/preview/transition` | Apply one event to a preview session |
//!
//! # Error Contract
//!
//! Every error, including an unreadable or mistyped request body, has the
//! same shape:
//!
//! ```json
//! { "error": { "code": "bad_request", "message": "label must not be empty" } }
//! ```
//!
//! # CORS
//!
//! All origins, methods, and headers are permitted.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};

use crate::config::Config;
use crate::models::{CitationLookup, CitationMarker, ResolvedLocation};
use crate::parser::{parse_answer, Segment};
use crate::preview::{transition, PreviewAction, PreviewEvent, PreviewSession};
use crate::resolver::PathResolver;

#[derive(Clone)]
struct AppState {
    resolver: Arc<PathResolver>,
}

/// Builds the router; used by [`run_server`] and by tests.
pub fn router(config: &Config) -> Router {
    let state = AppState {
        resolver: Arc::new(PathResolver::from_config(config)),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handle_health))
        .route("/citations/parse", post(handle_parse))
        .route("/citations/resolve", post(handle_resolve))
        .route("/preview/transition", post(handle_transition))
        .layer(cors)
        .with_state(state)
}

/// Serves the API on `[server].bind` until the process is terminated.
pub async fn run_server(config: &Config) -> anyhow::Result<()> {
    let bind_addr = config.server.bind.clone();
    let app = router(config);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    tracing::info!("citation API listening on http://{}", bind_addr);
    axum::serve(listener, app).await?;

    Ok(())
}

// ============ Error response ============

#[derive(Serialize)]
struct ErrorBody {
    error: ErrorDetail,
}

#[derive(Serialize)]
struct ErrorDetail {
    code: String,
    message: String,
}

struct AppError {
    status: StatusCode,
    code: String,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            error: ErrorDetail {
                code: self.code,
                message: self.message,
            },
        };
        (self.status, Json(body)).into_response()
    }
}

fn bad_request(message: impl Into<String>) -> AppError {
    AppError {
        status: StatusCode::BAD_REQUEST,
        code: "bad_request".to_string(),
        message: message.into(),
    }
}

/// Unreadable request bodies keep axum's status (400, 415, or 422) but use
/// the JSON error body.
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError {
            status: rejection.status(),
            code: "bad_request".to_string(),
            message: rejection.body_text(),
        }
    }
}

// ============ GET /health ============

#[derive(Serialize)]
struct HealthResponse {
    status: String,
    version: String,
}

async fn handle_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

// ============ POST /citations/parse ============

#[derive(Deserialize)]
struct ParseRequest {
    answer: String,
    #[serde(default)]
    streaming: bool,
    /// Known citation labels; a bracketed token that prefixes one is accepted.
    #[serde(default)]
    citations: Vec<String>,
    #[serde(default)]
    lookup: CitationLookup,
}

#[derive(Serialize)]
struct ParseResponse {
    html: String,
    segments: Vec<Segment>,
    citations: Vec<CitationMarker>,
}

async fn handle_parse(
    State(state): State<AppState>,
    body: Result<Json<ParseRequest>, JsonRejection>,
) -> Result<Json<ParseResponse>, AppError> {
    let Json(req) = body?;
    let parsed = parse_answer(
        &req.answer,
        req.streaming,
        &req.citations,
        &req.lookup,
        &state.resolver,
    );
    Ok(Json(ParseResponse {
        html: parsed.to_html(),
        segments: parsed.segments,
        citations: parsed.citations,
    }))
}

// ============ POST /citations/resolve ============

#[derive(Deserialize)]
struct ResolveRequest {
    label: String,
    #[serde(default)]
    lookup: CitationLookup,
}

#[derive(Serialize)]
struct ResolveResponse {
    location: ResolvedLocation,
    /// Tagged string form, as placed on click targets.
    path: String,
    external_address: String,
}

async fn handle_resolve(
    State(state): State<AppState>,
    body: Result<Json<ResolveRequest>, JsonRejection>,
) -> Result<Json<ResolveResponse>, AppError> {
    let Json(req) = body?;
    if req.label.trim().is_empty() {
        return Err(bad_request("label must not be empty"));
    }

    let location = state.resolver.resolve(&req.label, &req.lookup);
    Ok(Json(ResolveResponse {
        path: location.path(),
        external_address: location.external_address().to_string(),
        location,
    }))
}

// ============ POST /preview/transition ============

#[derive(Deserialize)]
struct TransitionRequest {
    session: PreviewSession,
    event: PreviewEvent,
}

#[derive(Serialize)]
struct TransitionResponse {
    session: PreviewSession,
    actions: &'static [PreviewAction],
    #[serde(skip_serializing_if = "Option::is_none")]
    failure: Option<FailureBody>,
}

#[derive(Serialize)]
struct FailureBody {
    code: &'static str,
    message: String,
}

async fn handle_transition(
    body: Result<Json<TransitionRequest>, JsonRejection>,
) -> Result<Json<TransitionResponse>, AppError> {
    let Json(req) = body?;
    if req.session.source_url.trim().is_empty() {
        return Err(bad_request("session.source_url must not be empty"));
    }

    let session = transition(&req.session, req.event);
    let failure = session.failure().map(|e| FailureBody {
        code: e.code(),
        message: e.to_string(),
    });

    Ok(Json(TransitionResponse {
        actions: session.actions(),
        failure,
        session,
    }))
}
