//! Route definitions for the Polarity server.
//!
//! Provides the analysis endpoint plus liveness and health checks.

use crate::analyzer::Analyzer;
use crate::model::{AnalysisType, Branch};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
    Router,
};
use polarity_common::logging::{RequestContext, TRACE_ID_HEADER};
use polarity_common::request_span;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::Instrument;

/// Service name reported by `/health` and attached to request spans.
pub const SERVICE_NAME: &str = "polarity-server";

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub analyzer: Arc<Analyzer>,
}

impl AppState {
    pub fn new(analyzer: Analyzer) -> Self {
        Self {
            analyzer: Arc::new(analyzer),
        }
    }
}

/// Analyze request body.
#[derive(Debug, Serialize, Deserialize)]
pub struct AnalyzeRequest {
    pub text: String,
    /// `sentiment` or `comparison`; checked here, not used for routing.
    pub analysis_type: String,
}

/// Error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub detail: String,
}

/// Liveness response.
#[derive(Debug, Serialize, Deserialize)]
pub struct RootResponse {
    pub message: String,
}

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub service: String,
}

/// Build every route with its state attached.
pub fn build_routes(state: AppState) -> Router {
    Router::new()
        .merge(health_routes())
        .merge(analysis_routes(state))
}

/// Liveness and health routes. Stateless.
pub fn health_routes() -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
}

/// Analysis routes, including the legacy `/analyze` path.
pub fn analysis_routes(state: AppState) -> Router {
    Router::new()
        .route("/api/analyze", post(analyze_handler))
        .route("/analyze", post(analyze_handler))
        .with_state(state)
}

// ─────────────────────────────────────────────────────────────────────────────
// Handlers
// ─────────────────────────────────────────────────────────────────────────────

async fn root_handler() -> Json<RootResponse> {
    Json(RootResponse {
        message: "Sentiment Analysis API is running".into(),
    })
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".into(),
        version: env!("CARGO_PKG_VERSION").into(),
        service: SERVICE_NAME.into(),
    })
}

async fn analyze_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Result<Json<AnalyzeRequest>, JsonRejection>,
) -> Response {
    let ctx = RequestContext::from_headers(&headers, SERVICE_NAME);
    let span = request_span!("analyze", ctx.trace_id, service = %ctx.service);

    let mut response = analyze(state, body).instrument(span).await;
    if let Ok(value) = HeaderValue::from_str(&ctx.trace_id) {
        response.headers_mut().insert(TRACE_ID_HEADER, value);
    }
    response
}

async fn analyze(state: AppState, body: Result<Json<AnalyzeRequest>, JsonRejection>) -> Response {
    let Json(request) = match body {
        Ok(body) => body,
        Err(rejection) => {
            tracing::warn!(error = %rejection.body_text(), "Rejected analyze body");
            // Oversized bodies keep their 413; every other body problem is a 400.
            let status = match rejection.status() {
                StatusCode::PAYLOAD_TOO_LARGE => StatusCode::PAYLOAD_TOO_LARGE,
                _ => StatusCode::BAD_REQUEST,
            };
            return error_response(status, rejection.body_text());
        }
    };

    let requested: AnalysisType = match request.analysis_type.parse() {
        Ok(kind) => kind,
        Err(message) => {
            tracing::warn!(analysis_type = %request.analysis_type, "Unknown analysis type");
            return error_response(StatusCode::BAD_REQUEST, message);
        }
    };

    match state.analyzer.analyze(&request.text).await {
        Ok(result) => {
            let expected = Branch::from(requested);
            if result.shape() != expected && !result.is_error() {
                tracing::warn!(
                    requested = %expected,
                    returned = %result.shape(),
                    "Analysis type differs from detected branch"
                );
            }
            (StatusCode::OK, Json(result)).into_response()
        }
        Err(e) => {
            let status =
                StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            if status.is_server_error() {
                tracing::error!(error = %e, "Analysis failed");
            } else {
                tracing::warn!(error = %e, "Analysis rejected");
            }
            error_response(status, e.to_string())
        }
    }
}

fn error_response(status: StatusCode, detail: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorResponse {
            detail: detail.into(),
        }),
    )
        .into_response()
}
