//! Polarity Server - LLM-backed sentiment and comparison analysis over HTTP.
//!
//! This crate provides:
//! - Prompt construction for comparison detection, sentiment and comparison
//! - A completion gateway over the Anthropic Messages API
//! - Normalization of untrusted model output into typed results
//! - The analysis pipeline and its HTTP surface
//!
//! ## Architecture
//!
//! ```text
//! POST /api/analyze → Analyzer → detection prompt → CompletionGateway
//!                              → sentiment | comparison prompt → CompletionGateway
//!                              → normalizer → AnalysisResult
//! ```

#![warn(clippy::all)]
#![allow(clippy::pedantic)]

pub mod analyzer;
pub mod completion;
pub mod model;
pub mod normalizer;
pub mod prompt;
pub mod provider;
pub mod routes;

pub use analyzer::Analyzer;
pub use completion::CompletionGateway;
pub use model::{AnalysisResult, AnalysisType, Branch, ComparisonResult, Sentiment, SentimentResult};
pub use provider::{AnthropicProvider, ChatRequest, ChatResponse, Provider, ProviderError};
pub use routes::AppState;

use axum::http::{HeaderValue, Method};
use axum::Router;
use polarity_common::config::{Config, CorsConfig};
use polarity_common::ResultExt;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;

/// Maximum accepted request body.
pub const MAX_BODY_BYTES: usize = 64 * 1024;

/// Build the server router with all routes and middleware.
pub fn build_router(state: AppState, cors: &CorsConfig) -> Router {
    routes::build_routes(state)
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(cors_layer(cors))
}

/// CORS policy from configuration: any origin, or a fixed allow-list.
pub fn cors_layer(cors: &CorsConfig) -> CorsLayer {
    let layer = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);

    if cors.allows_any() {
        return layer.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = cors
        .allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin.trim()) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring unparsable CORS origin");
                None
            }
        })
        .collect();

    layer.allow_origin(AllowOrigin::list(origins))
}

/// Start the server. The backend credential must already be configured.
pub async fn start_server(config: &Config) -> anyhow::Result<()> {
    let addr = config.socket_addr().context("network")?;

    let gateway = CompletionGateway::from_config(config).context("completion backend")?;
    tracing::info!(model = gateway.model(), "Completion backend ready");

    let router = build_router(AppState::new(Analyzer::new(gateway)), &config.cors);

    tracing::info!("Starting Polarity server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_start_server_requires_credential() {
        let err = start_server(&Config::default()).await.unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with("completion backend"), "{message}");
        assert!(message.contains("ANTHROPIC_API_KEY"));
    }

    #[tokio::test]
    async fn test_start_server_rejects_bad_bind_address() {
        let mut config = Config::default();
        config.network.bind = "not-an-ip".into();
        config.secrets.llm.anthropic = Some("sk-ant-test".into());

        let err = start_server(&config).await.unwrap_err();
        assert!(err.to_string().starts_with("network"));
    }
}
