//! Language-model provider abstraction.
//!
//! The pipeline only needs a text-completion capability. Providers translate
//! a unified request into their wire format and return the raw text.

mod anthropic;

pub use anthropic::AnthropicProvider;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

// ============================================================================
// Provider Trait
// ============================================================================

/// Unified interface for LLM providers.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Get the provider name.
    fn name(&self) -> &str;

    /// Send a chat completion request.
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse, ProviderError>;
}

/// Error from a provider.
#[derive(Debug, Clone)]
pub struct ProviderError {
    pub provider: String,
    pub model: String,
    pub message: String,
    pub status_code: Option<u16>,
}

impl ProviderError {
    /// Whether the backend rejected the credential.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self.status_code, Some(401 | 403))
    }
}

impl std::fmt::Display for ProviderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status_code {
            Some(status) => write!(
                f,
                "[{}:{}] {} (status {})",
                self.provider, self.model, self.message, status
            ),
            None => write!(f, "[{}:{}] {}", self.provider, self.model, self.message),
        }
    }
}

impl std::error::Error for ProviderError {}

// ============================================================================
// Request/Response Types
// ============================================================================

/// Unified chat request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    /// Model to use
    pub model: String,
    /// Messages in the conversation
    pub messages: Vec<Message>,
    /// Maximum tokens to generate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<i64>,
    /// Temperature (0.0 - 1.0)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// System prompt (if not in messages)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
}

/// A message in the conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: String,
    pub content: String,
}

impl Message {
    /// A user-role message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".into(),
            content: content.into(),
        }
    }
}

/// Unified chat response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    /// Provider name
    pub provider: String,
    /// Model used
    pub model: String,
    /// Response content
    pub content: String,
    /// Token usage
    pub usage: TokenUsage,
    /// Finish reason
    pub finish_reason: Option<String>,
    /// Response latency in milliseconds
    pub latency_ms: u64,
}

/// Token usage information.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: i64,
    pub output_tokens: i64,
    pub total_tokens: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_request_serialization() {
        let request = ChatRequest {
            model: "claude-sonnet-4-20250514".into(),
            messages: vec![Message::user("Analyze this text: great")],
            max_tokens: Some(1024),
            temperature: Some(0.0),
            system: None,
        };

        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("claude-sonnet-4-20250514"));
        assert!(json.contains("\"role\":\"user\""));
        assert!(!json.contains("system"));
    }

    #[test]
    fn test_provider_error_display() {
        let err = ProviderError {
            provider: "anthropic".into(),
            model: "claude-sonnet-4".into(),
            message: "API error: invalid x-api-key".into(),
            status_code: Some(401),
        };
        assert!(err.is_auth_failure());
        assert_eq!(
            err.to_string(),
            "[anthropic:claude-sonnet-4] API error: invalid x-api-key (status 401)"
        );
    }

    #[test]
    fn test_transport_error_is_not_auth_failure() {
        let err = ProviderError {
            provider: "anthropic".into(),
            model: "claude-sonnet-4".into(),
            message: "Request failed: connection refused".into(),
            status_code: None,
        };
        assert!(!err.is_auth_failure());
        assert!(!err.to_string().contains("status"));
    }
}
