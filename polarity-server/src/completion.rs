//! Completion gateway: one prompt in, raw model text out.

use crate::prompt::Prompt;
use crate::provider::{AnthropicProvider, ChatRequest, Message, Provider};
use polarity_common::config::{Config, LlmConfig};
use polarity_common::{Error, Result};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Process-wide handle on the completion backend.
///
/// Holds no conversation state: every call carries only its own prompt.
#[derive(Clone)]
pub struct CompletionGateway {
    provider: Arc<dyn Provider>,
    model: String,
    max_tokens: i64,
    temperature: f64,
    timeout: Duration,
}

impl CompletionGateway {
    /// Wrap a provider with the request settings from `llm`.
    pub fn new(provider: Arc<dyn Provider>, llm: &LlmConfig) -> Self {
        Self {
            provider,
            model: llm.model.clone(),
            max_tokens: llm.max_tokens,
            temperature: llm.temperature,
            timeout: Duration::from_secs(llm.timeout_secs),
        }
    }

    /// Build the Anthropic-backed gateway. Fails if no credential is configured.
    pub fn from_config(config: &Config) -> Result<Self> {
        let api_key = config.anthropic_api_key()?;
        let provider = AnthropicProvider::with_base_url(api_key, config.llm.base_url.clone());
        Ok(Self::new(Arc::new(provider), &config.llm))
    }

    /// Override the per-call timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send `prompt` and return the model's raw text. No retries.
    pub async fn complete(&self, prompt: &Prompt) -> Result<String> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![Message::user(prompt.user.clone())],
            max_tokens: Some(self.max_tokens),
            temperature: Some(self.temperature),
            system: prompt.system.clone(),
        };

        let start = Instant::now();
        let response = tokio::time::timeout(self.timeout, self.provider.chat(request))
            .await
            .map_err(|_| {
                tracing::error!(
                    provider = self.provider.name(),
                    timeout_secs = self.timeout.as_secs_f64(),
                    "Completion timed out"
                );
                Error::Backend(format!(
                    "{} did not respond within {:?}",
                    self.provider.name(),
                    self.timeout
                ))
            })?
            .map_err(|e| {
                tracing::error!(error = %e, auth = e.is_auth_failure(), "Completion failed");
                Error::Backend(e.to_string())
            })?;

        tracing::debug!(
            provider = %response.provider,
            model = %response.model,
            output_tokens = response.usage.output_tokens,
            latency_ms = start.elapsed().as_millis() as u64,
            "Completion received"
        );

        Ok(response.content)
    }
}
