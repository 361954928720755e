//! Configuration management for Polarity services.
//!
//! Configuration lives in `~/.polarity/config.json`. The path can be
//! overridden with `POLARITY_CONFIG`.
//!
//! # Configuration Priority
//!
//! 1. Environment variables (including a `.env` file, if present)
//! 2. Explicit config file values
//! 3. Default values
//!
//! # Environment Variable Mapping
//!
//! - `POLARITY_PORT` → network.port
//! - `POLARITY_BIND_ADDRESS` → network.bind
//! - `POLARITY_LOG_LEVEL` → observability.log_level
//! - `POLARITY_LOG_FORMAT` → observability.log_format
//! - `POLARITY_MODEL` → llm.model
//! - `POLARITY_CORS_ORIGINS` → cors.allowed_origins (comma-separated)
//! - `ANTHROPIC_API_KEY` → secrets.llm.anthropic

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};

use crate::error::Error;

/// Get the configuration directory path.
pub fn config_dir() -> PathBuf {
    directories::UserDirs::new().map_or_else(
        || PathBuf::from(".polarity"),
        |dirs| dirs.home_dir().join(".polarity"),
    )
}

/// Get the configuration file path.
pub fn config_path() -> PathBuf {
    std::env::var("POLARITY_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| config_dir().join("config.json"))
}

// ============================================================================
// Network Configuration
// ============================================================================

/// Listener configuration for the HTTP server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Bind address. Default: "127.0.0.1" (local only).
    /// Set to "0.0.0.0" for remote access.
    #[serde(default = "default_bind_address")]
    pub bind: String,

    /// Listen port.
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            bind: default_bind_address(),
            port: default_port(),
        }
    }
}

fn default_bind_address() -> String {
    "127.0.0.1".into()
}

fn default_port() -> u16 {
    8000
}

// ============================================================================
// Secrets Configuration
// ============================================================================

/// Grouped secrets configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct SecretsConfig {
    /// Language-model backend credentials
    #[serde(default)]
    pub llm: LlmSecretsConfig,
}

/// Language-model API keys.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct LlmSecretsConfig {
    /// Anthropic API key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anthropic: Option<String>,
}

// ============================================================================
// LLM Configuration
// ============================================================================

/// Completion backend settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Model identifier sent with every completion request
    #[serde(default = "default_llm_model")]
    pub model: String,

    /// Backend base URL
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,

    /// Maximum tokens to generate per call
    #[serde(default = "default_max_tokens")]
    pub max_tokens: i64,

    /// Sampling temperature. 0.0 is the most deterministic setting.
    #[serde(default)]
    pub temperature: f64,

    /// Upper bound on a single backend call, in seconds
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: default_llm_model(),
            base_url: default_llm_base_url(),
            max_tokens: default_max_tokens(),
            temperature: 0.0,
            timeout_secs: default_llm_timeout(),
        }
    }
}

fn default_llm_model() -> String {
    "claude-sonnet-4-20250514".into()
}

fn default_llm_base_url() -> String {
    "https://api.anthropic.com".into()
}

fn default_max_tokens() -> i64 {
    1024
}

fn default_llm_timeout() -> u64 {
    60
}

// ============================================================================
// CORS Configuration
// ============================================================================

/// Cross-origin policy for the HTTP surface.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CorsConfig {
    /// Allowed origins. Empty, or containing `*`, permits every origin.
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

impl CorsConfig {
    /// Whether every origin is permitted.
    pub fn allows_any(&self) -> bool {
        self.allowed_origins.is_empty() || self.allowed_origins.iter().any(|o| o.trim() == "*")
    }
}

// ============================================================================
// Observability Configuration
// ============================================================================

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level", alias = "level")]
    pub log_level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format", alias = "format")]
    pub log_format: String,

    /// Additional module targets pinned to `warn`.
    #[serde(default)]
    pub excluded_targets: Vec<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
            excluded_targets: Vec::new(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "pretty".into()
}

// ============================================================================
// Root Configuration
// ============================================================================

/// Root configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// JSON Schema reference
    #[serde(rename = "$schema", default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    #[serde(default)]
    pub network: NetworkConfig,

    #[serde(default)]
    pub secrets: SecretsConfig,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub cors: CorsConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from the default path.
    pub fn load() -> Result<Self> {
        let path = config_path();
        if !path.exists() {
            tracing::info!("Config file not found, using defaults");
            return Ok(Self::default());
        }

        Self::load_from(&path)
    }

    /// Load configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Load configuration with `.env` and environment variable overrides.
    pub fn load_with_env() -> Result<Self> {
        // A missing .env file is the normal case in production.
        if let Ok(path) = dotenvy::dotenv() {
            tracing::debug!(path = %path.display(), "Loaded .env file");
        }

        let mut config = Self::load()?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary variable source.
    pub fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = lookup("POLARITY_PORT") {
            match port.parse() {
                Ok(p) => self.network.port = p,
                Err(_) => tracing::warn!(value = %port, "Ignoring invalid POLARITY_PORT"),
            }
        }

        if let Some(bind) = lookup("POLARITY_BIND_ADDRESS") {
            self.network.bind = bind;
        }

        if let Some(level) = lookup("POLARITY_LOG_LEVEL") {
            self.observability.log_level = level;
        }

        if let Some(format) = lookup("POLARITY_LOG_FORMAT") {
            self.observability.log_format = format;
        }

        if let Some(model) = lookup("POLARITY_MODEL") {
            self.llm.model = model;
        }

        if let Some(origins) = lookup("POLARITY_CORS_ORIGINS") {
            self.cors.allowed_origins = origins
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(String::from)
                .collect();
        }

        if let Some(key) = lookup("ANTHROPIC_API_KEY") {
            self.secrets.llm.anthropic = Some(key);
        }
    }

    /// The backend credential. Absence is a startup failure.
    pub fn anthropic_api_key(&self) -> crate::Result<String> {
        match self.secrets.llm.anthropic.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => Ok(key.to_string()),
            _ => Err(Error::Config(
                "ANTHROPIC_API_KEY is not set (secrets.llm.anthropic)".into(),
            )),
        }
    }

    /// Socket address the server listens on.
    pub fn socket_addr(&self) -> crate::Result<SocketAddr> {
        let ip: IpAddr = self.network.bind.parse().map_err(|_| {
            Error::Config(format!("Invalid bind address: {}", self.network.bind))
        })?;
        Ok(SocketAddr::from((ip, self.network.port)))
    }
}
