//! Configuration loading and validation for Nimbus.
//!
//! Loads configuration from `nimbus.toml` (path overridable via the
//! `NIMBUS_CONFIG` environment variable) with environment variable
//! overrides matching the deployment environment (`LLM_BASE_URL`,
//! `MODEL_NAME`, `CLOUD_HELPER_URL`, `PORT`). Validates all settings
//! at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// The root configuration structure.
///
/// Maps directly to `nimbus.toml`.
#[derive(Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// LLM backend settings
    #[serde(default)]
    pub llm: LlmConfig,

    /// Orchestration loop settings
    #[serde(default)]
    pub agent: AgentConfig,

    /// Cloud helper service settings
    #[serde(default)]
    pub cloud: CloudConfig,

    /// Gateway settings
    #[serde(default)]
    pub gateway: GatewayConfig,
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("llm", &self.llm)
            .field("agent", &self.agent)
            .field("cloud", &self.cloud)
            .field("gateway", &self.gateway)
            .finish()
    }
}

/// LLM backend configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Base URL of the OpenAI-compatible endpoint
    #[serde(default = "default_llm_base_url")]
    pub base_url: String,

    /// API key; vLLM deployments typically need none
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Model name passed through to the backend
    #[serde(default = "default_model")]
    pub model: String,

    /// Max tokens per model response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Temperature for tool-decision rounds (0.0 = deterministic,
    /// minimizes spurious tool invocation)
    #[serde(default)]
    pub decision_temperature: f32,

    /// Temperature for the final streamed answer
    #[serde(default)]
    pub answer_temperature: f32,

    /// Whole-request timeout for model round-trips, in seconds
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("base_url", &self.base_url)
            .field("api_key", &redact(&self.api_key))
            .field("model", &self.model)
            .field("max_tokens", &self.max_tokens)
            .field("decision_temperature", &self.decision_temperature)
            .field("answer_temperature", &self.answer_temperature)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

fn default_llm_base_url() -> String {
    "http://vllm-llama3-service:8000/v1".into()
}
fn default_model() -> String {
    "meta-llama/Llama-3.1-8B-Instruct".into()
}
fn default_max_tokens() -> u32 {
    1024
}
fn default_request_timeout() -> u64 {
    120
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            base_url: default_llm_base_url(),
            api_key: None,
            model: default_model(),
            max_tokens: default_max_tokens(),
            decision_temperature: 0.0,
            answer_temperature: 0.0,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

/// Orchestration loop configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// How many retained messages are supplied to the model per turn
    #[serde(default = "default_history_window")]
    pub history_window: usize,

    /// How many messages a session retains before FIFO eviction
    #[serde(default = "default_retention_limit")]
    pub retention_limit: usize,

    /// Max resolve-then-respond rounds before the turn aborts
    #[serde(default = "default_max_tool_rounds")]
    pub max_tool_rounds: u32,

    /// Replace the built-in system prompt entirely
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt_override: Option<String>,
}

fn default_history_window() -> usize {
    10
}
fn default_retention_limit() -> usize {
    20
}
fn default_max_tool_rounds() -> u32 {
    5
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            history_window: default_history_window(),
            retention_limit: default_retention_limit(),
            max_tool_rounds: default_max_tool_rounds(),
            system_prompt_override: None,
        }
    }
}

/// Cloud helper service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CloudConfig {
    /// Base URL of the cloud-helper REST service
    #[serde(default = "default_helper_base_url")]
    pub helper_base_url: String,

    /// Project to query; the helper falls back to its own default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
}

fn default_helper_base_url() -> String {
    "http://gcp-helper-service:8080".into()
}

impl Default for CloudConfig {
    fn default() -> Self {
        Self {
            helper_base_url: default_helper_base_url(),
            project_id: None,
        }
    }
}

/// Gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    8001
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

impl AppConfig {
    /// Load configuration from the default path with env overrides.
    ///
    /// Environment variables (highest priority):
    /// - `LLM_BASE_URL`, `LLM_API_KEY`, `MODEL_NAME`
    /// - `CLOUD_HELPER_URL`
    /// - `PORT`
    pub fn load() -> Result<Self, ConfigError> {
        let path = std::env::var("NIMBUS_CONFIG")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("nimbus.toml"));
        let mut config = Self::load_from(&path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(url) = std::env::var("LLM_BASE_URL") {
            self.llm.base_url = url;
        }
        if let Ok(key) = std::env::var("LLM_API_KEY") {
            self.llm.api_key = Some(key);
        }
        if let Ok(model) = std::env::var("MODEL_NAME") {
            self.llm.model = model;
        }
        if let Ok(url) = std::env::var("CLOUD_HELPER_URL") {
            self.cloud.helper_base_url = url;
        }
        if let Ok(port) = std::env::var("PORT")
            && let Ok(port) = port.parse()
        {
            self.gateway.port = port;
        }
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.llm.decision_temperature)
            || !(0.0..=2.0).contains(&self.llm.answer_temperature)
        {
            return Err(ConfigError::ValidationError(
                "temperatures must be between 0.0 and 2.0".into(),
            ));
        }

        if self.agent.history_window == 0 {
            return Err(ConfigError::ValidationError(
                "agent.history_window must be at least 1".into(),
            ));
        }

        if self.agent.retention_limit < self.agent.history_window {
            return Err(ConfigError::ValidationError(
                "agent.retention_limit must be >= agent.history_window".into(),
            ));
        }

        if self.agent.max_tool_rounds == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_tool_rounds must be at least 1".into(),
            ));
        }

        Ok(())
    }

    /// Generate a default config TOML string.
    pub fn default_toml() -> String {
        toml::to_string_pretty(&Self::default()).unwrap_or_default()
    }
}
