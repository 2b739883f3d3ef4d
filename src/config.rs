//! Configuration for the DirectReach workflow service
//!
//! Everything the executor and adapters need is passed in explicitly at
//! construction; nothing reads ambient process state inside step logic.
//! Secrets are referenced by environment-variable name and resolved only
//! when a component is built.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

use crate::graph::{BackoffStrategy, RetryPolicy};

/// Main service configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppConfig {
    pub service: ServiceSection,
    pub cms: CmsSection,
    pub llm: LlmSection,
    #[serde(default)]
    pub pipeline: PipelineSection,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ServiceSection {
    /// Service identifier (must match [a-zA-Z0-9._-]+)
    pub id: String,
    pub description: String,
    /// Port for the webhook/health HTTP server
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_port() -> u16 {
    8080
}

/// CMS integration (asset source and webhook origin).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CmsSection {
    pub base_url: String,
    /// Environment variable containing the CMS API key
    pub api_key_env: String,
    #[serde(default = "default_cms_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_cms_timeout_secs() -> u64 {
    30
}

/// AI provider backing the service adapter.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LlmSection {
    /// Provider name (e.g. "anthropic", "gemini")
    pub provider: String,
    pub model: String,
    /// Environment variable containing the API key
    pub api_key_env: String,
    /// Optional base URL override (for proxies and tests)
    pub base_url: Option<String>,
}

/// Shape of delay growth between retries.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum BackoffKind {
    None,
    Fixed,
    #[default]
    Exponential,
}

/// Executor knobs: per-node retry cap, timeout, and email asset selection.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PipelineSection {
    /// Attempts allowed per node, including the first (default: 3)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Per-node timeout in milliseconds (default: 30000)
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Assets handed to the email generator (default: 3)
    #[serde(default = "default_top_asset_count")]
    pub top_asset_count: usize,
    #[serde(default)]
    pub backoff: BackoffKind,
    /// Base delay for fixed/exponential backoff (default: 250)
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
}

fn default_max_retries() -> u32 {
    3
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_top_asset_count() -> usize {
    3
}

fn default_backoff_base_ms() -> u64 {
    250
}

impl Default for PipelineSection {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            timeout_ms: default_timeout_ms(),
            top_asset_count: default_top_asset_count(),
            backoff: BackoffKind::default(),
            backoff_base_ms: default_backoff_base_ms(),
        }
    }
}

impl PipelineSection {
    pub fn retry_policy(&self) -> RetryPolicy {
        let base = Duration::from_millis(self.backoff_base_ms);
        let backoff = match self.backoff {
            BackoffKind::None => BackoffStrategy::None,
            BackoffKind::Fixed => BackoffStrategy::Fixed(base),
            BackoffKind::Exponential => BackoffStrategy::Exponential { base },
        };
        RetryPolicy {
            max_attempts: self.max_retries,
            backoff,
        }
    }

    pub fn node_timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_retries == 0 {
            return Err(ConfigError::InvalidConfig(
                "pipeline.max_retries must be at least 1".to_string(),
            ));
        }
        if self.timeout_ms == 0 {
            return Err(ConfigError::InvalidConfig(
                "pipeline.timeout_ms must be positive".to_string(),
            ));
        }
        if self.top_asset_count == 0 {
            return Err(ConfigError::InvalidConfig(
                "pipeline.top_asset_count must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Configuration loading errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),
    #[error("Failed to parse TOML: {0}")]
    TomlParse(#[from] toml::de::Error),
    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),
    #[error("Invalid service ID format: {0}")]
    InvalidServiceId(String),
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl AppConfig {
    /// Load configuration from a TOML file and validate it.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&content)?;

        validate_service_id(&config.service.id)?;
        config.pipeline.validate()?;

        Ok(config)
    }

    fn get_env_var_required(env_var_name: &str) -> Result<String, ConfigError> {
        std::env::var(env_var_name)
            .map_err(|_| ConfigError::EnvVarNotFound(env_var_name.to_string()))
    }

    /// Resolve the AI-provider API key at component build time.
    pub fn get_llm_api_key(&self) -> Result<String, ConfigError> {
        Self::get_env_var_required(&self.llm.api_key_env)
    }

    /// Resolve the CMS API key at component build time.
    pub fn get_cms_api_key(&self) -> Result<String, ConfigError> {
        Self::get_env_var_required(&self.cms.api_key_env)
    }

    pub fn cms_timeout(&self) -> Duration {
        Duration::from_secs(self.cms.timeout_secs)
    }

    /// Create a test configuration for unit testing
    #[cfg(test)]
    pub fn test_config() -> Self {
        let toml_content = r#"
[service]
id = "test-service"
description = "A test workflow service"

[cms]
base_url = "https://example.com"
api_key_env = "CMS_API_KEY"

[llm]
provider = "anthropic"
model = "claude-sonnet-4-20250514"
api_key_env = "ANTHROPIC_API_KEY"
"#;
        toml::from_str(toml_content).expect("Test config should parse")
    }
}

fn validate_service_id(service_id: &str) -> Result<(), ConfigError> {
    let valid_chars = service_id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '.' || c == '_' || c == '-');

    if service_id.is_empty() || !valid_chars {
        return Err(ConfigError::InvalidServiceId(format!(
            "Service ID '{service_id}' must match pattern [a-zA-Z0-9._-]+"
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_config_parses() {
        let toml_content = r#"
[service]
id = "directreach-workflow"
description = "Email generation workflow"
port = 9000

[cms]
base_url = "https://cms.example.com"
api_key_env = "CMS_API_KEY"
timeout_secs = 10

[llm]
provider = "anthropic"
model = "claude-sonnet-4-20250514"
api_key_env = "ANTHROPIC_API_KEY"

[pipeline]
max_retries = 5
timeout_ms = 15000
top_asset_count = 2
backoff = "fixed"
backoff_base_ms = 100
"#;

        let config: AppConfig = toml::from_str(toml_content).unwrap();
        assert_eq!(config.service.id, "directreach-workflow");
        assert_eq!(config.service.port, 9000);
        assert_eq!(config.cms.timeout_secs, 10);
        assert_eq!(config.pipeline.max_retries, 5);
        assert_eq!(config.pipeline.top_asset_count, 2);
        assert_eq!(config.pipeline.backoff, BackoffKind::Fixed);
    }

    #[test]
    fn test_pipeline_defaults() {
        let config = AppConfig::test_config();
        assert_eq!(config.pipeline.max_retries, 3);
        assert_eq!(config.pipeline.timeout_ms, 30_000);
        assert_eq!(config.pipeline.top_asset_count, 3);
        assert_eq!(config.pipeline.backoff, BackoffKind::Exponential);
        assert_eq!(config.service.port, 8080);
    }

    #[test]
    fn test_retry_policy_conversion() {
        let section = PipelineSection {
            max_retries: 4,
            timeout_ms: 5000,
            top_asset_count: 3,
            backoff: BackoffKind::Fixed,
            backoff_base_ms: 100,
        };

        let policy = section.retry_policy();
        assert_eq!(policy.max_attempts, 4);
        assert_eq!(
            policy.backoff,
            BackoffStrategy::Fixed(Duration::from_millis(100))
        );
        assert_eq!(section.node_timeout(), Duration::from_millis(5000));
    }

    #[test]
    fn test_zero_retries_rejected() {
        let section = PipelineSection {
            max_retries: 0,
            ..Default::default()
        };
        assert!(section.validate().is_err());
    }

    #[test]
    fn test_invalid_service_id() {
        assert!(validate_service_id("invalid@service").is_err());
        assert!(validate_service_id("").is_err());
        assert!(validate_service_id("valid-service_123.test").is_ok());
    }
}
