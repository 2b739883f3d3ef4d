//! HTTP-backed service adapter
//!
//! Calls a remote AI provider over a small JSON protocol: the step's
//! structured request is posted as-is and the provider answers with a
//! structured response. Provider-side status codes are mapped onto the
//! adapter error taxonomy so steps only ever see retryability.

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::adapter::{AdapterError, AdapterRequest, AdapterResponse, ServiceAdapter};

/// HTTP adapter configuration.
#[derive(Debug, Clone)]
pub struct HttpAdapterConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
}

impl Default for HttpAdapterConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: "https://api.anthropic.com".to_string(),
            model: "claude-sonnet-4-20250514".to_string(),
            timeout: Duration::from_secs(60),
        }
    }
}

#[derive(Debug, Serialize)]
struct ProviderRequest<'a> {
    model: &'a str,
    request: &'a AdapterRequest,
}

#[derive(Debug, Deserialize)]
struct ProviderError {
    #[serde(default)]
    message: String,
}

/// Service adapter backed by an HTTP completion endpoint.
pub struct HttpCompletionAdapter {
    config: HttpAdapterConfig,
    client: Client,
}

impl HttpCompletionAdapter {
    pub fn new(config: HttpAdapterConfig) -> Result<Self, AdapterError> {
        if config.api_key.is_empty() {
            return Err(AdapterError::NotConfigured(
                "provider API key is required".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| AdapterError::Unavailable(e.to_string()))?;

        Ok(Self { config, client })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/workflow/invoke", self.config.base_url)
    }
}

#[async_trait::async_trait]
impl ServiceAdapter for HttpCompletionAdapter {
    fn name(&self) -> &str {
        "http"
    }

    async fn invoke(&self, request: AdapterRequest) -> Result<AdapterResponse, AdapterError> {
        let operation = request.operation();
        debug!(operation, model = %self.config.model, "invoking provider");

        let body = ProviderRequest {
            model: &self.config.model,
            request: &request,
        };

        let response = self
            .client
            .post(self.endpoint())
            .header("x-api-key", &self.config.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| AdapterError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response
                .json::<ProviderError>()
                .await
                .map(|e| e.message)
                .unwrap_or_default();
            return Err(map_error_status(status, operation, &detail));
        }

        let parsed: AdapterResponse = response
            .json()
            .await
            .map_err(|e| AdapterError::Malformed(format!("{operation}: {e}")))?;

        Ok(parsed)
    }
}

/// Map a provider HTTP status onto the adapter error taxonomy.
fn map_error_status(status: StatusCode, operation: &str, detail: &str) -> AdapterError {
    let message = format!("{operation}: provider returned {status} - {detail}");
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
        AdapterError::Unavailable(message)
    } else if status == StatusCode::UNPROCESSABLE_ENTITY || status == StatusCode::FORBIDDEN {
        // Provider declined the request itself (content policy, quota ban)
        AdapterError::Rejected(message)
    } else {
        AdapterError::Malformed(message)
    }
}
