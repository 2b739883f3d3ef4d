//! External service adapter boundary
//!
//! Adapters translate a step's structured request into an external AI
//! provider call and back, isolating provider protocol detail from step
//! logic. Any provider can be substituted behind [`ServiceAdapter`] without
//! touching the steps.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::assets::ContentAsset;
use crate::state::{GeneratedEmail, IntentSummary, ProspectRecord, RankedAsset};

pub mod http;

pub use http::{HttpAdapterConfig, HttpCompletionAdapter};

/// Structured request issued by an agent step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum AdapterRequest {
    /// Extract an intent profile from prospect signal data.
    AnalyzeIntent { prospect: ProspectRecord },
    /// Score candidate assets against an intent profile.
    ScoreAssets {
        prospect: ProspectRecord,
        intent: IntentSummary,
        assets: Vec<ContentAsset>,
    },
    /// Compose a draft email referencing the top-ranked assets.
    ComposeEmail {
        prospect: ProspectRecord,
        assets: Vec<RankedAsset>,
    },
}

impl AdapterRequest {
    /// Operation name for logging and error messages.
    pub fn operation(&self) -> &'static str {
        match self {
            Self::AnalyzeIntent { .. } => "analyze_intent",
            Self::ScoreAssets { .. } => "score_assets",
            Self::ComposeEmail { .. } => "compose_email",
        }
    }
}

/// Per-asset relevance judgement returned by the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetScore {
    pub asset_id: u64,
    pub relevance: f64,
    #[serde(default)]
    pub reasons: Vec<String>,
}

/// Structured response handed back to the calling step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operation", rename_all = "snake_case")]
pub enum AdapterResponse {
    Intent { summary: IntentSummary },
    AssetScores { scores: Vec<AssetScore> },
    Email { email: GeneratedEmail },
}

impl AdapterResponse {
    pub fn operation(&self) -> &'static str {
        match self {
            Self::Intent { .. } => "intent",
            Self::AssetScores { .. } => "asset_scores",
            Self::Email { .. } => "email",
        }
    }
}

/// Adapter-boundary errors. Retryability is carried here so steps need not
/// know provider specifics.
#[derive(Debug, Clone, Error)]
pub enum AdapterError {
    #[error("adapter not configured: {0}")]
    NotConfigured(String),
    #[error("service unavailable: {0}")]
    Unavailable(String),
    #[error("malformed provider response: {0}")]
    Malformed(String),
    #[error("request rejected by provider: {0}")]
    Rejected(String),
}

impl AdapterError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// Boundary interface each agent step uses to call a remote AI provider.
///
/// Implementations are stateless between invocations; all request context
/// travels in the [`AdapterRequest`].
#[async_trait]
pub trait ServiceAdapter: Send + Sync {
    /// Provider name for logging (e.g. "anthropic", "gemini", "mock").
    fn name(&self) -> &str;

    async fn invoke(&self, request: AdapterRequest) -> Result<AdapterResponse, AdapterError>;
}
