//! Content-asset source boundary
//!
//! The asset ranker pulls candidate content from an external collaborator
//! (the CMS) through [`AssetSource`]. [`CmsAssetSource`] is the production
//! implementation against the DirectReach REST API.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

/// Candidate content asset as served by the CMS.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentAsset {
    pub id: u64,
    pub campaign_id: u64,
    /// Funnel room this asset belongs to ("problem", "solution", "offer").
    pub room: String,
    pub url: String,
    pub title: String,
    #[serde(default)]
    pub service_area: Option<String>,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub persona: Option<String>,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub published_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Error)]
pub enum AssetSourceError {
    #[error("asset source unavailable: {0}")]
    Unavailable(String),
    #[error("asset source returned invalid data: {0}")]
    InvalidData(String),
}

impl AssetSourceError {
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }
}

/// Source of candidate content assets for one campaign and funnel room.
#[async_trait]
pub trait AssetSource: Send + Sync {
    async fn fetch_assets(
        &self,
        campaign_id: u64,
        room: &str,
    ) -> Result<Vec<ContentAsset>, AssetSourceError>;
}

/// Asset source backed by the DirectReach CMS REST API.
pub struct CmsAssetSource {
    base_url: String,
    api_key: String,
    client: Client,
}

impl CmsAssetSource {
    pub fn new(
        base_url: String,
        api_key: String,
        timeout: Duration,
    ) -> Result<Self, AssetSourceError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AssetSourceError::Unavailable(e.to_string()))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            client,
        })
    }
}

#[async_trait]
impl AssetSource for CmsAssetSource {
    async fn fetch_assets(
        &self,
        campaign_id: u64,
        room: &str,
    ) -> Result<Vec<ContentAsset>, AssetSourceError> {
        let url = format!(
            "{}/wp-json/directreach/v1/content-links",
            self.base_url
        );
        debug!(campaign_id, room, "fetching content links");

        let response = self
            .client
            .get(&url)
            .header("X-API-Key", &self.api_key)
            .query(&[("campaign_id", campaign_id.to_string()), ("room", room.to_string())])
            .send()
            .await
            .map_err(|e| AssetSourceError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return if status.is_server_error() {
                Err(AssetSourceError::Unavailable(format!("{status} - {detail}")))
            } else {
                Err(AssetSourceError::InvalidData(format!("{status} - {detail}")))
            };
        }

        response
            .json::<Vec<ContentAsset>>()
            .await
            .map_err(|e| AssetSourceError::InvalidData(e.to_string()))
    }
}
