//! Mock implementations for testing
//!
//! Provides a scriptable [`MockAdapter`] and [`MockAssetSource`] so steps
//! and the executor can be exercised without network access. The mock
//! adapter answers deterministically when no scripted outcome is queued,
//! mirroring what a well-behaved provider would return.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::adapter::{
    AdapterError, AdapterRequest, AdapterResponse, AssetScore, ServiceAdapter,
};
use crate::assets::{AssetSource, AssetSourceError, ContentAsset};
use crate::state::{GeneratedEmail, IntentSummary, ProspectRecord};

/// Mock service adapter.
///
/// Scripted outcomes are consumed first, one per call; once the script is
/// exhausted the adapter derives a deterministic success response from the
/// request itself. All requests are recorded for assertions.
#[derive(Default)]
pub struct MockAdapter {
    script: Mutex<VecDeque<Result<AdapterResponse, AdapterError>>>,
    calls: Arc<Mutex<Vec<AdapterRequest>>>,
    delay: Option<Duration>,
}

impl MockAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue outcomes to return before falling back to default behavior.
    pub fn with_outcomes(outcomes: Vec<Result<AdapterResponse, AdapterError>>) -> Self {
        Self {
            script: Mutex::new(outcomes.into()),
            ..Default::default()
        }
    }

    /// Sleep before answering each call; used to exercise timeouts and
    /// cancellation.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Default::default()
        }
    }

    pub async fn calls(&self) -> Vec<AdapterRequest> {
        self.calls.lock().await.clone()
    }

    pub async fn call_count(&self) -> usize {
        self.calls.lock().await.len()
    }

    fn default_response(request: &AdapterRequest) -> AdapterResponse {
        match request {
            AdapterRequest::AnalyzeIntent { prospect } => AdapterResponse::Intent {
                summary: default_intent(prospect),
            },
            AdapterRequest::ScoreAssets { assets, .. } => AdapterResponse::AssetScores {
                scores: assets
                    .iter()
                    .map(|asset| AssetScore {
                        asset_id: asset.id,
                        relevance: 50.0,
                        reasons: vec!["mock".to_string()],
                    })
                    .collect(),
            },
            AdapterRequest::ComposeEmail { prospect, assets } => AdapterResponse::Email {
                email: GeneratedEmail {
                    subject: format!(
                        "Resources for {}",
                        prospect.company_name.as_deref().unwrap_or("your team")
                    ),
                    body: assets
                        .iter()
                        .map(|asset| format!("- {} ({})", asset.title, asset.url))
                        .collect::<Vec<_>>()
                        .join("\n"),
                    asset_ids: assets.iter().map(|a| a.asset_id).collect(),
                    model: "mock".to_string(),
                    generated_at: Utc::now(),
                },
            },
        }
    }
}

#[async_trait]
impl ServiceAdapter for MockAdapter {
    fn name(&self) -> &str {
        "mock"
    }

    async fn invoke(&self, request: AdapterRequest) -> Result<AdapterResponse, AdapterError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.calls.lock().await.push(request.clone());

        if let Some(outcome) = self.script.lock().await.pop_front() {
            return outcome;
        }
        Ok(Self::default_response(&request))
    }
}

/// Deterministic intent profile derived from prospect firmographics.
fn default_intent(prospect: &ProspectRecord) -> IntentSummary {
    let industry = prospect
        .industry
        .as_deref()
        .unwrap_or_default()
        .to_lowercase();

    let (service_area, pain_points) = if industry.contains("health") {
        (
            "data-analytics",
            vec![
                "Data silos preventing analytics adoption".to_string(),
                "Compliance concerns with cloud migration".to_string(),
            ],
        )
    } else if industry.contains("finance") {
        (
            "cloud-migration",
            vec![
                "Legacy systems limiting innovation".to_string(),
                "High maintenance costs for on-premise infrastructure".to_string(),
            ],
        )
    } else {
        (
            "ai-development",
            vec![
                "AI experiments stuck in POC phase".to_string(),
                "Unclear roadmap for modernization".to_string(),
            ],
        )
    };

    IntentSummary {
        prospect_id: prospect.id,
        service_area: Some(service_area.to_string()),
        pain_points,
        confidence: 0.75,
    }
}

/// Mock asset source with a fixed candidate set or a scripted failure.
#[derive(Default)]
pub struct MockAssetSource {
    assets: Vec<ContentAsset>,
    failure: Option<AssetSourceError>,
    queries: Mutex<Vec<(u64, String)>>,
}

impl MockAssetSource {
    /// Source that returns an empty candidate set.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_assets(assets: Vec<ContentAsset>) -> Self {
        Self {
            assets,
            ..Default::default()
        }
    }

    pub fn with_failure(failure: AssetSourceError) -> Self {
        Self {
            failure: Some(failure),
            ..Default::default()
        }
    }

    pub async fn queries(&self) -> Vec<(u64, String)> {
        self.queries.lock().await.clone()
    }
}

#[async_trait]
impl AssetSource for MockAssetSource {
    async fn fetch_assets(
        &self,
        campaign_id: u64,
        room: &str,
    ) -> Result<Vec<ContentAsset>, AssetSourceError> {
        self.queries
            .lock()
            .await
            .push((campaign_id, room.to_string()));

        if let Some(failure) = &self.failure {
            return Err(failure.clone());
        }
        Ok(self.assets.clone())
    }
}

/// A representative prospect, matching the shape CMS webhooks deliver.
pub fn sample_prospect() -> ProspectRecord {
    ProspectRecord {
        id: 45,
        campaign_id: 1,
        company_name: Some("Acme Health Systems".to_string()),
        contact_name: Some("Sarah Johnson".to_string()),
        job_title: Some("VP of Operations".to_string()),
        industry: Some("Healthcare".to_string()),
        employee_count: Some("1001-5000".to_string()),
        lead_score: 35,
        current_room: "problem".to_string(),
        page_visits: vec![
            "/blog/data-silos".to_string(),
            "/blog/lakehouse-comparison".to_string(),
        ],
    }
}

/// A small content library for the sample prospect's campaign.
pub fn sample_assets() -> Vec<ContentAsset> {
    vec![
        ContentAsset {
            id: 301,
            campaign_id: 1,
            room: "problem".to_string(),
            url: "https://example.com/blog/data-silos".to_string(),
            title: "Drowning in Data Silos? 7 Red Flags to Watch For".to_string(),
            service_area: Some("data-analytics".to_string()),
            content_type: Some("blog".to_string()),
            persona: Some("operations".to_string()),
            industry: Some("Healthcare".to_string()),
            summary: None,
            published_at: None,
        },
        ContentAsset {
            id: 302,
            campaign_id: 1,
            room: "problem".to_string(),
            url: "https://example.com/blog/lakehouse-comparison".to_string(),
            title: "Data Lakehouse vs. Traditional Warehousing: Pros and Cons".to_string(),
            service_area: Some("data-analytics".to_string()),
            content_type: Some("blog".to_string()),
            persona: None,
            industry: None,
            summary: None,
            published_at: None,
        },
        ContentAsset {
            id: 201,
            campaign_id: 1,
            room: "problem".to_string(),
            url: "https://example.com/blog/data-center-budget".to_string(),
            title: "Is Your Data Center Draining Your Budget?".to_string(),
            service_area: Some("cloud-migration".to_string()),
            content_type: Some("blog".to_string()),
            persona: None,
            industry: None,
            summary: None,
            published_at: None,
        },
    ]
}
