//! Asset ranker step
//!
//! Fetches candidate content for the prospect's campaign and funnel room,
//! asks the service adapter for a relevance judgement, layers deterministic
//! rule-based boosts on top, and produces the ranked asset list. Ordering
//! is score-descending with ties broken by ascending asset id so repeated
//! runs over the same inputs rank identically.

use async_trait::async_trait;
use chrono::{Duration as ChronoDuration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

use crate::adapter::{AdapterRequest, AdapterResponse, AssetScore, ServiceAdapter};
use crate::assets::{AssetSource, AssetSourceError, ContentAsset};
use crate::error::{FailureKind, StepError};
use crate::state::{
    IntentSummary, ProspectRecord, RankedAsset, StateDelta, StateField, WorkflowState,
};
use crate::step::{adapter_failure, AgentStep, StepResult, ASSET_RANKER};

// Rule-based boost weights for attribute matches
const SERVICE_AREA_WEIGHT: f64 = 25.0;
const PERSONA_WEIGHT: f64 = 20.0;
const INDUSTRY_WEIGHT: f64 = 20.0;
const FORMAT_WEIGHT: f64 = 10.0;
const FRESHNESS_WEIGHT: f64 = 5.0;

/// Assets published within this window count as fresh.
const FRESHNESS_WINDOW_DAYS: i64 = 90;

pub struct AssetRanker {
    adapter: Arc<dyn ServiceAdapter>,
    source: Arc<dyn AssetSource>,
}

impl AssetRanker {
    pub fn new(adapter: Arc<dyn ServiceAdapter>, source: Arc<dyn AssetSource>) -> Self {
        Self { adapter, source }
    }
}

#[async_trait]
impl AgentStep for AssetRanker {
    fn name(&self) -> &str {
        ASSET_RANKER
    }

    async fn run(&self, state: &WorkflowState) -> StepResult {
        let prospect = &state.prospect;
        let Some(intent) = &state.intent_summary else {
            return Err(StepError::missing_precondition(StateField::IntentSummary));
        };

        let assets = self
            .source
            .fetch_assets(prospect.campaign_id, &prospect.current_room)
            .await
            .map_err(source_failure)?;

        if assets.is_empty() {
            warn!(
                prospect_id = prospect.id,
                campaign_id = prospect.campaign_id,
                room = %prospect.current_room,
                "no content assets available for ranking"
            );
            return Err(StepError::new(
                FailureKind::NoAssetsAvailable,
                format!(
                    "no assets for campaign {} in room `{}`",
                    prospect.campaign_id, prospect.current_room
                ),
            ));
        }

        info!(
            prospect_id = prospect.id,
            candidates = assets.len(),
            service_area = intent.service_area.as_deref().unwrap_or("unknown"),
            "ranking assets"
        );

        let request = AdapterRequest::ScoreAssets {
            prospect: prospect.clone(),
            intent: intent.clone(),
            assets: assets.clone(),
        };

        let scores = match self.adapter.invoke(request).await {
            Ok(AdapterResponse::AssetScores { scores }) => scores,
            Ok(other) => {
                return Err(StepError::new(
                    FailureKind::MalformedResponse,
                    format!("expected asset_scores response, got `{}`", other.operation()),
                ))
            }
            Err(err) => return Err(adapter_failure(err)),
        };

        let ranked = rank_assets(&assets, &scores, intent, prospect);

        info!(
            prospect_id = prospect.id,
            total = ranked.len(),
            top_asset = ranked.first().map(|a| a.title.as_str()).unwrap_or(""),
            "asset ranking complete"
        );

        Ok(StateDelta::assets(ranked))
    }
}

fn source_failure(err: AssetSourceError) -> StepError {
    if err.is_retryable() {
        StepError::new(FailureKind::ServiceUnavailable, err.to_string())
    } else {
        StepError::new(FailureKind::MalformedResponse, err.to_string())
    }
}

/// Combine adapter relevance with rule-based boosts and sort
/// deterministically. Assets the adapter did not score keep a zero
/// relevance baseline so the ordering stays total.
fn rank_assets(
    assets: &[ContentAsset],
    scores: &[AssetScore],
    intent: &IntentSummary,
    prospect: &ProspectRecord,
) -> Vec<RankedAsset> {
    let by_id: HashMap<u64, &AssetScore> = scores.iter().map(|s| (s.asset_id, s)).collect();

    let mut ranked: Vec<RankedAsset> = assets
        .iter()
        .map(|asset| {
            let (boost, mut reasons) = rule_boost(asset, intent, prospect);
            let relevance = match by_id.get(&asset.id) {
                Some(score) => {
                    let mut all = score.reasons.clone();
                    all.append(&mut reasons);
                    reasons = all;
                    score.relevance
                }
                None => 0.0,
            };
            RankedAsset {
                asset_id: asset.id,
                title: asset.title.clone(),
                url: asset.url.clone(),
                score: relevance + boost,
                match_reasons: reasons,
            }
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.asset_id.cmp(&b.asset_id))
    });
    ranked
}

/// Deterministic boost from prospect/intent attribute matches.
fn rule_boost(
    asset: &ContentAsset,
    intent: &IntentSummary,
    prospect: &ProspectRecord,
) -> (f64, Vec<String>) {
    let mut boost = 0.0;
    let mut reasons = Vec::new();

    if let (Some(area), Some(target)) = (&asset.service_area, &intent.service_area) {
        if area.eq_ignore_ascii_case(target) {
            boost += SERVICE_AREA_WEIGHT;
            reasons.push("service_area".to_string());
        }
    }
    if let (Some(persona), Some(title)) = (&asset.persona, &prospect.job_title) {
        if title.to_lowercase().contains(&persona.to_lowercase()) {
            boost += PERSONA_WEIGHT;
            reasons.push("persona".to_string());
        }
    }
    if let (Some(industry), Some(target)) = (&asset.industry, &prospect.industry) {
        if industry.eq_ignore_ascii_case(target) {
            boost += INDUSTRY_WEIGHT;
            reasons.push("industry".to_string());
        }
    }
    if let Some(content_type) = &asset.content_type {
        let wanted = content_type.to_lowercase();
        if prospect
            .page_visits
            .iter()
            .any(|visit| visit.to_lowercase().contains(&wanted))
        {
            boost += FORMAT_WEIGHT;
            reasons.push("format".to_string());
        }
    }
    if let Some(published_at) = asset.published_at {
        if Utc::now() - published_at <= ChronoDuration::days(FRESHNESS_WINDOW_DAYS) {
            boost += FRESHNESS_WEIGHT;
            reasons.push("freshness".to_string());
        }
    }

    (boost, reasons)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::mocks::{sample_assets, sample_prospect};

    fn intent() -> IntentSummary {
        IntentSummary {
            prospect_id: 45,
            service_area: Some("data-analytics".to_string()),
            pain_points: vec!["Data silos preventing analytics adoption".to_string()],
            confidence: 0.75,
        }
    }

    fn asset(id: u64) -> ContentAsset {
        ContentAsset {
            id,
            campaign_id: 1,
            room: "problem".to_string(),
            url: format!("https://example.com/blog/{id}"),
            title: format!("Asset {id}"),
            service_area: None,
            content_type: None,
            persona: None,
            industry: None,
            summary: None,
            published_at: None,
        }
    }

    #[test]
    fn test_ties_broken_by_ascending_id() {
        let assets = vec![asset(30), asset(10), asset(20)];
        let scores: Vec<AssetScore> = assets
            .iter()
            .map(|a| AssetScore {
                asset_id: a.id,
                relevance: 50.0,
                reasons: vec![],
            })
            .collect();

        let ranked = rank_assets(&assets, &scores, &intent(), &sample_prospect());
        let ids: Vec<u64> = ranked.iter().map(|a| a.asset_id).collect();
        assert_eq!(ids, vec![10, 20, 30]);
    }

    #[test]
    fn test_score_descending() {
        let assets = vec![asset(1), asset(2)];
        let scores = vec![
            AssetScore {
                asset_id: 1,
                relevance: 10.0,
                reasons: vec![],
            },
            AssetScore {
                asset_id: 2,
                relevance: 80.0,
                reasons: vec![],
            },
        ];

        let ranked = rank_assets(&assets, &scores, &intent(), &sample_prospect());
        assert_eq!(ranked[0].asset_id, 2);
        assert_eq!(ranked[0].score, 80.0);
        assert_eq!(ranked[1].asset_id, 1);
    }

    #[test]
    fn test_unscored_asset_gets_zero_baseline() {
        let assets = vec![asset(1), asset(2)];
        let scores = vec![AssetScore {
            asset_id: 1,
            relevance: 5.0,
            reasons: vec![],
        }];

        let ranked = rank_assets(&assets, &scores, &intent(), &sample_prospect());
        assert_eq!(ranked[1].asset_id, 2);
        assert_eq!(ranked[1].score, 0.0);
    }

    #[test]
    fn test_service_area_boost() {
        let mut matched = asset(1);
        matched.service_area = Some("data-analytics".to_string());
        let other = asset(2);

        let (boost, reasons) = rule_boost(&matched, &intent(), &sample_prospect());
        assert_eq!(boost, SERVICE_AREA_WEIGHT);
        assert_eq!(reasons, vec!["service_area"]);

        let (boost, _) = rule_boost(&other, &intent(), &sample_prospect());
        assert_eq!(boost, 0.0);
    }

    #[test]
    fn test_stacked_boosts() {
        let mut a = asset(1);
        a.service_area = Some("data-analytics".to_string());
        a.industry = Some("Healthcare".to_string());
        a.persona = Some("operations".to_string());

        // sample_prospect: industry Healthcare, job title "VP of Operations"
        let (boost, reasons) = rule_boost(&a, &intent(), &sample_prospect());
        assert_eq!(boost, SERVICE_AREA_WEIGHT + PERSONA_WEIGHT + INDUSTRY_WEIGHT);
        assert_eq!(reasons.len(), 3);
    }

    #[test]
    fn test_format_boost_from_page_visits() {
        let mut a = asset(1);
        a.content_type = Some("blog".to_string());

        // sample_prospect visited /blog/data-silos
        let (boost, reasons) = rule_boost(&a, &intent(), &sample_prospect());
        assert_eq!(boost, FORMAT_WEIGHT);
        assert_eq!(reasons, vec!["format"]);
    }

    #[test]
    fn test_freshness_boost() {
        let mut fresh = asset(1);
        fresh.published_at = Some(Utc::now() - ChronoDuration::days(10));
        let mut stale = asset(2);
        stale.published_at = Some(Utc::now() - ChronoDuration::days(400));

        let (boost, _) = rule_boost(&fresh, &intent(), &sample_prospect());
        assert_eq!(boost, FRESHNESS_WEIGHT);

        let (boost, _) = rule_boost(&stale, &intent(), &sample_prospect());
        assert_eq!(boost, 0.0);
    }

    #[tokio::test]
    async fn test_missing_intent_precondition() {
        use crate::testing::mocks::{MockAdapter, MockAssetSource};

        let adapter = Arc::new(MockAdapter::new());
        let source = Arc::new(MockAssetSource::with_assets(sample_assets()));
        let ranker = AssetRanker::new(adapter.clone(), source);

        let state = WorkflowState::new(sample_prospect());
        let err = ranker.run(&state).await.unwrap_err();

        assert_eq!(err.kind, FailureKind::MissingPrecondition);
        // No external call was attempted
        assert_eq!(adapter.call_count().await, 0);
    }
}
