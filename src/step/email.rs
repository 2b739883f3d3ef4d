//! Email generator step
//!
//! Selects the top-N ranked assets and asks the service adapter for a
//! personalized draft. Provider content-policy refusals surface as
//! `GenerationRejected` and are never retried.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use crate::adapter::{AdapterError, AdapterRequest, AdapterResponse, ServiceAdapter};
use crate::error::{FailureKind, StepError};
use crate::state::{StateDelta, StateField, WorkflowState};
use crate::step::{adapter_failure, AgentStep, StepResult, EMAIL_GENERATOR};

pub struct EmailGenerator {
    adapter: Arc<dyn ServiceAdapter>,
    top_asset_count: usize,
}

impl EmailGenerator {
    pub fn new(adapter: Arc<dyn ServiceAdapter>, top_asset_count: usize) -> Self {
        Self {
            adapter,
            top_asset_count,
        }
    }
}

#[async_trait]
impl AgentStep for EmailGenerator {
    fn name(&self) -> &str {
        EMAIL_GENERATOR
    }

    async fn run(&self, state: &WorkflowState) -> StepResult {
        let prospect = &state.prospect;
        let Some(ranked) = &state.ranked_assets else {
            return Err(StepError::missing_precondition(StateField::RankedAssets));
        };
        if ranked.is_empty() {
            return Err(StepError::missing_precondition(StateField::RankedAssets));
        }

        let selection: Vec<_> = ranked
            .iter()
            .take(self.top_asset_count)
            .cloned()
            .collect();

        info!(
            prospect_id = prospect.id,
            selected = selection.len(),
            top_asset = %selection[0].title,
            "generating email"
        );

        let request = AdapterRequest::ComposeEmail {
            prospect: prospect.clone(),
            assets: selection,
        };

        let email = match self.adapter.invoke(request).await {
            Ok(AdapterResponse::Email { email }) => email,
            Ok(other) => {
                return Err(StepError::new(
                    FailureKind::MalformedResponse,
                    format!("expected email response, got `{}`", other.operation()),
                ))
            }
            Err(AdapterError::Rejected(detail)) => {
                return Err(StepError::new(FailureKind::GenerationRejected, detail))
            }
            Err(err) => return Err(adapter_failure(err)),
        };

        if email.subject.trim().is_empty() || email.body.trim().is_empty() {
            return Err(StepError::new(
                FailureKind::MalformedResponse,
                "provider returned an empty draft",
            ));
        }

        info!(
            prospect_id = prospect.id,
            subject = %email.subject,
            referenced_assets = email.asset_ids.len(),
            "email generation complete"
        );

        Ok(StateDelta::email(email))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{RankedAsset, StateDelta};
    use crate::testing::mocks::{sample_prospect, MockAdapter};

    fn ranked(count: usize) -> Vec<RankedAsset> {
        (1..=count as u64)
            .map(|id| RankedAsset {
                asset_id: id,
                title: format!("Asset {id}"),
                url: format!("https://example.com/blog/{id}"),
                score: 100.0 - id as f64,
                match_reasons: vec!["service_area".to_string()],
            })
            .collect()
    }

    fn state_with_assets(count: usize) -> WorkflowState {
        let mut state = WorkflowState::new(sample_prospect());
        state.apply(StateDelta::assets(ranked(count))).unwrap();
        state
    }

    #[tokio::test]
    async fn test_missing_ranked_assets_precondition() {
        let adapter = Arc::new(MockAdapter::new());
        let step = EmailGenerator::new(adapter.clone(), 3);
        let state = WorkflowState::new(sample_prospect());

        let err = step.run(&state).await.unwrap_err();
        assert_eq!(err.kind, FailureKind::MissingPrecondition);
        assert_eq!(adapter.call_count().await, 0);
    }

    #[tokio::test]
    async fn test_selects_top_n_assets() {
        let adapter = Arc::new(MockAdapter::new());
        let step = EmailGenerator::new(adapter.clone(), 2);
        let state = state_with_assets(5);

        let delta = step.run(&state).await.unwrap();
        assert!(delta.generated_email.is_some());

        let calls = adapter.calls().await;
        assert_eq!(calls.len(), 1);
        match &calls[0] {
            AdapterRequest::ComposeEmail { assets, .. } => {
                assert_eq!(assets.len(), 2);
                assert_eq!(assets[0].asset_id, 1);
            }
            other => panic!("unexpected request: {}", other.operation()),
        }
    }

    #[tokio::test]
    async fn test_fewer_assets_than_top_n() {
        let adapter = Arc::new(MockAdapter::new());
        let step = EmailGenerator::new(adapter.clone(), 5);
        let state = state_with_assets(2);

        step.run(&state).await.unwrap();
        match &adapter.calls().await[0] {
            AdapterRequest::ComposeEmail { assets, .. } => assert_eq!(assets.len(), 2),
            other => panic!("unexpected request: {}", other.operation()),
        }
    }

    #[tokio::test]
    async fn test_rejection_maps_to_generation_rejected() {
        let adapter = Arc::new(MockAdapter::with_outcomes(vec![Err(
            AdapterError::Rejected("content policy".to_string()),
        )]));
        let step = EmailGenerator::new(adapter, 3);
        let state = state_with_assets(3);

        let err = step.run(&state).await.unwrap_err();
        assert_eq!(err.kind, FailureKind::GenerationRejected);
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_unavailable_is_retryable() {
        let adapter = Arc::new(MockAdapter::with_outcomes(vec![Err(
            AdapterError::Unavailable("overloaded".to_string()),
        )]));
        let step = EmailGenerator::new(adapter, 3);
        let state = state_with_assets(3);

        let err = step.run(&state).await.unwrap_err();
        assert_eq!(err.kind, FailureKind::ServiceUnavailable);
        assert!(err.is_retryable());
    }
}
