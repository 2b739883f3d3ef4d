//! Lead intent summarizer step
//!
//! Consumes the prospect record and produces an intent profile (service
//! area, pain points, confidence) by querying the service adapter with the
//! prospect's signal data.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use crate::adapter::{AdapterRequest, AdapterResponse, ServiceAdapter};
use crate::error::{FailureKind, StepError};
use crate::state::{StateDelta, WorkflowState};
use crate::step::{adapter_failure, AgentStep, StepResult, INTENT_SUMMARIZER};

pub struct IntentSummarizer {
    adapter: Arc<dyn ServiceAdapter>,
}

impl IntentSummarizer {
    pub fn new(adapter: Arc<dyn ServiceAdapter>) -> Self {
        Self { adapter }
    }
}

#[async_trait]
impl AgentStep for IntentSummarizer {
    fn name(&self) -> &str {
        INTENT_SUMMARIZER
    }

    async fn run(&self, state: &WorkflowState) -> StepResult {
        // The prospect is present by construction; no further preconditions.
        let prospect = &state.prospect;

        info!(
            prospect_id = prospect.id,
            signal_count = prospect.page_visits.len(),
            "analyzing intent"
        );

        let request = AdapterRequest::AnalyzeIntent {
            prospect: prospect.clone(),
        };

        let summary = match self.adapter.invoke(request).await {
            Ok(AdapterResponse::Intent { summary }) => summary,
            Ok(other) => {
                return Err(StepError::new(
                    FailureKind::MalformedResponse,
                    format!("expected intent response, got `{}`", other.operation()),
                ))
            }
            Err(err) => return Err(adapter_failure(err)),
        };

        if !(0.0..=1.0).contains(&summary.confidence) {
            return Err(StepError::new(
                FailureKind::MalformedResponse,
                format!("confidence {} outside [0.0, 1.0]", summary.confidence),
            ));
        }
        if summary.prospect_id != prospect.id {
            return Err(StepError::new(
                FailureKind::MalformedResponse,
                format!(
                    "summary references prospect {} but run is for {}",
                    summary.prospect_id, prospect.id
                ),
            ));
        }

        info!(
            prospect_id = prospect.id,
            service_area = summary.service_area.as_deref().unwrap_or("unknown"),
            pain_point_count = summary.pain_points.len(),
            confidence = summary.confidence,
            "intent analysis complete"
        );

        Ok(StateDelta::intent(summary))
    }
}
