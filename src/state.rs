//! Shared workflow state threaded between agent steps
//!
//! [`WorkflowState`] is the single record every node reads from and writes
//! to. Steps never mutate it directly: they return a [`StateDelta`] and the
//! executor applies it, enforcing the field-level write-once invariant.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::error::FailureKind;

/// Immutable prospect input, created once per run from the webhook payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProspectRecord {
    pub id: u64,
    pub campaign_id: u64,
    #[serde(default)]
    pub company_name: Option<String>,
    #[serde(default)]
    pub contact_name: Option<String>,
    #[serde(default)]
    pub job_title: Option<String>,
    #[serde(default)]
    pub industry: Option<String>,
    #[serde(default)]
    pub employee_count: Option<String>,
    #[serde(default)]
    pub lead_score: u32,
    /// Funnel position the prospect is currently in ("problem", "solution", "offer").
    #[serde(default = "default_room")]
    pub current_room: String,
    /// Raw page-visit signal data reported by the CMS.
    #[serde(default)]
    pub page_visits: Vec<String>,
}

fn default_room() -> String {
    "problem".to_string()
}

/// Webhook payload deserialization failure.
#[derive(Debug, Error)]
#[error("invalid payload: {0}")]
pub struct InvalidPayload(pub String);

impl ProspectRecord {
    /// Deserialize a webhook payload into a prospect record.
    ///
    /// Fails with [`InvalidPayload`] when required fields (`id`,
    /// `campaign_id`) are missing or malformed.
    pub fn from_payload(payload: serde_json::Value) -> Result<Self, InvalidPayload> {
        serde_json::from_value(payload).map_err(|e| InvalidPayload(e.to_string()))
    }
}

/// Intent profile extracted from prospect signal data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentSummary {
    pub prospect_id: u64,
    pub service_area: Option<String>,
    pub pain_points: Vec<String>,
    /// Recommendation quality, 0.0 to 1.0.
    pub confidence: f32,
}

/// Content asset with its relevance score for one prospect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedAsset {
    pub asset_id: u64,
    pub title: String,
    pub url: String,
    pub score: f64,
    pub match_reasons: Vec<String>,
}

/// Draft email produced by the final pipeline node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedEmail {
    pub subject: String,
    pub body: String,
    /// Assets referenced by the draft, best match first.
    pub asset_ids: Vec<u64>,
    pub model: String,
    pub generated_at: DateTime<Utc>,
}

/// Fields of [`WorkflowState`] that nodes declare as inputs and outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StateField {
    Prospect,
    IntentSummary,
    RankedAssets,
    GeneratedEmail,
}

impl fmt::Display for StateField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Prospect => "prospect",
            Self::IntentSummary => "intent_summary",
            Self::RankedAssets => "ranked_assets",
            Self::GeneratedEmail => "generated_email",
        };
        f.write_str(name)
    }
}

/// One recorded step-level failure, in the order it occurred.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepFailure {
    pub node: String,
    pub kind: FailureKind,
    pub detail: String,
    /// Attempt number the failure occurred on (1-based, 0 for pre-run gates).
    pub attempt: u32,
    pub at: DateTime<Utc>,
}

/// Attempt to populate an already-populated field. Always fatal to the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("state conflict: field `{field}` is already populated")]
pub struct StateConflict {
    pub field: StateField,
}

/// State changes produced by a successful step invocation.
///
/// A delta carries only the fields the step populated; the executor merges
/// it into the run's [`WorkflowState`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateDelta {
    pub intent_summary: Option<IntentSummary>,
    pub ranked_assets: Option<Vec<RankedAsset>>,
    pub generated_email: Option<GeneratedEmail>,
}

impl StateDelta {
    pub fn intent(summary: IntentSummary) -> Self {
        Self {
            intent_summary: Some(summary),
            ..Default::default()
        }
    }

    pub fn assets(assets: Vec<RankedAsset>) -> Self {
        Self {
            ranked_assets: Some(assets),
            ..Default::default()
        }
    }

    pub fn email(email: GeneratedEmail) -> Self {
        Self {
            generated_email: Some(email),
            ..Default::default()
        }
    }
}

/// The shared, mutable record passed between nodes.
///
/// Created by the executor at run start and owned exclusively by it for the
/// run's duration. Each optional field is populated at most once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowState {
    pub prospect: ProspectRecord,
    pub intent_summary: Option<IntentSummary>,
    pub ranked_assets: Option<Vec<RankedAsset>>,
    pub generated_email: Option<GeneratedEmail>,
    pub errors: Vec<StepFailure>,
}

impl WorkflowState {
    pub fn new(prospect: ProspectRecord) -> Self {
        Self {
            prospect,
            intent_summary: None,
            ranked_assets: None,
            generated_email: None,
            errors: Vec::new(),
        }
    }

    /// Whether the given field is currently populated.
    pub fn has_field(&self, field: StateField) -> bool {
        match field {
            StateField::Prospect => true,
            StateField::IntentSummary => self.intent_summary.is_some(),
            StateField::RankedAssets => self.ranked_assets.is_some(),
            StateField::GeneratedEmail => self.generated_email.is_some(),
        }
    }

    /// Merge a step's delta, rejecting any overwrite of a populated field.
    pub fn apply(&mut self, delta: StateDelta) -> Result<(), StateConflict> {
        if let Some(summary) = delta.intent_summary {
            if self.intent_summary.is_some() {
                return Err(StateConflict {
                    field: StateField::IntentSummary,
                });
            }
            self.intent_summary = Some(summary);
        }
        if let Some(assets) = delta.ranked_assets {
            if self.ranked_assets.is_some() {
                return Err(StateConflict {
                    field: StateField::RankedAssets,
                });
            }
            self.ranked_assets = Some(assets);
        }
        if let Some(email) = delta.generated_email {
            if self.generated_email.is_some() {
                return Err(StateConflict {
                    field: StateField::GeneratedEmail,
                });
            }
            self.generated_email = Some(email);
        }
        Ok(())
    }

    /// Append a failure record to the run's ordered failure history.
    pub fn record_failure(&mut self, failure: StepFailure) {
        self.errors.push(failure);
    }
}
