//! Failure taxonomy for workflow runs
//!
//! Every step-level failure carries a [`FailureKind`] so the executor can
//! decide locally whether a retry is allowed without knowing provider
//! specifics.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

use crate::state::StateField;

/// Classification of a step-level failure.
///
/// Retryability is a property of the kind, not the step: the executor
/// re-attempts `ServiceUnavailable` and `Timeout` within the node's retry
/// budget and treats everything else as terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// A declared input field was absent or invalid when the step ran.
    MissingPrecondition,
    /// The external service could not be reached or refused transiently.
    ServiceUnavailable,
    /// The adapter returned data that cannot be parsed into the expected shape.
    MalformedResponse,
    /// The asset source returned an empty candidate set.
    NoAssetsAvailable,
    /// The provider refused to generate (e.g. content-policy rejection).
    GenerationRejected,
    /// The step did not complete within its configured duration.
    Timeout,
    /// The run was cancelled while this node was in flight.
    Cancelled,
    /// A step attempted to overwrite an already-populated state field. Defect.
    StateConflict,
}

impl FailureKind {
    /// Whether the executor may re-attempt this failure within the retry budget.
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::ServiceUnavailable | Self::Timeout)
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::MissingPrecondition => "missing_precondition",
            Self::ServiceUnavailable => "service_unavailable",
            Self::MalformedResponse => "malformed_response",
            Self::NoAssetsAvailable => "no_assets_available",
            Self::GenerationRejected => "generation_rejected",
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
            Self::StateConflict => "state_conflict",
        };
        f.write_str(name)
    }
}

/// Failure returned by an agent step invocation.
#[derive(Debug, Clone, Error)]
#[error("{kind}: {detail}")]
pub struct StepError {
    pub kind: FailureKind,
    pub detail: String,
}

impl StepError {
    pub fn new<S: Into<String>>(kind: FailureKind, detail: S) -> Self {
        Self {
            kind,
            detail: detail.into(),
        }
    }

    /// Create a non-retryable precondition failure for a missing state field.
    pub fn missing_precondition(field: StateField) -> Self {
        Self::new(
            FailureKind::MissingPrecondition,
            format!("required field `{field}` is not populated"),
        )
    }

    pub fn is_retryable(&self) -> bool {
        self.kind.is_retryable()
    }
}
