//! Agent steps
//!
//! The pipeline is a closed set of three step variants behind the
//! [`AgentStep`] trait: intent summarizer, asset ranker, email generator.
//! Each reads its declared inputs from the shared state and returns a
//! [`StateDelta`] on success; steps never mutate state directly.

use async_trait::async_trait;

use crate::adapter::AdapterError;
use crate::error::{FailureKind, StepError};
use crate::state::{StateDelta, WorkflowState};

pub mod email;
pub mod intent;
pub mod ranker;

pub use email::EmailGenerator;
pub use intent::IntentSummarizer;
pub use ranker::AssetRanker;

/// Stable node identifiers used in graph declarations and failure records.
pub const INTENT_SUMMARIZER: &str = "intent_summarizer";
pub const ASSET_RANKER: &str = "asset_ranker";
pub const EMAIL_GENERATOR: &str = "email_generator";

/// Outcome of one step invocation.
pub type StepResult = Result<StateDelta, StepError>;

/// A polymorphic unit of pipeline work.
#[async_trait]
pub trait AgentStep: Send + Sync {
    /// Stable identifier, matching the node spec id.
    fn name(&self) -> &str;

    /// Run the step against the current shared state.
    ///
    /// Must refuse with `MissingPrecondition` when a declared input field
    /// is absent, without attempting any external call.
    async fn run(&self, state: &WorkflowState) -> StepResult;
}

/// Map an adapter error onto the step failure taxonomy.
///
/// Retryable adapter failures become `ServiceUnavailable`; everything else
/// is unparseable provider data from the step's point of view. Steps with a
/// more specific mapping (rejection handling in the email generator)
/// intercept before calling this.
pub(crate) fn adapter_failure(err: AdapterError) -> StepError {
    if err.is_retryable() {
        StepError::new(FailureKind::ServiceUnavailable, err.to_string())
    } else {
        StepError::new(FailureKind::MalformedResponse, err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_adapter_failure_mapping() {
        let err = adapter_failure(AdapterError::Unavailable("503".to_string()));
        assert_eq!(err.kind, FailureKind::ServiceUnavailable);
        assert!(err.is_retryable());

        let err = adapter_failure(AdapterError::Malformed("bad json".to_string()));
        assert_eq!(err.kind, FailureKind::MalformedResponse);
        assert!(!err.is_retryable());
    }
}
