//! End-to-end workflow run tests against the standard three-node pipeline
//!
//! Covers the run-level semantics: full-success population, retry budget
//! accounting, halting, timeout, cancellation, and the write-once state
//! invariant.

mod test_helpers;

use directreach::adapter::{AdapterError, AdapterRequest};
use directreach::config::PipelineSection;
use directreach::error::FailureKind;
use directreach::graph::{
    CancelHandle, GraphExecutor, NodeSpec, RunOutcome, WorkflowGraphBuilder,
};
use directreach::state::{IntentSummary, StateDelta, StateField, WorkflowState};
use directreach::step::{AgentStep, StepResult, ASSET_RANKER, EMAIL_GENERATOR, INTENT_SUMMARIZER};
use directreach::testing::mocks::{sample_assets, sample_prospect, MockAdapter, MockAssetSource};
use std::sync::Arc;
use std::time::Duration;
use test_helpers::{executor_with, fast_pipeline};

#[tokio::test]
async fn test_all_adapters_succeeding_populates_every_field_once() {
    let adapter = Arc::new(MockAdapter::new());
    let source = Arc::new(MockAssetSource::with_assets(sample_assets()));
    let executor = executor_with(adapter.clone(), source, &fast_pipeline());

    let outcome = executor.run(sample_prospect()).await;
    assert!(outcome.is_success());

    let report = outcome.report();
    let state = &report.state;
    assert!(state.intent_summary.is_some());
    assert!(state.ranked_assets.is_some());
    assert!(state.generated_email.is_some());
    assert!(state.errors.is_empty());

    // One attempt per node, in resolved order
    assert_eq!(report.nodes.len(), 3);
    assert_eq!(report.attempts_for(INTENT_SUMMARIZER), Some(1));
    assert_eq!(report.attempts_for(ASSET_RANKER), Some(1));
    assert_eq!(report.attempts_for(EMAIL_GENERATOR), Some(1));

    // The email references the top-ranked assets
    let ranked = state.ranked_assets.as_ref().unwrap();
    let email = state.generated_email.as_ref().unwrap();
    let expected: Vec<u64> = ranked.iter().take(3).map(|a| a.asset_id).collect();
    assert_eq!(email.asset_ids, expected);
}

#[tokio::test]
async fn test_retry_budget_allows_success_on_third_attempt() {
    // Fail twice with a retryable kind, then fall back to default success
    let adapter = Arc::new(MockAdapter::with_outcomes(vec![
        Err(AdapterError::Unavailable("overloaded".to_string())),
        Err(AdapterError::Unavailable("overloaded".to_string())),
    ]));
    let source = Arc::new(MockAssetSource::with_assets(sample_assets()));
    let executor = executor_with(adapter, source, &fast_pipeline());

    let outcome = executor.run(sample_prospect()).await;
    assert!(outcome.is_success());

    let report = outcome.report();
    assert_eq!(report.attempts_for(INTENT_SUMMARIZER), Some(3));

    // Both retryable failures are on the record even though the run succeeded
    assert_eq!(report.state.errors.len(), 2);
    assert!(report
        .state
        .errors
        .iter()
        .all(|e| e.kind == FailureKind::ServiceUnavailable));
}

#[tokio::test]
async fn test_exhausted_retries_fail_the_run() {
    let adapter = Arc::new(MockAdapter::with_outcomes(vec![
        Err(AdapterError::Unavailable("down".to_string())),
        Err(AdapterError::Unavailable("down".to_string())),
        Err(AdapterError::Unavailable("down".to_string())),
    ]));
    let source = Arc::new(MockAssetSource::with_assets(sample_assets()));
    let executor = executor_with(adapter, source, &fast_pipeline());

    match executor.run(sample_prospect()).await {
        RunOutcome::Failed { report, error } => {
            assert_eq!(error.kind, FailureKind::ServiceUnavailable);
            assert_eq!(report.attempts_for(INTENT_SUMMARIZER), Some(3));
            assert_eq!(report.state.errors.len(), 3);
            assert!(report.state.intent_summary.is_none());
        }
        RunOutcome::Succeeded(_) => panic!("run should have failed"),
    }
}

#[tokio::test]
async fn test_no_assets_halts_before_email_generation() {
    let adapter = Arc::new(MockAdapter::new());
    let source = Arc::new(MockAssetSource::empty());
    let executor = executor_with(adapter.clone(), source, &fast_pipeline());

    match executor.run(sample_prospect()).await {
        RunOutcome::Failed { report, error } => {
            assert_eq!(error.kind, FailureKind::NoAssetsAvailable);

            // Exactly one failure on record
            assert_eq!(report.state.errors.len(), 1);
            assert_eq!(report.state.errors[0].kind, FailureKind::NoAssetsAvailable);

            // Partial state: intent populated, nothing downstream
            assert!(report.state.intent_summary.is_some());
            assert!(report.state.ranked_assets.is_none());
            assert!(report.state.generated_email.is_none());
        }
        RunOutcome::Succeeded(_) => panic!("run should have failed"),
    }

    // The email generator never executed: only the intent analysis hit the adapter
    let calls = adapter.calls().await;
    assert_eq!(calls.len(), 1);
    assert!(matches!(calls[0], AdapterRequest::AnalyzeIntent { .. }));
}

#[tokio::test]
async fn test_timeout_counts_toward_retry_budget() {
    let pipeline = PipelineSection {
        max_retries: 2,
        timeout_ms: 50,
        ..fast_pipeline()
    };
    let adapter = Arc::new(MockAdapter::with_delay(Duration::from_millis(500)));
    let source = Arc::new(MockAssetSource::with_assets(sample_assets()));
    let executor = executor_with(adapter, source, &pipeline);

    match executor.run(sample_prospect()).await {
        RunOutcome::Failed { report, error } => {
            assert_eq!(error.kind, FailureKind::Timeout);
            assert_eq!(report.attempts_for(INTENT_SUMMARIZER), Some(2));
            assert_eq!(report.state.errors.len(), 2);
            assert!(report
                .state
                .errors
                .iter()
                .all(|e| e.kind == FailureKind::Timeout));
        }
        RunOutcome::Succeeded(_) => panic!("run should have timed out"),
    }
}

#[tokio::test]
async fn test_cancellation_aborts_in_flight_node() {
    let adapter = Arc::new(MockAdapter::with_delay(Duration::from_secs(5)));
    let source = Arc::new(MockAssetSource::with_assets(sample_assets()));
    let pipeline = PipelineSection {
        timeout_ms: 10_000,
        ..fast_pipeline()
    };
    let executor = executor_with(adapter, source, &pipeline);

    let handle = CancelHandle::new();
    let token = handle.token();

    let run = executor.run_with_cancel(sample_prospect(), token);
    let trigger = async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        handle.cancel();
    };

    let (outcome, ()) = tokio::join!(run, trigger);
    match outcome {
        RunOutcome::Failed { report, error } => {
            assert_eq!(error.kind, FailureKind::Cancelled);
            assert_eq!(error.node, INTENT_SUMMARIZER);
            assert!(report.state.intent_summary.is_none());
        }
        RunOutcome::Succeeded(_) => panic!("run should have been cancelled"),
    }
}

#[tokio::test]
async fn test_concurrent_runs_do_not_share_state() {
    let adapter = Arc::new(MockAdapter::new());
    let source = Arc::new(MockAssetSource::with_assets(sample_assets()));
    let executor = Arc::new(executor_with(adapter, source, &fast_pipeline()));

    let prospects: Vec<_> = (0..4)
        .map(|i| {
            let mut prospect = sample_prospect();
            prospect.id = 100 + i;
            prospect
        })
        .collect();

    let outcomes =
        futures::future::join_all(prospects.iter().map(|p| executor.run(p.clone()))).await;

    let mut run_ids = Vec::new();
    for (i, outcome) in outcomes.iter().enumerate() {
        assert!(outcome.is_success());
        let report = outcome.report();
        assert_eq!(report.state.prospect.id, 100 + i as u64);
        assert!(report.state.errors.is_empty());
        run_ids.push(report.run_id);
    }
    run_ids.sort_unstable();
    run_ids.dedup();
    assert_eq!(run_ids.len(), 4);
}

/// Step that populates the intent field unconditionally; used to provoke a
/// write conflict.
struct FixedIntentStep {
    id: &'static str,
}

#[async_trait::async_trait]
impl AgentStep for FixedIntentStep {
    fn name(&self) -> &str {
        self.id
    }

    async fn run(&self, state: &WorkflowState) -> StepResult {
        Ok(StateDelta::intent(IntentSummary {
            prospect_id: state.prospect.id,
            service_area: None,
            pain_points: vec![],
            confidence: 0.5,
        }))
    }
}

#[tokio::test]
async fn test_state_conflict_is_fatal() {
    // Two nodes both claiming to produce the intent summary: the second
    // write must be rejected and end the run.
    let graph = WorkflowGraphBuilder::new()
        .add_node(
            NodeSpec::new("first", vec![], vec![StateField::IntentSummary]),
            Arc::new(FixedIntentStep { id: "first" }),
        )
        .add_node(
            NodeSpec::new("second", vec![], vec![StateField::IntentSummary]),
            Arc::new(FixedIntentStep { id: "second" }),
        )
        .add_edge("first", "second")
        .build()
        .unwrap();

    let executor = GraphExecutor::new(graph);
    match executor.run(sample_prospect()).await {
        RunOutcome::Failed { report, error } => {
            assert_eq!(error.kind, FailureKind::StateConflict);
            assert_eq!(error.node, "second");
            // First node's write is preserved
            assert!(report.state.intent_summary.is_some());
        }
        RunOutcome::Succeeded(_) => panic!("conflicting write should fail the run"),
    }
}
