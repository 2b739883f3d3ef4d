//! Test helpers and utilities for integration tests

use directreach::config::{BackoffKind, PipelineSection};
use directreach::graph::GraphExecutor;
use directreach::pipeline::email_generation_graph;
use directreach::testing::mocks::{MockAdapter, MockAssetSource};
use std::sync::Arc;

/// Pipeline settings tuned for fast tests: no backoff delays.
#[allow(dead_code)]
pub fn fast_pipeline() -> PipelineSection {
    PipelineSection {
        max_retries: 3,
        timeout_ms: 1_000,
        top_asset_count: 3,
        backoff: BackoffKind::None,
        backoff_base_ms: 0,
    }
}

/// Build an executor over the standard graph with the given mocks.
#[allow(dead_code)]
pub fn executor_with(
    adapter: Arc<MockAdapter>,
    source: Arc<MockAssetSource>,
    pipeline: &PipelineSection,
) -> GraphExecutor {
    let graph = email_generation_graph(adapter, source, pipeline)
        .expect("standard graph should build");
    GraphExecutor::new(graph)
}
