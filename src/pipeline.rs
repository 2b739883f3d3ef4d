//! Standard email-generation pipeline assembly
//!
//! Declares the fixed three-node graph: intent summarizer -> asset ranker
//! -> email generator. Topology is set here once; the executor never
//! mutates it.

use std::sync::Arc;

use crate::adapter::ServiceAdapter;
use crate::assets::AssetSource;
use crate::config::PipelineSection;
use crate::graph::{GraphError, NodeSpec, WorkflowGraph, WorkflowGraphBuilder};
use crate::state::StateField;
use crate::step::{
    AssetRanker, EmailGenerator, IntentSummarizer, ASSET_RANKER, EMAIL_GENERATOR,
    INTENT_SUMMARIZER,
};

/// Build the email-generation workflow graph.
pub fn email_generation_graph(
    adapter: Arc<dyn ServiceAdapter>,
    assets: Arc<dyn AssetSource>,
    pipeline: &PipelineSection,
) -> Result<WorkflowGraph, GraphError> {
    let retry = pipeline.retry_policy();
    let timeout = pipeline.node_timeout();

    WorkflowGraphBuilder::new()
        .add_node(
            NodeSpec::new(
                INTENT_SUMMARIZER,
                vec![StateField::Prospect],
                vec![StateField::IntentSummary],
            )
            .with_retry(retry.clone())
            .with_timeout(timeout),
            Arc::new(IntentSummarizer::new(adapter.clone())),
        )
        .add_node(
            NodeSpec::new(
                ASSET_RANKER,
                vec![StateField::Prospect, StateField::IntentSummary],
                vec![StateField::RankedAssets],
            )
            .with_retry(retry.clone())
            .with_timeout(timeout),
            Arc::new(AssetRanker::new(adapter.clone(), assets)),
        )
        .add_node(
            NodeSpec::new(
                EMAIL_GENERATOR,
                vec![StateField::Prospect, StateField::RankedAssets],
                vec![StateField::GeneratedEmail],
            )
            .with_retry(retry)
            .with_timeout(timeout),
            Arc::new(EmailGenerator::new(adapter, pipeline.top_asset_count)),
        )
        .add_edge(INTENT_SUMMARIZER, ASSET_RANKER)
        .add_edge(ASSET_RANKER, EMAIL_GENERATOR)
        .build()
}
