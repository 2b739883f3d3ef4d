//! DirectReach workflow engine
//!
//! A small workflow graph engine that turns one prospect's signal data into
//! a personalized email draft through a fixed three-node pipeline:
//!
//! 1. **Intent summarizer** - extracts a buying-intent profile from
//!    prospect signals via an AI provider.
//! 2. **Asset ranker** - scores candidate content assets against the
//!    intent and ranks them deterministically.
//! 3. **Email generator** - drafts an email referencing the top-ranked
//!    assets.
//!
//! Steps communicate only through a shared [`state::WorkflowState`] with a
//! field-level write-once invariant. The [`graph::GraphExecutor`] enforces
//! per-node retry, timeout, and cancellation semantics, and always hands
//! back either a fully populated state or a partial state plus the ordered
//! list of every failure encountered.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use directreach::config::PipelineSection;
//! use directreach::graph::GraphExecutor;
//! use directreach::pipeline::email_generation_graph;
//! use directreach::state::ProspectRecord;
//! use directreach::testing::mocks::{sample_assets, MockAdapter, MockAssetSource};
//!
//! # async fn demo() {
//! let graph = email_generation_graph(
//!     Arc::new(MockAdapter::new()),
//!     Arc::new(MockAssetSource::with_assets(sample_assets())),
//!     &PipelineSection::default(),
//! )
//! .unwrap();
//!
//! let executor = GraphExecutor::new(graph);
//! let payload = serde_json::json!({ "id": 45, "campaign_id": 1 });
//! let prospect = ProspectRecord::from_payload(payload).unwrap();
//! let outcome = executor.run(prospect).await;
//! assert!(outcome.is_success());
//! # }
//! ```

pub mod adapter;
pub mod assets;
pub mod config;
pub mod error;
pub mod graph;
pub mod observability;
pub mod pipeline;
pub mod state;
pub mod step;
pub mod testing;
pub mod webhook;

pub use adapter::{AdapterError, AdapterRequest, AdapterResponse, ServiceAdapter};
pub use config::{AppConfig, ConfigError, PipelineSection};
pub use error::{FailureKind, StepError};
pub use graph::{
    CancelHandle, CancelToken, GraphError, GraphExecutor, NodeSpec, RetryPolicy, RunOutcome,
    WorkflowGraph, WorkflowGraphBuilder,
};
pub use state::{ProspectRecord, StateDelta, StateField, WorkflowState};
pub use step::{AgentStep, StepResult};
