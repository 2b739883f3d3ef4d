//! Workflow graph declaration and order resolution
//!
//! A graph is a fixed set of [`NodeSpec`]s plus explicit edges. Construction
//! validates the declaration: the edges must form a DAG and every node's
//! required fields must be produced by some earlier node (the prospect is
//! available from run start). The graph is immutable after construction and
//! the resolved order is deterministic.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::state::StateField;
use crate::step::AgentStep;

pub mod executor;

pub use executor::{
    CancelHandle, CancelToken, GraphExecutor, NodePhase, NodeReport, RunOutcome, RunReport,
};

/// Shape of delay growth between retry attempts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackoffStrategy {
    None,
    Fixed(Duration),
    Exponential { base: Duration },
}

/// Delays longer than this are clamped.
const MAX_BACKOFF: Duration = Duration::from_secs(30);

impl BackoffStrategy {
    /// Delay to wait after the given failed attempt (1-based).
    pub fn delay(&self, attempt: u32) -> Duration {
        match self {
            Self::None => Duration::ZERO,
            Self::Fixed(delay) => *delay,
            Self::Exponential { base } => {
                let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
                base.saturating_mul(factor).min(MAX_BACKOFF)
            }
        }
    }
}

/// Per-node retry budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts allowed, including the first.
    pub max_attempts: u32,
    pub backoff: BackoffStrategy,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: BackoffStrategy::Exponential {
                base: Duration::from_millis(250),
            },
        }
    }
}

/// Static declaration of one pipeline node.
#[derive(Debug, Clone)]
pub struct NodeSpec {
    pub id: String,
    /// State fields that must be populated before this node runs.
    pub requires: Vec<StateField>,
    /// State fields this node populates on success.
    pub produces: Vec<StateField>,
    pub retry: RetryPolicy,
    pub timeout: Duration,
}

impl NodeSpec {
    pub fn new<S: Into<String>>(
        id: S,
        requires: Vec<StateField>,
        produces: Vec<StateField>,
    ) -> Self {
        Self {
            id: id.into(),
            requires,
            produces,
            retry: RetryPolicy::default(),
            timeout: Duration::from_secs(30),
        }
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Graph declaration defects. Fatal before any run starts.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("cycle detected in workflow graph involving node `{0}`")]
    CycleDetected(String),
    #[error("node `{node}` requires field `{field}` which no prior node produces")]
    UnsatisfiedDependency { node: String, field: StateField },
    #[error("edge references unknown node `{0}`")]
    UnknownNode(String),
    #[error("duplicate node id `{0}`")]
    DuplicateNode(String),
}

pub(crate) struct GraphNode {
    pub(crate) spec: NodeSpec,
    pub(crate) step: Arc<dyn AgentStep>,
}

/// Immutable workflow graph with a validated, pre-resolved execution order.
pub struct WorkflowGraph {
    nodes: Vec<GraphNode>,
    order: Vec<usize>,
}

impl std::fmt::Debug for WorkflowGraph {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkflowGraph")
            .field(
                "nodes",
                &self.nodes.iter().map(|n| &n.spec).collect::<Vec<_>>(),
            )
            .field("order", &self.order)
            .finish()
    }
}

impl WorkflowGraph {
    /// Resolved, dependency-respecting node sequence.
    pub fn resolve_order(&self) -> Vec<&NodeSpec> {
        self.order.iter().map(|&i| &self.nodes[i].spec).collect()
    }

    pub(crate) fn nodes_in_order(&self) -> impl Iterator<Item = &GraphNode> {
        self.order.iter().map(move |&i| &self.nodes[i])
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// Builder for [`WorkflowGraph`]. Validation happens in [`build`](Self::build).
#[derive(Default)]
pub struct WorkflowGraphBuilder {
    nodes: Vec<GraphNode>,
    edges: Vec<(String, String)>,
}

impl WorkflowGraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_node(mut self, spec: NodeSpec, step: Arc<dyn AgentStep>) -> Self {
        self.nodes.push(GraphNode { spec, step });
        self
    }

    /// Declare that `from` must complete before `to` runs.
    pub fn add_edge<S: Into<String>>(mut self, from: S, to: S) -> Self {
        self.edges.push((from.into(), to.into()));
        self
    }

    pub fn build(self) -> Result<WorkflowGraph, GraphError> {
        let mut index_of = std::collections::HashMap::new();
        for (i, node) in self.nodes.iter().enumerate() {
            if index_of.insert(node.spec.id.clone(), i).is_some() {
                return Err(GraphError::DuplicateNode(node.spec.id.clone()));
            }
        }

        let n = self.nodes.len();
        let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut in_degree = vec![0usize; n];
        for (from, to) in &self.edges {
            let &from_idx = index_of
                .get(from)
                .ok_or_else(|| GraphError::UnknownNode(from.clone()))?;
            let &to_idx = index_of
                .get(to)
                .ok_or_else(|| GraphError::UnknownNode(to.clone()))?;
            adjacency[from_idx].push(to_idx);
            in_degree[to_idx] += 1;
        }

        // Kahn's algorithm; the ready set is drained in ascending insertion
        // index so the resolved order is deterministic.
        let mut ready: Vec<usize> = (0..n).filter(|&i| in_degree[i] == 0).collect();
        let mut order = Vec::with_capacity(n);
        while !ready.is_empty() {
            ready.sort_unstable();
            let current = ready.remove(0);
            order.push(current);
            for &next in &adjacency[current] {
                in_degree[next] -= 1;
                if in_degree[next] == 0 {
                    ready.push(next);
                }
            }
        }

        if order.len() != n {
            let stuck = (0..n)
                .find(|&i| in_degree[i] > 0)
                .map(|i| self.nodes[i].spec.id.clone())
                .unwrap_or_default();
            return Err(GraphError::CycleDetected(stuck));
        }

        // Every required field must be produced by some earlier node.
        let mut available = vec![StateField::Prospect];
        for &idx in &order {
            let spec = &self.nodes[idx].spec;
            for field in &spec.requires {
                if !available.contains(field) {
                    return Err(GraphError::UnsatisfiedDependency {
                        node: spec.id.clone(),
                        field: *field,
                    });
                }
            }
            available.extend(spec.produces.iter().copied());
        }

        Ok(WorkflowGraph {
            nodes: self.nodes,
            order,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_none() {
        assert_eq!(BackoffStrategy::None.delay(1), Duration::ZERO);
        assert_eq!(BackoffStrategy::None.delay(5), Duration::ZERO);
    }

    #[test]
    fn test_backoff_fixed() {
        let backoff = BackoffStrategy::Fixed(Duration::from_millis(100));
        assert_eq!(backoff.delay(1), Duration::from_millis(100));
        assert_eq!(backoff.delay(4), Duration::from_millis(100));
    }

    #[test]
    fn test_backoff_exponential_doubles() {
        let backoff = BackoffStrategy::Exponential {
            base: Duration::from_millis(250),
        };
        assert_eq!(backoff.delay(1), Duration::from_millis(250));
        assert_eq!(backoff.delay(2), Duration::from_millis(500));
        assert_eq!(backoff.delay(3), Duration::from_millis(1000));
    }

    #[test]
    fn test_backoff_exponential_clamped() {
        let backoff = BackoffStrategy::Exponential {
            base: Duration::from_secs(10),
        };
        assert_eq!(backoff.delay(10), MAX_BACKOFF);
    }

    #[test]
    fn test_retry_policy_default() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts, 3);
    }
}
