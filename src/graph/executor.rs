//! Graph executor
//!
//! Drives one workflow run: creates the shared state, walks the resolved
//! node order, and enforces each node's timeout and retry policy. Per-node
//! lifecycle is `Pending -> Running -> {Succeeded, FailedRetryable ->
//! Running, FailedTerminal}`; the first terminal failure halts the run.

use chrono::Utc;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::{FailureKind, StepError};
use crate::graph::{GraphNode, WorkflowGraph};
use crate::state::{ProspectRecord, StepFailure, WorkflowState};

/// Lifecycle phase of one node within a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodePhase {
    Pending,
    Running,
    Succeeded,
    FailedRetryable,
    FailedTerminal,
}

/// Per-node accounting for one run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeReport {
    pub node: String,
    /// Attempts actually made (0 when a precondition gate refused the node).
    pub attempts: u32,
    pub phase: NodePhase,
}

/// Everything a caller gets back from a run, success or failure.
#[derive(Debug)]
pub struct RunReport {
    pub run_id: Uuid,
    pub state: WorkflowState,
    pub nodes: Vec<NodeReport>,
}

impl RunReport {
    pub fn attempts_for(&self, node: &str) -> Option<u32> {
        self.nodes.iter().find(|n| n.node == node).map(|n| n.attempts)
    }
}

/// Terminal result of one run.
#[derive(Debug)]
pub enum RunOutcome {
    /// Every node succeeded; the state is fully populated.
    Succeeded(RunReport),
    /// A node failed terminally; the state is partially populated and
    /// `error` is the failure that halted the run.
    Failed {
        report: RunReport,
        error: StepFailure,
    },
}

impl RunOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Succeeded(_))
    }

    pub fn report(&self) -> &RunReport {
        match self {
            Self::Succeeded(report) => report,
            Self::Failed { report, .. } => report,
        }
    }
}

/// Issues the cancellation signal for in-flight runs.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    pub fn token(&self) -> CancelToken {
        CancelToken {
            rx: self.tx.subscribe(),
        }
    }

    /// Abort the run. The in-flight node fails terminally with `Cancelled`.
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiver side of the cancellation signal; cheap to clone per run.
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

impl CancelToken {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve when cancellation is requested; pend forever if the handle
    /// is dropped without cancelling.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow() {
                return;
            }
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }
}

enum NodeExecution {
    Succeeded { attempts: u32 },
    Failed { attempts: u32, failure: StepFailure },
}

/// Runs one workflow graph instance per prospect, sequentially node by
/// node. Concurrent runs are independent; each owns its own state.
pub struct GraphExecutor {
    graph: WorkflowGraph,
}

impl GraphExecutor {
    pub fn new(graph: WorkflowGraph) -> Self {
        Self { graph }
    }

    pub fn graph(&self) -> &WorkflowGraph {
        &self.graph
    }

    /// Run without external cancellation.
    pub async fn run(&self, prospect: ProspectRecord) -> RunOutcome {
        let handle = CancelHandle::new();
        self.run_with_cancel(prospect, handle.token()).await
    }

    /// Run with a cancellation signal that aborts the in-flight node.
    pub async fn run_with_cancel(
        &self,
        prospect: ProspectRecord,
        cancel: CancelToken,
    ) -> RunOutcome {
        let run_id = Uuid::new_v4();
        let mut state = WorkflowState::new(prospect);
        let mut nodes = Vec::with_capacity(self.graph.len());

        info!(
            %run_id,
            prospect_id = state.prospect.id,
            node_count = self.graph.len(),
            "starting workflow run"
        );

        for node in self.graph.nodes_in_order() {
            match self.execute_node(run_id, node, &mut state, &cancel).await {
                NodeExecution::Succeeded { attempts } => {
                    nodes.push(NodeReport {
                        node: node.spec.id.clone(),
                        attempts,
                        phase: NodePhase::Succeeded,
                    });
                }
                NodeExecution::Failed { attempts, failure } => {
                    nodes.push(NodeReport {
                        node: node.spec.id.clone(),
                        attempts,
                        phase: NodePhase::FailedTerminal,
                    });
                    error!(
                        %run_id,
                        node = %failure.node,
                        kind = %failure.kind,
                        detail = %failure.detail,
                        "workflow run failed"
                    );
                    return RunOutcome::Failed {
                        report: RunReport {
                            run_id,
                            state,
                            nodes,
                        },
                        error: failure,
                    };
                }
            }
        }

        info!(%run_id, "workflow run succeeded");
        RunOutcome::Succeeded(RunReport {
            run_id,
            state,
            nodes,
        })
    }

    async fn execute_node(
        &self,
        run_id: Uuid,
        node: &GraphNode,
        state: &mut WorkflowState,
        cancel: &CancelToken,
    ) -> NodeExecution {
        let spec = &node.spec;

        // Gate on declared inputs before any attempt is made.
        for field in &spec.requires {
            if !state.has_field(*field) {
                let failure = StepFailure {
                    node: spec.id.clone(),
                    kind: FailureKind::MissingPrecondition,
                    detail: format!("required field `{field}` is not populated"),
                    attempt: 0,
                    at: Utc::now(),
                };
                warn!(%run_id, node = %spec.id, field = %field, "precondition not met");
                state.record_failure(failure.clone());
                return NodeExecution::Failed {
                    attempts: 0,
                    failure,
                };
            }
        }

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            debug!(%run_id, node = %spec.id, attempt, "node running");

            let outcome = tokio::select! {
                _ = cancel.cancelled() => Err(StepError::new(
                    FailureKind::Cancelled,
                    "run cancelled while node was in flight",
                )),
                result = tokio::time::timeout(spec.timeout, node.step.run(&*state)) => {
                    match result {
                        Ok(step_result) => step_result,
                        Err(_elapsed) => Err(StepError::new(
                            FailureKind::Timeout,
                            format!("node did not complete within {:?}", spec.timeout),
                        )),
                    }
                }
            };

            match outcome {
                Ok(delta) => {
                    if let Err(conflict) = state.apply(delta) {
                        // A delta touching a populated field is a defect in
                        // the step, never recoverable.
                        let failure = StepFailure {
                            node: spec.id.clone(),
                            kind: FailureKind::StateConflict,
                            detail: conflict.to_string(),
                            attempt,
                            at: Utc::now(),
                        };
                        error!(%run_id, node = %spec.id, field = %conflict.field, "state conflict");
                        state.record_failure(failure.clone());
                        return NodeExecution::Failed {
                            attempts: attempt,
                            failure,
                        };
                    }
                    info!(%run_id, node = %spec.id, attempt, "node succeeded");
                    return NodeExecution::Succeeded { attempts: attempt };
                }
                Err(err) => {
                    let failure = StepFailure {
                        node: spec.id.clone(),
                        kind: err.kind,
                        detail: err.detail.clone(),
                        attempt,
                        at: Utc::now(),
                    };
                    state.record_failure(failure.clone());

                    let budget_left = attempt < spec.retry.max_attempts;
                    if err.is_retryable() && budget_left {
                        let delay = spec.retry.backoff.delay(attempt);
                        warn!(
                            %run_id,
                            node = %spec.id,
                            attempt,
                            kind = %err.kind,
                            delay_ms = delay.as_millis() as u64,
                            "retryable failure, backing off"
                        );
                        let cancelled = tokio::select! {
                            _ = cancel.cancelled() => true,
                            _ = tokio::time::sleep(delay) => false,
                        };
                        if cancelled {
                            let failure = StepFailure {
                                node: spec.id.clone(),
                                kind: FailureKind::Cancelled,
                                detail: "run cancelled during retry backoff".to_string(),
                                attempt,
                                at: Utc::now(),
                            };
                            state.record_failure(failure.clone());
                            return NodeExecution::Failed {
                                attempts: attempt,
                                failure,
                            };
                        }
                        continue;
                    }

                    warn!(
                        %run_id,
                        node = %spec.id,
                        attempt,
                        kind = %err.kind,
                        "node failed terminally"
                    );
                    return NodeExecution::Failed {
                        attempts: attempt,
                        failure,
                    };
                }
            }
        }
    }
}
