//! Inbound webhook surface
//!
//! Thin HTTP glue between the CMS and the graph executor: a prospect
//! payload arrives, is deserialized into a [`ProspectRecord`], and a run is
//! executed. All pipeline semantics live in the executor; this module only
//! translates HTTP.

use serde::Serialize;
use std::convert::Infallible;
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;
use warp::http::StatusCode;
use warp::Filter;

use crate::graph::{GraphExecutor, RunOutcome};
use crate::state::{GeneratedEmail, ProspectRecord, StepFailure};

/// JSON reply for a completed run.
#[derive(Debug, Serialize)]
struct RunReply {
    run_id: Uuid,
    status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    generated_email: Option<GeneratedEmail>,
    errors: Vec<StepFailure>,
}

#[derive(Debug, Serialize)]
struct ErrorReply {
    error: String,
}

/// HTTP server exposing the prospect webhook and a health probe.
pub struct WebhookServer {
    executor: Arc<GraphExecutor>,
    port: u16,
}

impl WebhookServer {
    pub fn new(executor: Arc<GraphExecutor>, port: u16) -> Self {
        Self { executor, port }
    }

    /// Serve until the process shuts down.
    pub async fn start(&self) {
        let executor = self.executor.clone();

        // POST /hooks/prospect - run the pipeline for one prospect payload
        let prospect_route = warp::path!("hooks" / "prospect")
            .and(warp::post())
            .and(warp::body::json())
            .and_then(move |payload: serde_json::Value| {
                let executor = executor.clone();
                async move { handle_prospect(executor, payload).await }
            });

        // GET /health - liveness probe
        let health_route = warp::path("health").and(warp::get()).map(|| {
            warp::reply::json(&serde_json::json!({ "status": "ok" }))
        });

        let routes = prospect_route.or(health_route);

        info!(port = self.port, "webhook server listening");
        warp::serve(routes).run(([0, 0, 0, 0], self.port)).await;
    }
}

async fn handle_prospect(
    executor: Arc<GraphExecutor>,
    payload: serde_json::Value,
) -> Result<impl warp::Reply, Infallible> {
    let prospect = match ProspectRecord::from_payload(payload) {
        Ok(prospect) => prospect,
        Err(e) => {
            warn!(error = %e, "rejected webhook payload");
            return Ok(warp::reply::with_status(
                warp::reply::json(&ErrorReply {
                    error: e.to_string(),
                }),
                StatusCode::BAD_REQUEST,
            ));
        }
    };

    match executor.run(prospect).await {
        RunOutcome::Succeeded(report) => Ok(warp::reply::with_status(
            warp::reply::json(&RunReply {
                run_id: report.run_id,
                status: "succeeded",
                generated_email: report.state.generated_email,
                errors: report.state.errors,
            }),
            StatusCode::OK,
        )),
        RunOutcome::Failed { report, error } => {
            warn!(run_id = %report.run_id, kind = %error.kind, "run failed");
            Ok(warp::reply::with_status(
                warp::reply::json(&RunReply {
                    run_id: report.run_id,
                    status: "failed",
                    generated_email: None,
                    errors: report.state.errors,
                }),
                StatusCode::UNPROCESSABLE_ENTITY,
            ))
        }
    }
}
