use std::sync::Arc;

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use tracing::error;

use crate::application::ChaosPipeline;
use crate::domain::errors::Severity;

use super::model::{ChaosTestRequest, ChaosTestResponse};

pub fn router(pipeline: Arc<ChaosPipeline>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/chaos-test", post(run_chaos_test))
        .route("/stuck", get(list_stuck))
        .route("/recover", post(recover_stuck))
        .with_state(pipeline)
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({"status": "ok"}))
}

/// The endpoint never 500s a resolved run: a `Fail` or `Awaited` verdict
/// is a 200 with `success` reflecting the verdict. Only setup errors map
/// to error statuses.
async fn run_chaos_test(
    State(pipeline): State<Arc<ChaosPipeline>>,
    Json(request): Json<ChaosTestRequest>,
) -> impl IntoResponse {
    match pipeline.execute(request.into()).await {
        Ok(report) => (StatusCode::OK, Json(ChaosTestResponse::from_report(&report))),
        Err(err) => {
            error!(stage = err.stage().as_str(), error = %err, "chaos run failed");
            let status = match err.severity() {
                Severity::Fatal => StatusCode::UNPROCESSABLE_ENTITY,
                Severity::Recoverable | Severity::Diagnostic => StatusCode::BAD_GATEWAY,
            };
            (status, Json(ChaosTestResponse::from_error(&err)))
        }
    }
}

#[derive(Debug, Deserialize)]
struct NamespaceQuery {
    namespace: Option<String>,
}

async fn list_stuck(
    State(pipeline): State<Arc<ChaosPipeline>>,
    Query(query): Query<NamespaceQuery>,
) -> impl IntoResponse {
    let namespace = query
        .namespace
        .unwrap_or_else(|| pipeline.config().target_namespace.clone());
    match pipeline.recovery_service().detect_stuck(&namespace).await {
        Ok(stuck) => (
            StatusCode::OK,
            Json(serde_json::json!({"namespace": namespace, "stuck": stuck})),
        ),
        Err(err) => (
            StatusCode::BAD_GATEWAY,
            Json(serde_json::json!({"error": err.to_string()})),
        ),
    }
}

async fn recover_stuck(
    State(pipeline): State<Arc<ChaosPipeline>>,
    Query(query): Query<NamespaceQuery>,
) -> impl IntoResponse {
    let namespace = query
        .namespace
        .unwrap_or_else(|| pipeline.config().target_namespace.clone());
    match pipeline.recovery_service().auto_recover(&namespace).await {
        Ok(outcomes) => {
            let recovered: Vec<serde_json::Value> = outcomes
                .iter()
                .map(|(record, outcome)| {
                    serde_json::json!({
                        "engine": record.engine_name,
                        "success": outcome.success,
                        "message": outcome.message,
                        "actions": outcome.actions,
                    })
                })
                .collect();
            (
                StatusCode::OK,
                Json(serde_json::json!({"namespace": namespace, "recovered": recovered})),
            )
        }
        Err(err) => (
            StatusCode::BAD_GATEWAY,
            Json(serde_json::json!({"error": err.to_string()})),
        ),
    }
}
