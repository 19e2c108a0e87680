//! Health and readiness endpoints.

use axum::{Json, Router, extract::State, http::StatusCode, routing::get};
use serde::Serialize;

use crate::AppState;

/// Create the health router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/ready", get(readiness_check))
}

/// Health check response.
#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

/// Basic health check.
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Readiness check response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ReadinessResponse {
    status: &'static str,
    database: bool,
    collaborators: Collaborators,
}

/// Optional collaborators. Absent ones degrade features, not readiness.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Collaborators {
    insights: bool,
    storage: bool,
    billing: bool,
}

/// Ready once the database answers.
async fn readiness_check(State(state): State<AppState>) -> (StatusCode, Json<ReadinessResponse>) {
    let database = match state.db.ping().await {
        Ok(()) => true,
        Err(e) => {
            tracing::warn!(error = %e, "Database ping failed");
            false
        }
    };

    let status = if database { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (
        status,
        Json(ReadinessResponse {
            status: if database { "ready" } else { "not_ready" },
            database,
            collaborators: Collaborators {
                insights: state.insights.is_configured(),
                storage: state.uploads.is_configured(),
                billing: state.billing.is_configured(),
            },
        }),
    )
}
