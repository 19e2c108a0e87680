//! AI insight endpoint.

use axum::{Json, Router, extract::State, middleware, routing::post};

use crate::AppState;
use crate::error::AppResult;
use crate::gateway::auth::AuthenticatedUser;
use crate::gateway::rate_limit::insights_rate_limit;
use crate::insights::{InsightRequest, InsightResponse};

pub fn router(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/api/v1/insights", post(generate_insights))
        .route_layer(middleware::from_fn_with_state(state, insights_rate_limit))
}

async fn generate_insights(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(req): Json<InsightRequest>,
) -> AppResult<Json<InsightResponse>> {
    let today = chrono::Utc::now().date_naive();
    Ok(Json(state.insights.analyze(&user.user_id, &req, today).await?))
}
