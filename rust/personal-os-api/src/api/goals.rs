//! Goal endpoints.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
};
use serde::Deserialize;

use super::Deleted;
use crate::AppState;
use crate::domain::{Goal, Timeframe};
use crate::error::AppResult;
use crate::gateway::auth::AuthenticatedUser;
use crate::journal::{GoalPatch, NewGoal};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/v1/goals", get(list_goals).post(create_goal))
        .route(
            "/api/v1/goals/{id}",
            get(get_goal).patch(update_goal).delete(delete_goal),
        )
}

#[derive(Debug, Default, Deserialize)]
pub struct GoalQuery {
    pub timeframe: Option<String>,
}

async fn create_goal(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(req): Json<NewGoal>,
) -> AppResult<(StatusCode, Json<Goal>)> {
    let goal = state.store.create_goal(&user.user_id, req).await?;
    Ok((StatusCode::CREATED, Json(goal)))
}

async fn list_goals(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<GoalQuery>,
) -> AppResult<Json<Vec<Goal>>> {
    let timeframe = Timeframe::parse_filter(query.timeframe.as_deref());
    Ok(Json(state.store.list_goals(&user.user_id, timeframe).await?))
}

async fn get_goal(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
) -> AppResult<Json<Goal>> {
    Ok(Json(state.store.get_goal(&user.user_id, &id).await?))
}

async fn update_goal(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
    Json(patch): Json<GoalPatch>,
) -> AppResult<Json<Goal>> {
    Ok(Json(state.store.update_goal(&user.user_id, &id, patch).await?))
}

async fn delete_goal(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
) -> AppResult<Json<Deleted>> {
    state.store.delete_goal(&user.user_id, &id).await?;
    Ok(Json(Deleted::new()))
}
