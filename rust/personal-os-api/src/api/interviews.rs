//! Interview endpoints.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
};
use serde::Deserialize;
use serde_json::Value;

use super::{Deleted, parse_limit};
use crate::AppState;
use crate::domain::{Interview, InterviewType};
use crate::error::AppResult;
use crate::gateway::auth::AuthenticatedUser;
use crate::journal::NewInterview;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/v1/interviews", get(list_interviews).post(create_interview))
        .route(
            "/api/v1/interviews/{id}",
            get(get_interview).patch(update_interview).delete(delete_interview),
        )
}

#[derive(Debug, Default, Deserialize)]
pub struct InterviewQuery {
    #[serde(rename = "type")]
    pub interview_type: Option<String>,
    pub limit: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct InterviewPatch {
    #[serde(default)]
    pub content: Option<Value>,
}

async fn create_interview(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(req): Json<NewInterview>,
) -> AppResult<(StatusCode, Json<Interview>)> {
    let interview = state.store.create_interview(&user.user_id, req).await?;
    Ok((StatusCode::CREATED, Json(interview)))
}

async fn list_interviews(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<InterviewQuery>,
) -> AppResult<Json<Vec<Interview>>> {
    let interview_type = InterviewType::parse_filter(query.interview_type.as_deref());
    let limit = parse_limit(query.limit.as_deref());
    Ok(Json(
        state
            .store
            .list_interviews(&user.user_id, interview_type, limit)
            .await?,
    ))
}

async fn get_interview(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
) -> AppResult<Json<Interview>> {
    Ok(Json(state.store.get_interview(&user.user_id, &id).await?))
}

async fn update_interview(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
    Json(patch): Json<InterviewPatch>,
) -> AppResult<Json<Interview>> {
    Ok(Json(
        state
            .store
            .update_interview(&user.user_id, &id, patch.content)
            .await?,
    ))
}

async fn delete_interview(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
) -> AppResult<Json<Deleted>> {
    state.store.delete_interview(&user.user_id, &id).await?;
    Ok(Json(Deleted::new()))
}
