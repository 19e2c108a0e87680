//! Server-side editing sessions for documents.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post, put},
};
use serde::Deserialize;

use crate::AppState;
use crate::error::AppResult;
use crate::gateway::auth::AuthenticatedUser;
use crate::journal::AutosaveStatus;

pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/v1/documents/{id}/session",
            get(session_status).post(open_session).delete(close_session),
        )
        .route("/api/v1/documents/{id}/session/content", put(edit_content))
        .route("/api/v1/documents/{id}/session/save", post(save_session))
}

#[derive(Debug, Deserialize)]
pub struct EditRequest {
    pub content: String,
}

async fn open_session(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
) -> AppResult<Json<AutosaveStatus>> {
    Ok(Json(state.sessions.open(&user.user_id, &id).await?))
}

async fn edit_content(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
    Json(req): Json<EditRequest>,
) -> AppResult<Json<AutosaveStatus>> {
    Ok(Json(state.sessions.edit(&user.user_id, &id, req.content)?))
}

async fn save_session(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
) -> AppResult<Json<AutosaveStatus>> {
    Ok(Json(state.sessions.save(&user.user_id, &id).await?))
}

async fn session_status(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
) -> AppResult<Json<AutosaveStatus>> {
    Ok(Json(state.sessions.status(&user.user_id, &id)?))
}

async fn close_session(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
) -> AppResult<Json<AutosaveStatus>> {
    Ok(Json(state.sessions.close(&user.user_id, &id).await?))
}
