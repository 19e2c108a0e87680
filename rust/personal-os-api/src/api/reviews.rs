//! Review endpoints.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
};
use serde::Deserialize;

use super::{Deleted, parse_limit};
use crate::AppState;
use crate::database::ReviewFilter;
use crate::domain::{Review, ReviewType};
use crate::error::AppResult;
use crate::gateway::auth::AuthenticatedUser;
use crate::journal::{NewReview, ReviewPatch};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/v1/reviews", get(list_reviews).post(create_review))
        .route(
            "/api/v1/reviews/{id}",
            get(get_review).patch(update_review).delete(delete_review),
        )
}

#[derive(Debug, Default, Deserialize)]
pub struct ReviewQuery {
    #[serde(rename = "type")]
    pub review_type: Option<String>,
    pub limit: Option<String>,
}

async fn create_review(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(req): Json<NewReview>,
) -> AppResult<(StatusCode, Json<Review>)> {
    let review = state.store.create_review(&user.user_id, req).await?;
    Ok((StatusCode::CREATED, Json(review)))
}

async fn list_reviews(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(query): Query<ReviewQuery>,
) -> AppResult<Json<Vec<Review>>> {
    let filter = ReviewFilter {
        review_type: ReviewType::parse_filter(query.review_type.as_deref()),
        since: None,
        limit: parse_limit(query.limit.as_deref()),
    };
    Ok(Json(state.store.list_reviews(&user.user_id, filter).await?))
}

async fn get_review(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
) -> AppResult<Json<Review>> {
    Ok(Json(state.store.get_review(&user.user_id, &id).await?))
}

async fn update_review(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
    Json(patch): Json<ReviewPatch>,
) -> AppResult<Json<Review>> {
    Ok(Json(state.store.update_review(&user.user_id, &id, patch).await?))
}

async fn delete_review(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
) -> AppResult<Json<Deleted>> {
    state.store.delete_review(&user.user_id, &id).await?;
    Ok(Json(Deleted::new()))
}
