//! Billing endpoints, including the payment provider webhook.

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::HeaderMap,
    routing::{get, post},
};
use serde::Serialize;

use crate::AppState;
use crate::billing::{RedirectUrl, SIGNATURE_HEADER};
use crate::domain::Subscription;
use crate::error::AppResult;
use crate::gateway::auth::AuthenticatedUser;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/v1/billing/webhook", post(webhook))
        .route("/api/v1/billing/subscription", get(subscription))
        .route("/api/v1/billing/checkout", post(checkout))
        .route("/api/v1/billing/portal", post(portal))
}

#[derive(Debug, Serialize)]
pub struct Received {
    pub received: bool,
}

/// Public route. The signature check stands in for authentication, so the
/// raw body is verified before anything is parsed.
async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<Received>> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());
    let now = chrono::Utc::now().timestamp();
    let outcome = state.billing.handle_webhook(&body, signature, now).await?;
    tracing::debug!(outcome = ?outcome, "Webhook handled");
    Ok(Json(Received { received: true }))
}

async fn subscription(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<Option<Subscription>>> {
    Ok(Json(state.billing.subscription(&user.user_id).await?))
}

async fn checkout(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<RedirectUrl>> {
    Ok(Json(state.billing.checkout(&user.user_id).await?))
}

async fn portal(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> AppResult<Json<RedirectUrl>> {
    Ok(Json(state.billing.portal(&user.user_id).await?))
}
