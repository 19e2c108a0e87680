//! Gateway: accounts, session tokens and per-user rate limits.

pub mod accounts;
pub mod auth;
pub mod rate_limit;

use axum::Router;

use crate::AppState;

/// Account routes. Everything else lives under [`crate::api`].
pub fn create_router() -> Router<AppState> {
    Router::new().merge(accounts::router())
}
