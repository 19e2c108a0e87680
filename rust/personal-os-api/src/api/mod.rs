//! HTTP API endpoints.
//!
//! Handlers are thin: resolve the caller, call one service, serialize.

pub mod billing;
pub mod dashboard;
pub mod documents;
pub mod export;
pub mod goals;
pub mod health;
pub mod insights;
pub mod interviews;
pub mod reviews;
pub mod search;
pub mod sessions;
pub mod uploads;

use axum::Router;
use serde::Serialize;

use crate::AppState;
use crate::journal::clamp_limit;

/// Create the API router.
pub fn create_router(state: AppState) -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(reviews::router())
        .merge(goals::router())
        .merge(interviews::router())
        .merge(documents::router())
        .merge(sessions::router())
        .merge(uploads::router())
        .merge(insights::router(state))
        .merge(billing::router())
        .merge(dashboard::router())
        .merge(search::router())
        .merge(export::router())
}

/// Body returned by delete endpoints.
#[derive(Debug, Serialize)]
pub struct Deleted {
    pub success: bool,
}

impl Deleted {
    #[must_use]
    pub fn new() -> Self {
        Self { success: true }
    }
}

impl Default for Deleted {
    fn default() -> Self {
        Self::new()
    }
}

/// Lenient `limit` query parameter: garbage is ignored, numbers are clamped.
pub(crate) fn parse_limit(raw: Option<&str>) -> Option<usize> {
    clamp_limit(raw.and_then(|v| v.trim().parse().ok()))
}
