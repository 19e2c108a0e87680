//! Per-user rate limiting for expensive endpoints.

use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use governor::{
    Quota, RateLimiter,
    clock::{Clock, DefaultClock},
    middleware::NoOpMiddleware,
    state::{InMemoryState, NotKeyed},
};
use parking_lot::Mutex;

use super::auth::AuthenticatedUser;
use crate::AppState;
use crate::error::{AppError, AppResult};

type DirectRateLimiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock, NoOpMiddleware>;

/// One token bucket per user.
pub struct UserRateLimiters {
    limiters: Mutex<HashMap<String, Arc<DirectRateLimiter>>>,
    quota: Quota,
    clock: DefaultClock,
}

impl std::fmt::Debug for UserRateLimiters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UserRateLimiters")
            .field("users", &self.limiters.lock().len())
            .field("quota", &self.quota)
            .finish_non_exhaustive()
    }
}

impl UserRateLimiters {
    /// Zero values are raised to one; the validator rejects them earlier.
    #[must_use]
    pub fn new(requests_per_minute: u32, burst: u32) -> Self {
        let per_minute = NonZeroU32::new(requests_per_minute).unwrap_or(NonZeroU32::MIN);
        let burst = NonZeroU32::new(burst).unwrap_or(NonZeroU32::MIN);
        Self {
            limiters: Mutex::new(HashMap::new()),
            quota: Quota::per_minute(per_minute).allow_burst(burst),
            clock: DefaultClock::default(),
        }
    }

    fn get_or_create(&self, user_id: &str) -> Arc<DirectRateLimiter> {
        let mut limiters = self.limiters.lock();
        Arc::clone(
            limiters
                .entry(user_id.to_string())
                .or_insert_with(|| Arc::new(RateLimiter::direct(self.quota))),
        )
    }

    /// Take one request from the user's bucket.
    pub fn check(&self, user_id: &str) -> AppResult<()> {
        match self.get_or_create(user_id).check() {
            Ok(()) => Ok(()),
            Err(not_until) => {
                let wait = not_until.wait_time_from(self.clock.now());
                // Round up so clients never retry early.
                let retry_after_secs = wait.as_secs() + u64::from(wait.subsec_nanos() > 0);
                tracing::info!(user_id = %user_id, retry_after_secs, "Rate limit exceeded");
                Err(AppError::RateLimited {
                    retry_after_secs: retry_after_secs.max(1),
                })
            }
        }
    }
}

/// Applies the insights quota. Runs after authentication.
pub async fn insights_rate_limit(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let user = req
        .extensions()
        .get::<AuthenticatedUser>()
        .ok_or_else(|| AppError::unauthorized("Authentication required"))?;
    state.insight_limiters.check(&user.user_id)?;
    Ok(next.run(req).await)
}
