//! Personal OS API - journaling, goals and reflection service.
//!
//! Users keep dated reviews (daily, weekly, quarterly, annual), goals on
//! one, three and ten year horizons, one-time self-reflection interviews,
//! long-form markdown documents and uploaded files. Optional collaborators
//! add AI insights, object storage and subscription billing.
//!
//! # Architecture
//!
//! - [`config`]: layered configuration and startup validation
//! - [`database`]: SQLite store and owner-scoped repository traits
//! - [`domain`]: entry models, the content codec and dashboard aggregates
//! - [`journal`]: the entry store and debounced autosave sessions
//! - [`gateway`]: accounts, session tokens and rate limits
//! - [`insights`] / [`llm`]: corpus building and text generation
//! - [`storage`]: upload validation and object storage backends
//! - [`billing`]: payment provider webhooks and the subscription mirror
//! - [`api`]: HTTP endpoints
//!
//! # Example
//!
//! ```rust,ignore
//! use personal_os_api::{config::AppConfig, server::create_app};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = AppConfig::load(None)?;
//!     let (app, _state) = create_app(config).await?;
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod billing;
pub mod config;
pub mod database;
pub mod domain;
pub mod error;
pub mod gateway;
pub mod insights;
pub mod journal;
pub mod llm;
pub mod logging;
pub mod server;
pub mod storage;

use std::sync::Arc;

use billing::BillingService;
use config::AppConfig;
use database::Database;
use gateway::rate_limit::UserRateLimiters;
use insights::InsightRequester;
use journal::{EditorSessions, EntryStore};
use storage::UploadService;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: Database,
    pub store: EntryStore,
    /// Open document editing sessions.
    pub sessions: EditorSessions,
    pub insights: InsightRequester,
    pub uploads: UploadService,
    pub billing: BillingService,
    pub insight_limiters: Arc<UserRateLimiters>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("db", &self.db)
            .field("open_sessions", &self.sessions.len())
            .field("insights", &self.insights)
            .field("uploads", &self.uploads)
            .field("billing", &self.billing)
            .finish_non_exhaustive()
    }
}
