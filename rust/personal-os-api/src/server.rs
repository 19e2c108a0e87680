//! HTTP server setup and middleware.

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::billing::BillingService;
use crate::config::{AppConfig, StorageBackend, StorageConfig};
use crate::database::Database;
use crate::gateway::rate_limit::UserRateLimiters;
use crate::insights::InsightRequester;
use crate::journal::{EditorSessions, EntryStore};
use crate::llm::LlmSettings;
use crate::llm::providers::create_generator;
use crate::logging::OpTimer;
use crate::storage::{MemoryStorage, ObjectStorage, SupabaseStorage, UploadService};
use crate::{AppState, api, gateway};
use crate::{log_banner, log_init_step, log_init_warning, log_success};

/// API version (from Cargo.toml).
const VERSION: &str = env!("CARGO_PKG_VERSION");

const STEPS: u32 = 6;

/// Build shared state and the router.
///
/// The state is returned alongside the router so the caller can flush
/// editing sessions on shutdown.
pub async fn create_app(config: AppConfig) -> anyhow::Result<(Router, AppState)> {
    let overall_timer = OpTimer::new("server", "create_app");
    log_banner!(
        format!("Personal OS API v{VERSION}"),
        format!("Listening on {}:{}", config.server.host, config.server.port)
    );

    // [1/6] Relational store
    let step_timer = OpTimer::new("server", "database");
    let db = Database::open(&config.database.path).await?;
    let store = EntryStore::new(db.clone());
    log_init_step!(1, STEPS, "Database", format!("🗄️  SQLite at {}", db.path()));
    step_timer.finish();

    // [2/6] Editing sessions
    let debounce = config.autosave.debounce();
    let sessions = EditorSessions::new(store.clone(), debounce);
    log_init_step!(2, STEPS, "Autosave", format!("📝 Debounce {}s", debounce.as_secs()));

    // [3/6] Text generation
    let step_timer = OpTimer::new("server", "llm");
    let generator = match LlmSettings::from_config(&config) {
        Some(settings) => {
            let detail = format!("🤖 {} ({})", settings.provider, settings.model);
            let generator = create_generator(settings)?;
            log_init_step!(3, STEPS, "Insights", detail);
            Some(generator)
        }
        None => {
            log_init_step!(3, STEPS, "Insights", "🤖 Disabled");
            log_init_warning!("No LLM API key configured. Insight requests will return 503.");
            None
        }
    };
    let insights = InsightRequester::new(store.clone(), generator, config.insights.clone());
    step_timer.finish();

    // [4/6] Object storage
    let storage = create_storage(&config.storage)?;
    let uploads = UploadService::new(
        store.clone(),
        storage,
        Duration::from_secs(config.storage.signed_url_ttl_secs),
    );

    // [5/6] Billing
    let billing = BillingService::from_config(db.clone(), &config.billing)?;
    if billing.is_configured() {
        log_init_step!(5, STEPS, "Billing", "💳 Payment provider configured");
    } else {
        log_init_step!(5, STEPS, "Billing", "💳 Disabled");
    }
    if config.billing.webhook_secret.is_none() {
        log_init_warning!("No webhook secret configured. Webhook deliveries will fail.");
    }

    let insight_limiters = Arc::new(UserRateLimiters::new(
        config.gateway.insights_per_minute,
        config.gateway.insights_burst,
    ));

    let state = AppState {
        config: Arc::new(config),
        db,
        store,
        sessions,
        insights,
        uploads,
        billing,
        insight_limiters,
    };

    // [6/6] Router and middleware
    let app = create_router(state.clone());
    log_init_step!(6, STEPS, "Router", "🌐 Routes + middleware configured");

    overall_timer.finish();
    log_success!("Personal OS API server created successfully");

    Ok((app, state))
}

/// All routes with middleware applied.
pub fn create_router(state: AppState) -> Router {
    let timeout = Duration::from_secs(state.config.server.timeout_secs);

    Router::new()
        .merge(api::create_router(state.clone()))
        .merge(gateway::create_router())
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            gateway::auth::auth_middleware,
        ))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TimeoutLayer::with_status_code(
            axum::http::StatusCode::REQUEST_TIMEOUT,
            timeout,
        ))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn create_storage(config: &StorageConfig) -> anyhow::Result<Option<Arc<dyn ObjectStorage>>> {
    let storage: Option<Arc<dyn ObjectStorage>> = match config.effective_backend() {
        StorageBackend::Supabase => {
            let (Some(url), Some(key)) = (config.url.as_deref(), config.service_key.as_deref()) else {
                anyhow::bail!("Supabase storage needs both a URL and a service key");
            };
            log_init_step!(4, STEPS, "Storage", format!("📦 Supabase bucket '{}'", config.bucket));
            Some(Arc::new(SupabaseStorage::new(url, key, &config.bucket)?))
        }
        StorageBackend::Memory => {
            log_init_step!(4, STEPS, "Storage", "📦 In-memory (not persisted)");
            Some(Arc::new(MemoryStorage::new(&config.bucket)))
        }
        StorageBackend::Disabled => {
            log_init_step!(4, STEPS, "Storage", "📦 Disabled");
            log_init_warning!("No object storage configured. Uploads will return 503.");
            None
        }
    };
    Ok(storage)
}
