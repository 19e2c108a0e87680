//! Configuration management for the Personal OS API.
//!
//! Sources, lowest precedence first:
//! 1. Built-in defaults
//! 2. `config/personal-os.{toml,yaml,json}` (or the file given with `--config`)
//! 3. `PERSONAL_OS__SECTION__KEY` environment variables
//! 4. Well-known variables such as `JWT_SECRET` and `OPENAI_API_KEY`
//!
//! ```rust,ignore
//! use personal_os_api::config::{AppConfig, ConfigValidator};
//!
//! let config = AppConfig::load(None)?;
//! ConfigValidator::validate(&config)?;
//! ```

pub mod error;
pub mod validator;

pub use error::{ConfigResult, ConfigurationError};
pub use validator::ConfigValidator;

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Main application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    /// Auth and per-user rate limits.
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Text-generation provider credentials.
    #[serde(default)]
    pub providers: ProvidersConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub insights: InsightsConfig,
    #[serde(default)]
    pub autosave: AutosaveConfig,
    /// Object storage for uploads.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Payment provider.
    #[serde(default)]
    pub billing: BillingConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load and validate.
    pub fn load(path: Option<&str>) -> anyhow::Result<Self> {
        let config = Self::load_unchecked(path)?;
        ConfigValidator::validate(&config)
            .map_err(|e| anyhow::anyhow!("Configuration validation failed:\n\n{e}"))?;
        Ok(config)
    }

    /// Load without validation.
    pub fn load_unchecked(path: Option<&str>) -> anyhow::Result<Self> {
        // A missing .env file is normal.
        let _ = dotenvy::dotenv();

        let file = path.unwrap_or("config/personal-os");
        let mut app_config: AppConfig = config::Config::builder()
            .add_source(config::File::with_name(file).required(path.is_some()))
            .add_source(
                config::Environment::with_prefix("PERSONAL_OS")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?
            .try_deserialize()?;

        app_config.apply_env_overrides();
        Ok(app_config)
    }

    fn apply_env_overrides(&mut self) {
        let var = |name: &str| std::env::var(name).ok().filter(|v| !v.trim().is_empty());

        if let Some(secret) = var("JWT_SECRET") {
            self.gateway.jwt_secret = Some(secret);
        }
        if let Some(path) = var("DATABASE_PATH") {
            self.database.path = path;
        }
        if let Some(key) = var("OPENAI_API_KEY") {
            self.providers.openai.api_key = Some(key);
        }
        if let Some(key) = var("ANTHROPIC_API_KEY") {
            self.providers.anthropic.api_key = Some(key);
        }
        if let Some(url) = var("SUPABASE_URL") {
            self.storage.url = Some(url);
        }
        if let Some(key) = var("SUPABASE_SERVICE_ROLE_KEY") {
            self.storage.service_key = Some(key);
        }
        if let Some(key) = var("STRIPE_SECRET_KEY") {
            self.billing.secret_key = Some(key);
        }
        if let Some(secret) = var("STRIPE_WEBHOOK_SECRET") {
            self.billing.webhook_secret = Some(secret);
        }
        if let Some(price) = var("STRIPE_PRICE_ID") {
            self.billing.price_id = Some(price);
        }
        if let Some(url) = var("APP_URL") {
            self.billing.app_url = url;
        }
    }
}

/// HTTP listener.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Per-request timeout.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_timeout() -> u64 {
    60
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            timeout_secs: default_timeout(),
        }
    }
}

/// Gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    /// HS256 signing secret.
    pub jwt_secret: Option<String>,
    #[serde(default = "default_jwt_expiry")]
    pub jwt_expiry_secs: u64,
    /// Insight requests per minute per user.
    #[serde(default = "default_insights_per_minute")]
    pub insights_per_minute: u32,
    #[serde(default = "default_insights_burst")]
    pub insights_burst: u32,
}

fn default_jwt_expiry() -> u64 {
    86400 * 7
}

fn default_insights_per_minute() -> u32 {
    6
}

fn default_insights_burst() -> u32 {
    3
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            jwt_secret: None,
            jwt_expiry_secs: default_jwt_expiry(),
            insights_per_minute: default_insights_per_minute(),
            insights_burst: default_insights_burst(),
        }
    }
}

/// Relational store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite file, or `:memory:`.
    #[serde(default = "default_database_path")]
    pub path: String,
}

fn default_database_path() -> String {
    "data/personal-os.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
        }
    }
}

/// Text-generation providers. The first one with a key is used, OpenAI first.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProvidersConfig {
    #[serde(default)]
    pub openai: ProviderConfig,
    #[serde(default)]
    pub anthropic: ProviderConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    pub api_key: Option<String>,
    /// Base URL override, e.g. an OpenAI-compatible gateway.
    pub base_url: Option<String>,
    pub default_model: Option<String>,
}

impl ProviderConfig {
    #[must_use]
    pub fn is_configured(&self) -> bool {
        self.api_key.as_deref().is_some_and(|k| !k.trim().is_empty())
    }
}

/// Generation parameters shared by every provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Overrides the provider's default model.
    pub model: Option<String>,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

fn default_max_tokens() -> u32 {
    1500
}

fn default_temperature() -> f32 {
    0.7
}

fn default_llm_timeout() -> u64 {
    60
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            model: None,
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_secs: default_llm_timeout(),
        }
    }
}

/// Corpus bounds for insight requests.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsightsConfig {
    /// Most items sent in one request.
    #[serde(default = "default_max_items")]
    pub max_items: usize,
    /// Review window when the caller gives none.
    #[serde(default = "default_window_days")]
    pub default_window_days: u32,
}

fn default_max_items() -> usize {
    50
}

fn default_window_days() -> u32 {
    90
}

impl Default for InsightsConfig {
    fn default() -> Self {
        Self {
            max_items: default_max_items(),
            default_window_days: default_window_days(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutosaveConfig {
    /// Quiet period after the last edit before a write.
    #[serde(default = "default_debounce")]
    pub debounce_secs: u64,
}

fn default_debounce() -> u64 {
    30
}

impl AutosaveConfig {
    #[must_use]
    pub fn debounce(&self) -> Duration {
        Duration::from_secs(self.debounce_secs)
    }
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        Self {
            debounce_secs: default_debounce(),
        }
    }
}

/// Where upload bytes go.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Supabase storage REST API.
    Supabase,
    /// Process memory. Development and tests only.
    Memory,
    /// Upload routes answer 503.
    #[default]
    Disabled,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    pub url: Option<String>,
    pub service_key: Option<String>,
    #[serde(default = "default_bucket")]
    pub bucket: String,
    #[serde(default = "default_signed_url_ttl")]
    pub signed_url_ttl_secs: u64,
}

fn default_bucket() -> String {
    "uploads".to_string()
}

fn default_signed_url_ttl() -> u64 {
    3600
}

impl StorageConfig {
    /// Backend after credentials are taken into account: supabase
    /// credentials without an explicit backend select supabase.
    #[must_use]
    pub fn effective_backend(&self) -> StorageBackend {
        match self.backend {
            StorageBackend::Disabled if self.url.is_some() && self.service_key.is_some() => {
                StorageBackend::Supabase
            }
            other => other,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            url: None,
            service_key: None,
            bucket: default_bucket(),
            signed_url_ttl_secs: default_signed_url_ttl(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BillingConfig {
    pub secret_key: Option<String>,
    pub webhook_secret: Option<String>,
    pub price_id: Option<String>,
    /// Base URL for checkout and portal redirects.
    #[serde(default = "default_app_url")]
    pub app_url: String,
    /// Maximum age of a signed webhook.
    #[serde(default = "default_webhook_tolerance")]
    pub webhook_tolerance_secs: u64,
    #[serde(default = "default_stripe_api")]
    pub api_base: String,
}

fn default_app_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_webhook_tolerance() -> u64 {
    300
}

fn default_stripe_api() -> String {
    "https://api.stripe.com".to_string()
}

impl Default for BillingConfig {
    fn default() -> Self {
        Self {
            secret_key: None,
            webhook_secret: None,
            price_id: None,
            app_url: default_app_url(),
            webhook_tolerance_secs: default_webhook_tolerance(),
            api_base: default_stripe_api(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    /// One JSON object per line.
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}
