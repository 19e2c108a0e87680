//! Startup validation of configuration combinations.

use super::error::{ConfigResult, ConfigurationError};
use super::{AppConfig, StorageBackend};

/// Minimum JWT secret length in bytes.
pub const MIN_JWT_SECRET_LEN: usize = 16;

/// Rejects configurations the server cannot run with. Every problem found
/// is reported, not just the first.
#[derive(Debug)]
pub struct ConfigValidator;

impl ConfigValidator {
    pub fn validate(config: &AppConfig) -> ConfigResult<()> {
        let mut errors = Vec::new();
        Self::check_server(config, &mut errors);
        Self::check_gateway(config, &mut errors);
        Self::check_llm(config, &mut errors);
        Self::check_storage(config, &mut errors);
        ConfigurationError::collect(errors)
    }

    fn check_server(config: &AppConfig, errors: &mut Vec<ConfigurationError>) {
        if config.server.port == 0 {
            errors.push(ConfigurationError::invalid(
                "server.port is 0",
                "Set --port or PERSONAL_OS__SERVER__PORT to a free port, e.g. 8080",
            ));
        }
        if config.autosave.debounce_secs == 0 {
            errors.push(ConfigurationError::invalid(
                "autosave.debounce_secs is 0, which would write on every keystroke",
                "Set PERSONAL_OS__AUTOSAVE__DEBOUNCE_SECS to a positive number (default 30)",
            ));
        }
        if config.insights.max_items == 0 {
            errors.push(ConfigurationError::invalid(
                "insights.max_items is 0, so no corpus could ever be built",
                "Set PERSONAL_OS__INSIGHTS__MAX_ITEMS to a positive number (default 50)",
            ));
        }
    }

    fn check_gateway(config: &AppConfig, errors: &mut Vec<ConfigurationError>) {
        match config.gateway.jwt_secret.as_deref() {
            None => errors.push(ConfigurationError::missing_required(
                "gateway.jwt_secret",
                "Signing and verifying session tokens",
                "JWT_SECRET",
            )),
            Some(secret) if secret.len() < MIN_JWT_SECRET_LEN => {
                errors.push(ConfigurationError::invalid(
                    format!("JWT secret is {} bytes long", secret.len()),
                    format!("Use a random secret of at least {MIN_JWT_SECRET_LEN} bytes in JWT_SECRET"),
                ));
            }
            Some(_) => {}
        }
        if config.gateway.insights_per_minute == 0 || config.gateway.insights_burst == 0 {
            errors.push(ConfigurationError::invalid(
                "insight rate limit is 0",
                "Set gateway.insights_per_minute and gateway.insights_burst to at least 1",
            ));
        }
    }

    fn check_llm(config: &AppConfig, errors: &mut Vec<ConfigurationError>) {
        let temperature = config.llm.temperature;
        if !(0.0..=2.0).contains(&temperature) {
            errors.push(ConfigurationError::invalid(
                format!("llm.temperature is {temperature}"),
                "Use a value between 0.0 and 2.0",
            ));
        }
        if config.llm.max_tokens == 0 {
            errors.push(ConfigurationError::invalid(
                "llm.max_tokens is 0",
                "Set PERSONAL_OS__LLM__MAX_TOKENS to a positive number (default 1500)",
            ));
        }
    }

    fn check_storage(config: &AppConfig, errors: &mut Vec<ConfigurationError>) {
        let storage = &config.storage;
        if storage.backend != StorageBackend::Supabase {
            return;
        }
        if storage.url.is_none() {
            errors.push(ConfigurationError::missing_required(
                "storage.url",
                "Supabase upload storage",
                "SUPABASE_URL",
            ));
        }
        if storage.service_key.is_none() {
            errors.push(ConfigurationError::missing_required(
                "storage.service_key",
                "Supabase upload storage",
                "SUPABASE_SERVICE_ROLE_KEY",
            ));
        }
        if let Some(url) = storage.url.as_deref()
            && url::Url::parse(url).is_err()
        {
            errors.push(ConfigurationError::invalid(
                format!("storage.url '{url}' is not a URL"),
                "Use the project URL, e.g. https://<project>.supabase.co",
            ));
        }
    }
}
