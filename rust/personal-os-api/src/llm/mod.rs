//! Text-generation provider abstraction.
//!
//! [`TextGenerator`] is the narrow contract the insight pipeline depends on:
//! a system preamble plus one user prompt in, generated text out.
//!
//! - [`providers::OpenAiGenerator`]: OpenAI and compatible chat-completions APIs
//! - [`providers::AnthropicGenerator`]: Anthropic messages API

pub mod providers;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::AppConfig;

/// Connection and sampling settings for one provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSettings {
    pub provider: Provider,
    pub base_url: String,
    pub api_key: String,
    pub model: String,
    pub max_tokens: u32,
    pub temperature: f32,
    #[serde(with = "secs")]
    pub timeout: Duration,
}

mod secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}

impl LlmSettings {
    /// Settings for the first provider with a key, OpenAI first.
    #[must_use]
    pub fn from_config(config: &AppConfig) -> Option<Self> {
        let (provider, provider_config) = [
            (Provider::OpenAi, &config.providers.openai),
            (Provider::Anthropic, &config.providers.anthropic),
        ]
        .into_iter()
        .find(|(_, p)| p.is_configured())?;

        Some(Self {
            provider,
            base_url: provider_config
                .base_url
                .clone()
                .unwrap_or_else(|| provider.default_base_url().to_string()),
            api_key: provider_config.api_key.clone()?,
            model: config
                .llm
                .model
                .clone()
                .or_else(|| provider_config.default_model.clone())
                .unwrap_or_else(|| provider.default_model().to_string()),
            max_tokens: config.llm.max_tokens,
            temperature: config.llm.temperature,
            timeout: Duration::from_secs(config.llm.timeout_secs),
        })
    }
}

/// Supported providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    OpenAi,
    Anthropic,
}

impl Provider {
    #[must_use]
    pub fn default_base_url(self) -> &'static str {
        match self {
            Self::OpenAi => "https://api.openai.com",
            Self::Anthropic => "https://api.anthropic.com",
        }
    }

    #[must_use]
    pub fn default_model(self) -> &'static str {
        match self {
            Self::OpenAi => "gpt-4o-mini",
            Self::Anthropic => "claude-3-5-haiku-latest",
        }
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::OpenAi => "openai",
            Self::Anthropic => "anthropic",
        })
    }
}

/// One generation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    /// Instructional preamble.
    pub system: String,
    pub user: String,
}

impl Prompt {
    #[must_use]
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
        }
    }
}

/// Generated text plus what produced it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Generation {
    pub text: String,
    pub model: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_tokens: Option<u32>,
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    /// Fails when the provider is unreachable or answers with an error.
    async fn generate(&self, prompt: &Prompt) -> anyhow::Result<Generation>;

    fn provider(&self) -> Provider;

    fn model(&self) -> &str;
}
