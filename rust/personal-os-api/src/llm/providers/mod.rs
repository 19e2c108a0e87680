//! Provider implementations.

mod anthropic;
mod openai;

pub use anthropic::AnthropicGenerator;
pub use openai::OpenAiGenerator;

use std::sync::Arc;

use super::{LlmSettings, Provider, TextGenerator};

/// Build the generator for these settings.
pub fn create_generator(settings: LlmSettings) -> anyhow::Result<Arc<dyn TextGenerator>> {
    Ok(match settings.provider {
        Provider::OpenAi => Arc::new(OpenAiGenerator::new(settings)?),
        Provider::Anthropic => Arc::new(AnthropicGenerator::new(settings)?),
    })
}

/// Trim a provider error body for logs and messages.
pub(crate) fn truncate_body(body: &str) -> &str {
    const MAX: usize = 500;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}
