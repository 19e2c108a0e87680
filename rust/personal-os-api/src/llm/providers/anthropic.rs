//! Anthropic messages API.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};

use super::truncate_body;
use crate::llm::{Generation, LlmSettings, Prompt, Provider, TextGenerator};

const ANTHROPIC_VERSION: &str = "2023-06-01";

#[derive(Debug, Clone)]
pub struct AnthropicGenerator {
    settings: LlmSettings,
    client: Client,
}

impl AnthropicGenerator {
    pub fn new(settings: LlmSettings) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(settings.timeout).build()?;
        Ok(Self { settings, client })
    }

    fn api_url(&self) -> String {
        format!("{}/v1/messages", self.settings.base_url.trim_end_matches('/'))
    }

    /// The system prompt is a top-level field, not a message.
    fn request_body(&self, prompt: &Prompt) -> Value {
        json!({
            "model": self.settings.model,
            "system": prompt.system,
            "messages": [{ "role": "user", "content": prompt.user }],
            "temperature": self.settings.temperature,
            "max_tokens": self.settings.max_tokens,
        })
    }
}

#[async_trait]
impl TextGenerator for AnthropicGenerator {
    async fn generate(&self, prompt: &Prompt) -> anyhow::Result<Generation> {
        let response = self
            .client
            .post(self.api_url())
            .header("x-api-key", &self.settings.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&self.request_body(prompt))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("Anthropic API error ({status}): {}", truncate_body(&text));
        }

        let message: MessageResponse = response.json().await?;
        message.into_generation(&self.settings.model)
    }

    fn provider(&self) -> Provider {
        Provider::Anthropic
    }

    fn model(&self) -> &str {
        &self.settings.model
    }
}

#[derive(Debug, Deserialize)]
struct MessageResponse {
    model: Option<String>,
    content: Vec<ContentBlock>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text { text: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct Usage {
    input_tokens: u32,
    output_tokens: u32,
}

impl MessageResponse {
    fn into_generation(self, requested_model: &str) -> anyhow::Result<Generation> {
        let text: String = self
            .content
            .into_iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text),
                ContentBlock::Other => None,
            })
            .collect();
        if text.is_empty() {
            anyhow::bail!("Anthropic response contained no text blocks");
        }
        Ok(Generation {
            text,
            model: self.model.unwrap_or_else(|| requested_model.to_string()),
            total_tokens: self.usage.map(|u| u.input_tokens + u.output_tokens),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    fn settings() -> LlmSettings {
        LlmSettings {
            provider: Provider::Anthropic,
            base_url: "https://api.anthropic.com".to_string(),
            api_key: "sk-ant-test".to_string(),
            model: "claude-3-5-haiku-latest".to_string(),
            max_tokens: 1500,
            temperature: 0.7,
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn test_system_prompt_is_top_level() {
        let generator = AnthropicGenerator::new(settings()).unwrap();
        assert_eq!(generator.api_url(), "https://api.anthropic.com/v1/messages");

        let body = generator.request_body(&Prompt::new("coach", "analyze"));
        assert_eq!(body["system"], "coach");
        assert_eq!(body["messages"].as_array().unwrap().len(), 1);
        assert_eq!(body["messages"][0]["role"], "user");
    }

    #[test]
    fn test_text_blocks_are_joined() {
        let response: MessageResponse = serde_json::from_value(json!({
            "id": "msg_1",
            "type": "message",
            "model": "claude-3-5-haiku-20241022",
            "content": [
                { "type": "text", "text": "Part one. " },
                { "type": "tool_use", "id": "t", "name": "x", "input": {} },
                { "type": "text", "text": "Part two." }
            ],
            "usage": { "input_tokens": 7, "output_tokens": 3 }
        }))
        .unwrap();
        let generation = response.into_generation("claude").unwrap();
        assert_eq!(generation.text, "Part one. Part two.");
        assert_eq!(generation.total_tokens, Some(10));
    }
}
