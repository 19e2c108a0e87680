//! OpenAI and OpenAI-compatible chat completions.

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};

use super::truncate_body;
use crate::llm::{Generation, LlmSettings, Prompt, Provider, TextGenerator};

#[derive(Debug, Clone)]
pub struct OpenAiGenerator {
    settings: LlmSettings,
    client: Client,
}

impl OpenAiGenerator {
    pub fn new(settings: LlmSettings) -> anyhow::Result<Self> {
        let client = Client::builder().timeout(settings.timeout).build()?;
        Ok(Self { settings, client })
    }

    fn api_url(&self) -> String {
        format!(
            "{}/v1/chat/completions",
            self.settings.base_url.trim_end_matches('/')
        )
    }

    fn request_body(&self, prompt: &Prompt) -> Value {
        json!({
            "model": self.settings.model,
            "messages": [
                { "role": "system", "content": prompt.system },
                { "role": "user", "content": prompt.user },
            ],
            "temperature": self.settings.temperature,
            "max_tokens": self.settings.max_tokens,
        })
    }
}

#[async_trait]
impl TextGenerator for OpenAiGenerator {
    async fn generate(&self, prompt: &Prompt) -> anyhow::Result<Generation> {
        let response = self
            .client
            .post(self.api_url())
            .bearer_auth(&self.settings.api_key)
            .json(&self.request_body(prompt))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            anyhow::bail!("OpenAI API error ({status}): {}", truncate_body(&text));
        }

        let completion: ChatCompletion = response.json().await?;
        completion.into_generation(&self.settings.model)
    }

    fn provider(&self) -> Provider {
        Provider::OpenAi
    }

    fn model(&self) -> &str {
        &self.settings.model
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    model: Option<String>,
    choices: Vec<Choice>,
    usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Usage {
    total_tokens: u32,
}

impl ChatCompletion {
    fn into_generation(self, requested_model: &str) -> anyhow::Result<Generation> {
        let text = self
            .choices
            .into_iter()
            .find_map(|c| c.message.content)
            .ok_or_else(|| anyhow::anyhow!("OpenAI response contained no message content"))?;
        Ok(Generation {
            text,
            model: self.model.unwrap_or_else(|| requested_model.to_string()),
            total_tokens: self.usage.map(|u| u.total_tokens),
        })
    }
}
