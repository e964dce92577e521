use anyhow::{Context, Result};
use reqwest::Client;
use serde_json::Value;
use tracing::debug;

use crate::TextGenerator;

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_OPENAI_MODEL: &str = "gpt-4o-mini";

#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
}

impl OpenAiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_OPENAI_MODEL.to_string(),
            base_url: OPENAI_BASE_URL.to_string(),
        }
    }
}

/// Text generation over the OpenAI Responses API.
#[derive(Clone)]
pub struct OpenAiTextGenerator {
    http: Client,
    config: OpenAiConfig,
}

impl OpenAiTextGenerator {
    pub fn new(http: Client, config: OpenAiConfig) -> Self {
        Self { http, config }
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }
}

impl TextGenerator for OpenAiTextGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let payload = serde_json::json!({
            "model": self.config.model,
            "input": [
                {
                    "role": "user",
                    "content": [
                        { "type": "input_text", "text": prompt }
                    ]
                }
            ]
        });

        let url = format!("{}/responses", self.config.base_url.trim_end_matches('/'));
        let response = self
            .http
            .post(url)
            .bearer_auth(self.config.api_key.as_str())
            .json(&payload)
            .send()
            .await
            .context("OpenAI request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("OpenAI non-success status {}: {}", status.as_u16(), body);
        }

        let body: Value = response.json().await.context("OpenAI parse failed")?;
        let text = extract_openai_output_text(&body)
            .filter(|value| !value.trim().is_empty())
            .context("OpenAI output text missing")?;

        debug!(model = %self.config.model, chars = text.len(), "generation completed");
        Ok(text)
    }
}

pub fn extract_openai_output_text(payload: &Value) -> Option<String> {
    if let Some(value) = payload.get("output_text").and_then(|value| value.as_str()) {
        return Some(value.to_string());
    }
    let output = payload.get("output")?.as_array()?;
    let mut chunks = Vec::new();
    for item in output {
        let Some(content) = item.get("content").and_then(|value| value.as_array()) else {
            continue;
        };
        for content_item in content {
            let is_text = content_item
                .get("type")
                .and_then(|value| value.as_str())
                .is_some_and(|value| value == "output_text");
            if !is_text {
                continue;
            }
            if let Some(text) = content_item.get("text").and_then(|value| value.as_str()) {
                chunks.push(text.to_string());
            }
        }
    }
    if chunks.is_empty() {
        None
    } else {
        Some(chunks.join("\n\n"))
    }
}
