use anyhow::{Context, Result};
use async_trait::async_trait;

use super::client::{ChatMessage, CompletionClient};
use crate::constants::{DEFAULT_MODEL, GROQ_API_BASE, LLM_REQUEST_TIMEOUT};

/// Groq API client (OpenAI-compatible chat completions).
pub struct GroqClient {
    api_key: String,
    model: String,
    client: reqwest::Client,
}

impl GroqClient {
    pub fn new(api_key: String) -> Self {
        Self::with_model(api_key, DEFAULT_MODEL.to_string())
    }

    pub fn with_model(api_key: String, model: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(LLM_REQUEST_TIMEOUT)
            .build()
            .expect("Failed to create LLM HTTP client");

        Self {
            api_key,
            model,
            client,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl CompletionClient for GroqClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let url = format!("{}/chat/completions", GROQ_API_BASE);

        let body = serde_json::json!({
            "model": self.model,
            "messages": messages,
        });

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .context("Failed to send chat completion request")?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            anyhow::bail!("Groq chat completion error ({}): {}", status, error_text);
        }

        let response_json: serde_json::Value = response
            .json()
            .await
            .context("Failed to parse Groq chat response")?;

        let reply = response_json["choices"][0]["message"]["content"]
            .as_str()
            .context("Failed to extract message content from response")?
            .trim()
            .to_string();

        Ok(reply)
    }
}
