use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{LlmProvider, LlmRequest, LlmResponse, UsageMetadata};

pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";
pub const DEFAULT_MODEL: &str = "llama3.2";

/// Local Ollama server (`/api/generate`, non-streaming)
pub struct OllamaProvider {
    base_url: String,
    model: String,
    default_timeout: Duration,
    default_max_tokens: usize,
    default_temperature: f32,
    client: reqwest::Client,
}

impl OllamaProvider {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
            default_timeout: Duration::from_secs(120),
            default_max_tokens: 500,
            default_temperature: 0.2,
            client: reqwest::Client::new(),
        }
    }

    pub fn with_defaults(mut self, timeout_secs: u64, max_tokens: usize, temperature: f32) -> Self {
        self.default_timeout = Duration::from_secs(timeout_secs);
        self.default_max_tokens = max_tokens;
        self.default_temperature = temperature;
        self
    }
}

#[async_trait::async_trait]
impl LlmProvider for OllamaProvider {
    async fn generate(&self, request: LlmRequest) -> Result<LlmResponse> {
        let timeout = request
            .timeout_seconds
            .map(Duration::from_secs)
            .unwrap_or(self.default_timeout);

        let req_body = GenerateRequest {
            model: self.model.clone(),
            prompt: request.prompt,
            stream: false,
            format: request.json_output.then(|| "json".to_string()),
            options: GenerateOptions {
                temperature: request.temperature.unwrap_or(self.default_temperature),
                num_predict: request.max_tokens.unwrap_or(self.default_max_tokens),
            },
        };

        let response = tokio::time::timeout(
            timeout,
            self.client
                .post(format!("{}/api/generate", self.base_url))
                .json(&req_body)
                .send(),
        )
        .await
        .context("Ollama request timed out")?
        .context("Ollama HTTP request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Ollama API error {}: {}", status, body);
        }

        let resp_body: GenerateResponse = response
            .json()
            .await
            .context("Failed to parse Ollama response")?;

        let prompt_tokens = resp_body.prompt_eval_count.unwrap_or(0);
        let completion_tokens = resp_body.eval_count.unwrap_or(0);

        Ok(LlmResponse {
            content: resp_body.response,
            usage: UsageMetadata {
                prompt_tokens,
                completion_tokens,
                total_tokens: prompt_tokens + completion_tokens,
            },
            model: resp_body.model.unwrap_or_else(|| self.model.clone()),
        })
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        let response = tokio::time::timeout(
            self.default_timeout,
            self.client.get(format!("{}/api/tags", self.base_url)).send(),
        )
        .await
        .context("Model listing timed out")?
        .context("Is Ollama running? Model listing HTTP request failed")?;

        if !response.status().is_success() {
            anyhow::bail!("Ollama model listing error {}", response.status());
        }

        let body: TagList = response
            .json()
            .await
            .context("Failed to parse Ollama model listing")?;

        Ok(body.models.into_iter().map(|m| m.name).collect())
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest {
    model: String,
    prompt: String,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<String>,
    options: GenerateOptions,
}

#[derive(Debug, Serialize)]
struct GenerateOptions {
    temperature: f32,
    num_predict: usize,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    model: Option<String>,
    response: String,
    prompt_eval_count: Option<usize>,
    eval_count: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct TagList {
    #[serde(default)]
    models: Vec<TagEntry>,
}

#[derive(Debug, Deserialize)]
struct TagEntry {
    name: String,
}
