use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{LlmProvider, LlmRequest, LlmResponse, UsageMetadata};

/// Any chat-completions endpoint speaking the OpenAI wire format.
/// `endpoint` is the full `.../chat/completions` URL.
pub struct RemoteLlmProvider {
    endpoint: String,
    api_key: String,
    model: String,
    default_timeout: Duration,
    default_max_tokens: usize,
    default_temperature: f32,
    client: reqwest::Client,
}

impl RemoteLlmProvider {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            model: model.into(),
            default_timeout: Duration::from_secs(30),
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

    /// `.../v1/chat/completions` lists its models at `.../v1/models`
    fn models_url(&self) -> String {
        let endpoint = self.endpoint.trim_end_matches('/');
        let root = endpoint
            .strip_suffix("/chat/completions")
            .or_else(|| endpoint.strip_suffix("/completions"))
            .unwrap_or(endpoint);
        format!("{}/models", root)
    }
}

#[async_trait::async_trait]
impl LlmProvider for RemoteLlmProvider {
    async fn generate(&self, request: LlmRequest) -> Result<LlmResponse> {
        let timeout = request
            .timeout_seconds
            .map(Duration::from_secs)
            .unwrap_or(self.default_timeout);

        let body = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user".to_string(),
                content: request.prompt,
            }],
            max_tokens: request.max_tokens.unwrap_or(self.default_max_tokens),
            temperature: request.temperature.unwrap_or(self.default_temperature),
            // JSON mode; providers without it ignore the field
            response_format: request.json_output.then(|| ResponseFormat {
                kind: "json_object".to_string(),
            }),
        };

        let response = tokio::time::timeout(
            timeout,
            self.client
                .post(&self.endpoint)
                .bearer_auth(&self.api_key)
                .json(&body)
                .send(),
        )
        .await
        .context("Chat completion request timed out")?
        .context("Chat completion HTTP request failed")?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            anyhow::bail!("LLM API error {}: {}", status, detail);
        }

        let completion: ChatResponse = response
            .json()
            .await
            .context("Failed to parse chat completion")?;

        let content = completion
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .context("Chat completion has no choices")?;

        let usage = completion.usage.unwrap_or_default();
        Ok(LlmResponse {
            content,
            usage: UsageMetadata {
                prompt_tokens: usage.prompt_tokens,
                completion_tokens: usage.completion_tokens,
                total_tokens: usage.total_tokens,
            },
            model: completion.model.unwrap_or_else(|| self.model.clone()),
        })
    }

    async fn list_models(&self) -> Result<Vec<String>> {
        let url = self.models_url();
        let response = tokio::time::timeout(
            self.default_timeout,
            self.client.get(&url).bearer_auth(&self.api_key).send(),
        )
        .await
        .context("Model listing timed out")?
        .context("Model listing HTTP request failed")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Model listing error {}: {} (URL: {})", status, body, url);
        }

        let body: ModelList = response
            .json()
            .await
            .context("Failed to parse model listing")?;

        Ok(body.data.into_iter().map(|m| m.id).collect())
    }

    fn model(&self) -> &str {
        &self.model
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    max_tokens: usize,
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    model: Option<String>,
    #[serde(default)]
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ChatUsage {
    prompt_tokens: usize,
    completion_tokens: usize,
    total_tokens: usize,
}

#[derive(Debug, Deserialize)]
struct ModelList {
    data: Vec<ModelEntry>,
}

#[derive(Debug, Deserialize)]
struct ModelEntry {
    id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn models_url_is_derived_from_chat_endpoint() {
        let provider = RemoteLlmProvider::new("https://api.openai.com/v1/chat/completions", "k", "m");
        assert_eq!(provider.models_url(), "https://api.openai.com/v1/models");

        let provider = RemoteLlmProvider::new("http://localhost:8080/v1/", "k", "m");
        assert_eq!(provider.models_url(), "http://localhost:8080/v1/models");
    }
}
