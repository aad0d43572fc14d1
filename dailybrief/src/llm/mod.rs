use anyhow::Result;
use common::{require_env, LlmConfig};

/// Core trait for text-generation backends
#[async_trait::async_trait]
pub trait LlmProvider: Send + Sync {
    /// Generate completion for a given prompt
    async fn generate(&self, request: LlmRequest) -> Result<LlmResponse>;

    /// Models visible to the configured credentials
    async fn list_models(&self) -> Result<Vec<String>>;

    /// Model used for generation
    fn model(&self) -> &str;
}

/// Request structure for LLM generation
#[derive(Debug, Clone, Default)]
pub struct LlmRequest {
    pub prompt: String,
    pub max_tokens: Option<usize>,
    pub temperature: Option<f32>,
    pub timeout_seconds: Option<u64>,
    /// Ask the backend to constrain its output to a JSON document
    pub json_output: bool,
}

/// Response from LLM generation
#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub content: String,
    pub usage: UsageMetadata,
    pub model: String,
}

/// Token usage metadata
#[derive(Debug, Clone, Default)]
pub struct UsageMetadata {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub total_tokens: usize,
}

pub mod gemini;
pub mod ollama;
pub mod remote;

/// Build the provider selected by `llm.adapter`.
/// Fails when the adapter is unknown or its API key variable is not set.
pub fn create_provider(llm_config: &LlmConfig) -> Result<Box<dyn LlmProvider>> {
    let endpoint = llm_config.endpoint();
    let timeout_secs = endpoint.timeout_seconds.unwrap_or(60);
    let max_tokens = endpoint.max_tokens.unwrap_or(500);
    let temperature = endpoint.temperature.unwrap_or(0.2);

    match llm_config.adapter() {
        "gemini" => {
            let api_key = require_env(endpoint.api_key_env.as_deref().unwrap_or("GEMINI_API_KEY"))?;
            let mut provider = gemini::GeminiProvider::new(
                api_key,
                endpoint.model.unwrap_or_else(|| gemini::DEFAULT_MODEL.to_string()),
            );
            if let Some(api_url) = endpoint.api_url {
                provider = provider.with_base_url(api_url);
            }
            Ok(Box::new(provider.with_defaults(timeout_secs, max_tokens, temperature)))
        }
        "remote" => {
            let api_key_env = endpoint
                .api_key_env
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("Missing api_key_env in [llm.remote] config"))?;
            let api_key = require_env(api_key_env)?;
            let model = endpoint.model.unwrap_or_else(|| "gpt-4o-mini".to_string());
            let api_url = endpoint
                .api_url
                .unwrap_or_else(|| "https://api.openai.com/v1/chat/completions".to_string());

            let provider = remote::RemoteLlmProvider::new(api_url, api_key, model)
                .with_defaults(timeout_secs, max_tokens, temperature);
            Ok(Box::new(provider))
        }
        "ollama" => {
            let api_url = endpoint
                .api_url
                .unwrap_or_else(|| ollama::DEFAULT_BASE_URL.to_string());
            let model = endpoint.model.unwrap_or_else(|| ollama::DEFAULT_MODEL.to_string());
            // Local models are slow; default to a generous timeout
            let timeout_secs = endpoint.timeout_seconds.unwrap_or(120);

            let provider = ollama::OllamaProvider::new(api_url, model)
                .with_defaults(timeout_secs, max_tokens, temperature);
            Ok(Box::new(provider))
        }
        other => anyhow::bail!("Unknown LLM adapter type: {}", other),
    }
}

/// Helper to extract JSON from text that might contain markdown backticks or preamble
pub fn extract_json_from_text(text: &str) -> Option<String> {
    // 1. The whole reply is already a JSON object
    let trimmed = text.trim();
    if trimmed.starts_with('{') && serde_json::from_str::<serde_json::Value>(trimmed).is_ok() {
        return Some(trimmed.to_string());
    }

    // 2. Content between ```json and ```
    if let Some(start) = text.find("```json") {
        let rest = &text[start + 7..];
        if let Some(end) = rest.find("```") {
            return Some(rest[..end].trim().to_string());
        }
    }

    // 3. Content between ``` and ```, only when it holds an object
    if let Some(start) = text.find("```") {
        let rest = &text[start + 3..];
        if let Some(end) = rest.find("```") {
            let fenced = rest[..end].trim();
            if fenced.starts_with('{') {
                return Some(fenced.to_string());
            }
        }
    }

    // 4. First '{' to last '}'
    if let (Some(start), Some(end)) = (text.find('{'), text.rfind('}')) {
        if start < end {
            return Some(text[start..=end].to_string());
        }
    }

    None
}
