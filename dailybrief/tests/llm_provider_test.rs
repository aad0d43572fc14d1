use dailybrief::llm::gemini::GeminiProvider;
use dailybrief::llm::ollama::OllamaProvider;
use dailybrief::llm::remote::RemoteLlmProvider;
use dailybrief::llm::{LlmProvider, LlmRequest};
use mockito::Matcher;
use serde_json::json;

fn scoring_request() -> LlmRequest {
    LlmRequest {
        prompt: "Score this article".to_string(),
        max_tokens: Some(200),
        temperature: Some(0.2),
        timeout_seconds: Some(10),
        json_output: true,
    }
}

#[tokio::test]
async fn test_gemini_generate_with_mock() {
    let mut server = mockito::Server::new_async().await;

    let mock = server
        .mock("POST", "/models/gemini-2.0-flash:generateContent")
        .match_header("x-goog-api-key", "fake-api-key")
        .match_body(Matcher::PartialJson(json!({
            "generationConfig": {"maxOutputTokens": 200, "responseMimeType": "application/json"}
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{
                "candidates": [{
                    "content": {
                        "role": "model",
                        "parts": [{"text": "{\"score\": 8, \"summary\": \"Sealift news.\", \"category\": \"maritime\"}"}]
                    }
                }],
                "usageMetadata": {
                    "promptTokenCount": 120,
                    "candidatesTokenCount": 20,
                    "totalTokenCount": 140
                },
                "modelVersion": "gemini-2.0-flash-001"
            }"#,
        )
        .create_async()
        .await;

    let provider = GeminiProvider::new("fake-api-key", "gemini-2.0-flash").with_base_url(server.url());
    let response = provider.generate(scoring_request()).await.expect("generate");

    assert!(response.content.contains("\"score\": 8"));
    assert_eq!(response.usage.prompt_tokens, 120);
    assert_eq!(response.usage.completion_tokens, 20);
    assert_eq!(response.usage.total_tokens, 140);
    assert_eq!(response.model, "gemini-2.0-flash-001");

    mock.assert_async().await;
}

#[tokio::test]
async fn test_gemini_empty_candidates_is_an_error() {
    let mut server = mockito::Server::new_async().await;

    let _mock = server
        .mock("POST", "/models/gemini-2.0-flash:generateContent")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"candidates": []}"#)
        .create_async()
        .await;

    let provider = GeminiProvider::new("fake-api-key", "gemini-2.0-flash").with_base_url(server.url());
    let err = provider.generate(scoring_request()).await.unwrap_err();
    assert!(err.to_string().contains("no candidate text"));
}

#[tokio::test]
async fn test_gemini_list_models_filters_generate_capable() {
    let mut server = mockito::Server::new_async().await;

    let mock = server
        .mock("GET", "/models")
        .match_header("x-goog-api-key", "fake-api-key")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{
                "models": [
                    {"name": "models/gemini-2.0-flash", "supportedGenerationMethods": ["generateContent", "countTokens"]},
                    {"name": "models/text-embedding-004", "supportedGenerationMethods": ["embedContent"]}
                ]
            }"#,
        )
        .create_async()
        .await;

    let provider = GeminiProvider::new("fake-api-key", "gemini-2.0-flash").with_base_url(server.url());
    let models = provider.list_models().await.expect("list models");

    assert_eq!(models, vec!["models/gemini-2.0-flash".to_string()]);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_remote_provider_with_mock() {
    let mut server = mockito::Server::new_async().await;

    let mock = server
        .mock("POST", "/")
        .match_header("authorization", "Bearer fake-api-key")
        .match_body(Matcher::PartialJson(json!({
            "model": "gpt-4o-mini",
            "response_format": {"type": "json_object"}
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{
                "model": "gpt-4o-mini",
                "choices": [{
                    "message": {
                        "role": "assistant",
                        "content": "{\"score\": 3, \"summary\": \"Unrelated.\", \"category\": \"other\"}"
                    },
                    "finish_reason": "stop"
                }],
                "usage": {
                    "prompt_tokens": 10,
                    "completion_tokens": 5,
                    "total_tokens": 15
                }
            }"#,
        )
        .create_async()
        .await;

    let provider = RemoteLlmProvider::new(server.url(), "fake-api-key", "gpt-4o-mini");
    let response = provider.generate(scoring_request()).await.expect("generate");

    assert!(response.content.contains("\"score\": 3"));
    assert_eq!(response.usage.total_tokens, 15);
    assert_eq!(response.model, "gpt-4o-mini");

    mock.assert_async().await;
}

#[tokio::test]
async fn test_remote_provider_error_handling() {
    let mut server = mockito::Server::new_async().await;

    let _mock = server
        .mock("POST", "/")
        .with_status(429)
        .with_body(r#"{"error": {"message": "Rate limit exceeded"}}"#)
        .create_async()
        .await;

    let provider = RemoteLlmProvider::new(server.url(), "fake-api-key", "gpt-4o-mini");
    let err = provider.generate(scoring_request()).await.unwrap_err();

    let message = err.to_string();
    assert!(message.contains("429"));
    assert!(message.contains("Rate limit exceeded"));
}

#[tokio::test]
async fn test_remote_list_models_from_chat_endpoint() {
    let mut server = mockito::Server::new_async().await;

    let mock = server
        .mock("GET", "/v1/models")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"data": [{"id": "gpt-4o-mini"}, {"id": "gpt-4o"}]}"#)
        .create_async()
        .await;

    let provider = RemoteLlmProvider::new(
        format!("{}/v1/chat/completions", server.url()),
        "fake-api-key",
        "gpt-4o-mini",
    );
    let models = provider.list_models().await.expect("list models");

    assert_eq!(models, vec!["gpt-4o-mini".to_string(), "gpt-4o".to_string()]);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_ollama_generate_with_mock() {
    let mut server = mockito::Server::new_async().await;

    let mock = server
        .mock("POST", "/api/generate")
        .match_body(Matcher::PartialJson(json!({
            "model": "llama3.2",
            "stream": false,
            "format": "json",
            "options": {"num_predict": 200}
        })))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            r#"{
                "model": "llama3.2",
                "response": "{\"score\": 9, \"summary\": \"Autonomy.\", \"category\": \"defense-tech\"}",
                "done": true,
                "prompt_eval_count": 80,
                "eval_count": 12
            }"#,
        )
        .create_async()
        .await;

    let provider = OllamaProvider::new(server.url(), "llama3.2");
    let response = provider.generate(scoring_request()).await.expect("generate");

    assert!(response.content.contains("\"score\": 9"));
    assert_eq!(response.usage.total_tokens, 92);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_ollama_list_models() {
    let mut server = mockito::Server::new_async().await;

    let _mock = server
        .mock("GET", "/api/tags")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"models": [{"name": "llama3.2:latest"}, {"name": "mistral:7b"}]}"#)
        .create_async()
        .await;

    let provider = OllamaProvider::new(server.url(), "llama3.2");
    let models = provider.list_models().await.expect("list models");
    assert_eq!(models, vec!["llama3.2:latest".to_string(), "mistral:7b".to_string()]);
}
