//! LLM worker - OpenAI-compatible chat completions client
//!
//! Talks to any server exposing `/v1/chat/completions` (OpenAI, llama-server, vLLM,
//! Ollama's OpenAI endpoint). One request per call, no retries.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::llm::TextGenerator;

#[derive(Debug, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    max_tokens: u32,
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: Option<ChatMessage>,
}

/// Sampling settings sent with every completion request
#[derive(Debug, Clone)]
pub struct LLMWorkerConfig {
    pub base_url: String,
    pub api_key: Option<String>,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
}

impl Default for LLMWorkerConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8081".to_string(),
            api_key: None,
            model: "gpt-3.5-turbo".to_string(),
            temperature: 0.1,
            max_tokens: 1000,
            timeout: Duration::from_secs(30),
        }
    }
}

pub struct LLMWorker {
    config: LLMWorkerConfig,
    http_client: reqwest::Client,
}

impl LLMWorker {
    pub fn new(config: LLMWorkerConfig) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to build LLM HTTP client: {}", e))?;
        info!("LLM worker initialized with backend: {} (model {})", config.base_url, config.model);
        Ok(Self {
            config,
            http_client,
        })
    }

    fn completions_url(&self) -> String {
        format!("{}/v1/chat/completions", self.config.base_url.trim_end_matches('/'))
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }
}

#[async_trait]
impl TextGenerator for LLMWorker {
    async fn generate_text(&self, system_prompt: &str, user_prompt: &str) -> anyhow::Result<String> {
        debug!(
            "LLM worker generating completion (system {} chars, user {} chars)",
            system_prompt.len(),
            user_prompt.len()
        );
        let request = ChatCompletionRequest {
            model: self.config.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: system_prompt.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: user_prompt.to_string(),
                },
            ],
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
            stream: false,
        };

        let mut builder = self.http_client.post(self.completions_url()).json(&request);
        if let Some(ref key) = self.config.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| anyhow::anyhow!("LLM backend request failed: {}", e))?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(anyhow::anyhow!("LLM backend returned {}: {}", status, body));
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to parse LLM response: {}", e))?;
        let content = completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message)
            .map(|m| m.content)
            .ok_or_else(|| anyhow::anyhow!("LLM response contained no choices"))?;

        debug!("LLM worker received {} chars", content.len());
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn worker_for(server: &mockito::ServerGuard, api_key: Option<&str>) -> LLMWorker {
        LLMWorker::new(LLMWorkerConfig {
            base_url: server.url(),
            api_key: api_key.map(str::to_string),
            timeout: Duration::from_secs(5),
            ..Default::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_generate_text_returns_first_choice() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/chat/completions")
            .match_header("authorization", "Bearer secret")
            .match_body(Matcher::PartialJson(serde_json::json!({
                "model": "gpt-3.5-turbo",
                "stream": false,
                "messages": [
                    {"role": "system", "content": "sys"},
                    {"role": "user", "content": "usr"}
                ]
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"choices":[{"message":{"role":"assistant","content":"hello"}}]}"#)
            .create_async()
            .await;

        let worker = worker_for(&server, Some("secret"));
        let text = worker.generate_text("sys", "usr").await.unwrap();

        assert_eq!(text, "hello");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_non_success_status_is_an_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(503)
            .with_body("overloaded")
            .create_async()
            .await;

        let worker = worker_for(&server, None);
        let err = worker.generate_text("sys", "usr").await.unwrap_err();
        assert!(err.to_string().contains("503"));
        assert!(err.to_string().contains("overloaded"));
    }

    #[tokio::test]
    async fn test_empty_choices_is_an_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/v1/chat/completions")
            .with_status(200)
            .with_body(r#"{"choices":[]}"#)
            .create_async()
            .await;

        let worker = worker_for(&server, None);
        assert!(worker.generate_text("sys", "usr").await.is_err());
    }

    #[tokio::test]
    async fn test_unreachable_backend_is_an_error() {
        let worker = LLMWorker::new(LLMWorkerConfig {
            base_url: "http://127.0.0.1:1".to_string(),
            timeout: Duration::from_secs(2),
            ..Default::default()
        })
        .unwrap();
        assert!(worker.generate_text("sys", "usr").await.is_err());
    }

    #[test]
    fn test_completions_url_ignores_trailing_slash() {
        let worker = LLMWorker::new(LLMWorkerConfig {
            base_url: "http://localhost:8081/".to_string(),
            ..Default::default()
        })
        .unwrap();
        assert_eq!(worker.completions_url(), "http://localhost:8081/v1/chat/completions");
    }
}
