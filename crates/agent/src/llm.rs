use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use querygate_core::config::AppConfig;
use querygate_core::CompletionService;
use reqwest::Client;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum LlmClientError {
    #[error("could not build http client: {0}")]
    Build(#[source] reqwest::Error),
    #[error("completion request failed: {0}")]
    Request(#[source] reqwest::Error),
    #[error("completion endpoint returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("failed to decode completion response: {0}")]
    Decode(#[source] reqwest::Error),
    #[error("completion response contained no message content")]
    EmptyResponse,
}

/// Single-turn client for OpenAI-compatible `chat/completions` endpoints
/// (OpenAI itself, or Ollama's compatibility layer).
#[derive(Clone)]
pub struct ChatCompletionClient {
    client: Client,
    endpoint: String,
    model: String,
    temperature: f32,
    api_key: Option<SecretString>,
}

impl ChatCompletionClient {
    pub fn from_config(config: &AppConfig) -> Result<Self, LlmClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.llm.timeout_secs))
            .build()
            .map_err(LlmClientError::Build)?;

        Ok(Self {
            client,
            endpoint: completions_endpoint(config.llm_base_url()),
            model: config.llm.model.clone(),
            temperature: config.llm.temperature,
            api_key: config.llm.api_key.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn send(&self, prompt: &str) -> Result<String, LlmClientError> {
        let body = ChatRequest::single_turn(&self.model, self.temperature, prompt);
        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(api_key) = &self.api_key {
            request = request.bearer_auth(api_key.expose_secret());
        }

        let response = request.send().await.map_err(LlmClientError::Request)?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(LlmClientError::Status { status: status.as_u16(), body });
        }

        let payload: ChatResponse = response.json().await.map_err(LlmClientError::Decode)?;
        debug!(
            event_name = "llm.completion.received",
            model = %self.model,
            choices = payload.choices.len(),
            "completion response received"
        );
        payload.into_content().ok_or(LlmClientError::EmptyResponse)
    }
}

#[async_trait]
impl CompletionService for ChatCompletionClient {
    async fn complete(&self, prompt: &str) -> Result<String> {
        Ok(self.send(prompt).await?)
    }
}

pub fn completions_endpoint(base_url: &str) -> String {
    let base = base_url.trim().trim_end_matches('/');
    if base.ends_with("/v1") {
        format!("{base}/chat/completions")
    } else {
        format!("{base}/v1/chat/completions")
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

impl<'a> ChatRequest<'a> {
    fn single_turn(model: &'a str, temperature: f32, prompt: &'a str) -> Self {
        Self { model, temperature, messages: vec![ChatMessage { role: "user", content: prompt }] }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

impl ChatResponse {
    fn into_content(self) -> Option<String> {
        self.choices.into_iter().next().and_then(|choice| choice.message.content)
    }
}

#[cfg(test)]
mod tests {
    use querygate_core::config::{AppConfig, LlmProvider};
    use serde_json::json;

    use super::{completions_endpoint, ChatCompletionClient, ChatRequest, ChatResponse};

    #[test]
    fn endpoint_appends_versioned_path_once() {
        assert_eq!(
            completions_endpoint("http://localhost:11434"),
            "http://localhost:11434/v1/chat/completions"
        );
        assert_eq!(
            completions_endpoint("https://api.openai.com/v1/"),
            "https://api.openai.com/v1/chat/completions"
        );
    }

    #[test]
    fn client_uses_provider_default_endpoint() {
        let mut config = AppConfig::default();
        config.llm.provider = LlmProvider::OpenAi;

        let client = ChatCompletionClient::from_config(&config).expect("client should build");
        assert_eq!(client.endpoint(), "https://api.openai.com/v1/chat/completions");
    }

    #[test]
    fn request_is_a_single_user_message() {
        let body = serde_json::to_value(ChatRequest::single_turn("llama3.1", 0.0, "hello"))
            .expect("request should serialize");

        assert_eq!(
            body,
            json!({
                "model": "llama3.1",
                "temperature": 0.0,
                "messages": [{ "role": "user", "content": "hello" }]
            })
        );
    }

    #[test]
    fn response_takes_first_choice_content() {
        let response: ChatResponse = serde_json::from_value(json!({
            "choices": [
                { "message": { "role": "assistant", "content": "NO" } },
                { "message": { "role": "assistant", "content": "YES" } }
            ]
        }))
        .expect("response should decode");

        assert_eq!(response.into_content().as_deref(), Some("NO"));
    }

    #[test]
    fn response_without_choices_has_no_content() {
        let response: ChatResponse =
            serde_json::from_value(json!({ "choices": [] })).expect("response should decode");

        assert_eq!(response.into_content(), None);
    }
}
