//! LLM completion clients used for chunk summaries and grounded answers.
//!
//! Both adapters issue a single non-streaming chat request per call. Sampling parameters are
//! fixed by [`GenerationParams::DEFAULT`] and never taken from user input.

use crate::config::{LlmProvider, LlmSettings};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use thiserror::Error;

/// Errors surfaced while requesting a completion.
#[derive(Debug, Error)]
pub enum CompletionClientError {
    /// Provider was unreachable or rejected the connection.
    #[error("Completion provider unavailable: {0}")]
    ProviderUnavailable(String),
    /// Provider returned an error response.
    #[error("Failed to generate completion: {0}")]
    GenerationFailed(String),
    /// Provider response could not be parsed.
    #[error("Malformed provider response: {0}")]
    InvalidResponse(String),
}

/// Sampling parameters sent with every completion request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    /// Sampling temperature.
    pub temperature: f32,
    /// Nucleus sampling mass.
    pub top_p: f32,
    /// Number of candidate tokens considered per step.
    pub top_k: u32,
    /// Penalty applied to repeated tokens (1.0 disables it).
    pub repetition_penalty: f32,
    /// Sequences that end generation.
    pub stop: &'static [&'static str],
    /// Whether the provider should stream tokens back.
    pub stream: bool,
}

impl GenerationParams {
    /// Parameters used for both summaries and answers.
    pub const DEFAULT: Self = Self {
        temperature: 0.7,
        top_p: 0.7,
        top_k: 50,
        repetition_penalty: 1.0,
        stop: &["\"\""],
        stream: false,
    };
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// A single completion call: an optional system role and the user prompt.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    /// Instructions placed in the system role, when the caller needs one.
    pub system: Option<String>,
    /// User message content.
    pub prompt: String,
}

impl CompletionRequest {
    /// Request with only a user message.
    pub fn user(prompt: impl Into<String>) -> Self {
        Self {
            system: None,
            prompt: prompt.into(),
        }
    }

    /// Request with a system role followed by a user message.
    pub fn with_system(system: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            system: Some(system.into()),
            prompt: prompt.into(),
        }
    }

    fn messages(&self) -> Vec<Value> {
        let mut messages = Vec::with_capacity(2);
        if let Some(system) = &self.system {
            messages.push(json!({ "role": "system", "content": system }));
        }
        messages.push(json!({ "role": "user", "content": self.prompt }));
        messages
    }
}

/// Interface implemented by LLM completion providers.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Generate a completion and return the assistant text verbatim.
    async fn complete(&self, request: CompletionRequest) -> Result<String, CompletionClientError>;
}

/// Build the completion client selected by configuration.
pub fn build_completion_client(
    settings: &LlmSettings,
) -> Result<Arc<dyn CompletionClient>, CompletionClientError> {
    let http = Client::builder()
        .user_agent("docket/completion")
        .build()
        .map_err(|error| CompletionClientError::ProviderUnavailable(error.to_string()))?;
    tracing::debug!(
        provider = ?settings.provider,
        model = %settings.model,
        url = %settings.base_url,
        "Initializing completion client"
    );

    let client: Arc<dyn CompletionClient> = match settings.provider {
        LlmProvider::Together => Arc::new(TogetherCompletionClient {
            http,
            base_url: settings.base_url.clone(),
            model: settings.model.clone(),
            api_key: settings.api_key.clone(),
            params: GenerationParams::DEFAULT,
        }),
        LlmProvider::Ollama => Arc::new(OllamaCompletionClient {
            http,
            base_url: settings.base_url.clone(),
            model: settings.model.clone(),
            params: GenerationParams::DEFAULT,
        }),
    };
    Ok(client)
}

fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path)
}

/// Client for Together's OpenAI-compatible `/chat/completions` endpoint.
pub struct TogetherCompletionClient {
    http: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    params: GenerationParams,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: String,
}

#[async_trait]
impl CompletionClient for TogetherCompletionClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String, CompletionClientError> {
        let payload = json!({
            "model": self.model,
            "messages": request.messages(),
            "temperature": self.params.temperature,
            "top_p": self.params.top_p,
            "top_k": self.params.top_k,
            "repetition_penalty": self.params.repetition_penalty,
            "stop": self.params.stop,
            "stream": self.params.stream,
        });

        let mut builder = self
            .http
            .post(endpoint(&self.base_url, "chat/completions"))
            .json(&payload);
        if let Some(api_key) = self.api_key.as_deref()
            && !api_key.is_empty()
        {
            builder = builder.bearer_auth(api_key);
        }

        let response = builder.send().await.map_err(|error| {
            CompletionClientError::ProviderUnavailable(format!(
                "failed to reach {}: {error}",
                self.base_url
            ))
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionClientError::GenerationFailed(format!(
                "provider returned {status}: {body}"
            )));
        }

        let body: ChatCompletionResponse = response.json().await.map_err(|error| {
            CompletionClientError::InvalidResponse(format!(
                "failed to decode completion response: {error}"
            ))
        })?;

        body.choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| CompletionClientError::InvalidResponse("response had no choices".into()))
    }
}

/// Client for the Ollama `/api/chat` endpoint.
pub struct OllamaCompletionClient {
    http: Client,
    base_url: String,
    model: String,
    params: GenerationParams,
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    message: ChatMessage,
    done: bool,
}

#[async_trait]
impl CompletionClient for OllamaCompletionClient {
    async fn complete(&self, request: CompletionRequest) -> Result<String, CompletionClientError> {
        let payload = json!({
            "model": self.model,
            "messages": request.messages(),
            "stream": false,
            "options": {
                "temperature": self.params.temperature,
                "top_p": self.params.top_p,
                "top_k": self.params.top_k,
                "repeat_penalty": self.params.repetition_penalty,
                "stop": self.params.stop,
            }
        });

        let url = endpoint(&self.base_url, "api/chat");
        let response = self
            .http
            .post(&url)
            .json(&payload)
            .send()
            .await
            .map_err(|error| {
                CompletionClientError::ProviderUnavailable(format!(
                    "failed to reach Ollama at {}: {error}",
                    self.base_url
                ))
            })?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(CompletionClientError::ProviderUnavailable(format!(
                "Ollama endpoint {url} returned 404"
            )));
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionClientError::GenerationFailed(format!(
                "Ollama returned {status}: {body}"
            )));
        }

        let body: OllamaChatResponse = response.json().await.map_err(|error| {
            CompletionClientError::InvalidResponse(format!(
                "failed to decode Ollama response: {error}"
            ))
        })?;

        if !body.done {
            return Err(CompletionClientError::InvalidResponse(
                "Ollama response incomplete (streaming not supported)".into(),
            ));
        }

        Ok(body.message.content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::{Method::POST, MockServer};

    fn together(base_url: String) -> TogetherCompletionClient {
        TogetherCompletionClient {
            http: Client::builder()
                .user_agent("docket-test")
                .build()
                .expect("client"),
            base_url,
            model: "meta-llama/Meta-Llama-3.1-405B-Instruct-Turbo".into(),
            api_key: Some("token".into()),
            params: GenerationParams::DEFAULT,
        }
    }

    #[tokio::test]
    async fn together_client_sends_fixed_parameters() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/v1/chat/completions")
                    .header("authorization", "Bearer token")
                    .json_body_partial(
                        r#"{"top_k":50,"stream":false,"messages":[{"role":"system","content":"be brief"},{"role":"user","content":"hello"}]}"#,
                    );
                then.status(200).json_body(json!({
                    "choices": [{ "message": { "role": "assistant", "content": "Answer text" } }]
                }));
            })
            .await;

        let answer = together(format!("{}/v1", server.base_url()))
            .complete(CompletionRequest::with_system("be brief", "hello"))
            .await
            .expect("completion");

        mock.assert_async().await;
        assert_eq!(answer, "Answer text");
    }

    #[tokio::test]
    async fn together_client_surfaces_error_status() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/chat/completions");
                then.status(500).body("boom");
            })
            .await;

        let error = together(server.base_url())
            .complete(CompletionRequest::user("hello"))
            .await
            .expect_err("error response");

        assert!(
            matches!(error, CompletionClientError::GenerationFailed(ref message) if message.contains("500"))
        );
    }

    #[tokio::test]
    async fn together_client_rejects_empty_choices() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(POST).path("/chat/completions");
                then.status(200).json_body(json!({ "choices": [] }));
            })
            .await;

        let error = together(server.base_url())
            .complete(CompletionRequest::user("hello"))
            .await
            .expect_err("no choices");
        assert!(matches!(error, CompletionClientError::InvalidResponse(_)));
    }

    #[tokio::test]
    async fn ollama_client_handles_successful_response() {
        let server = MockServer::start_async().await;
        let client = OllamaCompletionClient {
            http: Client::builder()
                .user_agent("docket-test")
                .build()
                .expect("client"),
            base_url: server.base_url(),
            model: "llama3".into(),
            params: GenerationParams::DEFAULT,
        };

        let mock = server
            .mock_async(|when, then| {
                when.method(POST).path("/api/chat");
                then.status(200).json_body(json!({
                    "message": { "role": "assistant", "content": "Summary text" },
                    "done": true
                }));
            })
            .await;

        let summary = client
            .complete(CompletionRequest::user("Summarize"))
            .await
            .expect("summary");

        mock.assert_async().await;
        assert_eq!(summary, "Summary text");
    }

    #[test]
    fn user_request_has_no_system_message() {
        let messages = CompletionRequest::user("hi").messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0]["role"], "user");
    }
}
