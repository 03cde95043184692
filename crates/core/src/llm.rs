//! OpenAI-compatible chat completion client.
//!
//! Every call is retried on transport failures (timeouts, refused connections,
//! throttling, 5xx) with a fixed pause between attempts. Output parsing is left to
//! callers; `fenced_body` helps them peel markdown code fences off model output.

use crate::config::LlmConfig;
use crate::error::LlmError;
use crate::traits::ChatModel;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatOptions {
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,
    pub timeout: Duration,
    pub reasoning_effort: Option<String>,
}

impl ChatOptions {
    pub fn extraction() -> Self {
        Self {
            temperature: 0.3,
            top_p: 0.8,
            max_tokens: 1024,
            timeout: Duration::from_secs(120),
            reasoning_effort: Some("low".to_string()),
        }
    }

    pub fn evaluation() -> Self {
        Self {
            temperature: 0.2,
            top_p: 0.8,
            max_tokens: 2048,
            timeout: Duration::from_secs(120),
            reasoning_effort: Some("low".to_string()),
        }
    }
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    top_p: f32,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    reasoning_effort: Option<&'a str>,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Clone)]
pub struct OpenAiChatModel {
    client: Client,
    endpoint: String,
    api_key: String,
    model: String,
    max_attempts: u32,
    retry_backoff: Duration,
}

impl OpenAiChatModel {
    pub fn new(config: &LlmConfig) -> Result<Self, LlmError> {
        let base = url::Url::parse(config.base_url.trim_end_matches('/'))?;
        Ok(Self {
            client: Client::builder().build()?,
            endpoint: format!("{}/chat/completions", base.as_str().trim_end_matches('/')),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            max_attempts: config.max_attempts.max(1),
            retry_backoff: config.retry_backoff,
        })
    }

    pub fn with_retry(mut self, max_attempts: u32, backoff: Duration) -> Self {
        self.max_attempts = max_attempts.max(1);
        self.retry_backoff = backoff;
        self
    }

    async fn complete_once(
        &self,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> Result<String, LlmError> {
        let body = CompletionRequest {
            model: &self.model,
            messages,
            temperature: options.temperature,
            top_p: options.top_p,
            max_tokens: options.max_tokens,
            reasoning_effort: options.reasoning_effort.as_deref(),
        };

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .timeout(options.timeout)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: CompletionResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or(LlmError::EmptyContent)
    }
}

#[async_trait]
impl ChatModel for OpenAiChatModel {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> Result<String, LlmError> {
        let mut attempt = 1;
        loop {
            match self.complete_once(messages, options).await {
                Ok(content) => {
                    debug!(attempt, chars = content.len(), "chat completion succeeded");
                    return Ok(content);
                }
                Err(error) if error.is_transient() && attempt < self.max_attempts => {
                    warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        error = %error,
                        "chat completion failed, retrying"
                    );
                    tokio::time::sleep(self.retry_backoff).await;
                    attempt += 1;
                }
                Err(error) => return Err(error),
            }
        }
    }
}

/// Body of the first markdown code fence in `text`, without its language tag.
///
/// An unterminated fence yields everything after the opening line.
pub fn fenced_body(text: &str) -> Option<&str> {
    let start = text.find("```")?;
    let after_ticks = &text[start + 3..];
    let tag_len = after_ticks
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '-'))
        .unwrap_or(after_ticks.len());
    let body = &after_ticks[tag_len..];
    let body = match body.find("```") {
        Some(end) => &body[..end],
        None => body,
    };
    Some(body.trim())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(server: &MockServer) -> LlmConfig {
        LlmConfig {
            base_url: format!("{}/v1", server.uri()),
            api_key: "secret".to_string(),
            model: "test-model".to_string(),
            ..LlmConfig::default()
        }
    }

    fn completion(content: &str) -> serde_json::Value {
        json!({"choices": [{"message": {"role": "assistant", "content": content}}]})
    }

    #[test]
    fn fenced_body_handles_tagged_and_bare_fences() {
        assert_eq!(fenced_body("```json\n[1]\n```"), Some("[1]"));
        assert_eq!(fenced_body("Here:\n```\n{\"a\": 1}\n```\nthanks"), Some("{\"a\": 1}"));
        assert_eq!(fenced_body("```json\n[2]"), Some("[2]"));
        assert_eq!(fenced_body("no fence here"), None);
    }

    #[tokio::test]
    async fn sends_sampling_parameters_and_returns_content() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .and(header("authorization", "Bearer secret"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("{\"ok\": true}")))
            .expect(1)
            .mount(&server)
            .await;

        let model = OpenAiChatModel::new(&config(&server)).unwrap();
        let content = model
            .complete(&[ChatMessage::user("hi")], &ChatOptions::extraction())
            .await
            .unwrap();

        assert_eq!(content, "{\"ok\": true}");
        let requests = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(body["model"], "test-model");
        assert_eq!(body["max_tokens"], 1024);
        assert_eq!(body["messages"][0]["role"], "user");
    }

    #[tokio::test]
    async fn retries_server_errors_up_to_the_attempt_limit() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let model = OpenAiChatModel::new(&config(&server))
            .unwrap()
            .with_retry(3, Duration::ZERO);
        let error = model
            .complete(&[ChatMessage::user("hi")], &ChatOptions::evaluation())
            .await
            .unwrap_err();

        assert!(matches!(error, LlmError::Api { status: 503, .. }));
    }

    #[tokio::test]
    async fn client_errors_are_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(401).set_body_string("bad key"))
            .expect(1)
            .mount(&server)
            .await;

        let model = OpenAiChatModel::new(&config(&server))
            .unwrap()
            .with_retry(3, Duration::ZERO);
        let error = model
            .complete(&[ChatMessage::user("hi")], &ChatOptions::evaluation())
            .await
            .unwrap_err();

        assert!(matches!(error, LlmError::Api { status: 401, .. }));
    }

    #[tokio::test]
    async fn blank_content_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion("  ")))
            .mount(&server)
            .await;

        let model = OpenAiChatModel::new(&config(&server)).unwrap();
        let error = model
            .complete(&[ChatMessage::user("hi")], &ChatOptions::evaluation())
            .await
            .unwrap_err();

        assert!(matches!(error, LlmError::EmptyContent));
    }
}
