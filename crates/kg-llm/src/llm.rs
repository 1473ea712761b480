//! LLM client for query generation, answer synthesis, and graph extraction.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

/// LLM client error.
#[derive(Debug, thiserror::Error)]
pub enum LLMError {
    #[error("LLM error: {0}")]
    Other(String),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("API error: {0}")]
    Api(String),
    #[error("parse error: {0}")]
    Parse(String),
}

/// Message for LLM conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    /// Role: "system", "user", or "assistant"
    pub role: String,
    /// Message content
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_string(),
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [Message],
    max_tokens: Option<u32>,
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

/// LLM client trait for text generation.
#[async_trait]
pub trait LLMClient: Send + Sync {
    /// Complete a single prompt sent as one user message.
    async fn complete(&self, prompt: &str) -> Result<String, LLMError> {
        self.complete_with_messages(&[Message::user(prompt)]).await
    }

    /// Complete with conversation messages.
    async fn complete_with_messages(&self, messages: &[Message]) -> Result<String, LLMError>;
}

/// OpenAI-compatible chat completions client.
pub struct OpenAiLLMClient {
    client: reqwest::Client,
    api_url: String,
    api_key: Option<String>,
    model: String,
    temperature: f32,
}

impl OpenAiLLMClient {
    /// Create a new client with temperature 0.
    pub fn new(
        api_url: impl Into<String>,
        api_key: Option<String>,
        model: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_url: api_url.into(),
            api_key,
            model: model.into(),
            temperature: 0.0,
        }
    }

    /// Create from LLM_API_URL, LLM_API_KEY and LLM_MODEL.
    ///
    /// Returns `None` when no API key is set and the URL points at the public OpenAI API.
    pub fn from_env() -> Option<Self> {
        let api_url = std::env::var("LLM_API_URL")
            .unwrap_or_else(|_| "https://api.openai.com/v1/chat/completions".to_string());
        let api_key = std::env::var("LLM_API_KEY").ok().filter(|k| !k.is_empty());
        if api_key.is_none() && api_url.contains("api.openai.com") {
            return None;
        }
        let model = std::env::var("LLM_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());

        Some(Self::new(api_url, api_key, model))
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

impl fmt::Debug for OpenAiLLMClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OpenAiLLMClient")
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("temperature", &self.temperature)
            .finish()
    }
}

#[async_trait]
impl LLMClient for OpenAiLLMClient {
    async fn complete_with_messages(&self, messages: &[Message]) -> Result<String, LLMError> {
        let request = ChatCompletionRequest {
            model: &self.model,
            messages,
            max_tokens: Some(4096),
            temperature: Some(self.temperature),
        };

        let mut req = self.client.post(&self.api_url).json(&request);
        if let Some(ref key) = self.api_key {
            req = req.bearer_auth(key);
        }
        let response = req.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(LLMError::Api(format!("status: {}, body: {}", status, body)));
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| LLMError::Parse(e.to_string()))?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| LLMError::Other("no choices returned".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_serializes_openai_shape() {
        let messages = vec![Message::system("be terse"), Message::user("hi")];
        let request = ChatCompletionRequest {
            model: "gpt-4o-mini",
            messages: &messages,
            max_tokens: Some(4096),
            temperature: Some(0.0),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "gpt-4o-mini");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][1]["content"], "hi");
        assert_eq!(json["temperature"], 0.0);
    }

    #[test]
    fn response_content_is_optional() {
        let parsed: ChatCompletionResponse =
            serde_json::from_str(r#"{"choices":[{"message":{"content":null}}]}"#).unwrap();
        assert!(parsed.choices[0].message.content.is_none());
    }

    #[test]
    fn debug_hides_api_key() {
        let client = OpenAiLLMClient::new(
            "http://localhost:8080/v1/chat/completions",
            Some("secret".to_string()),
            "local-model",
        );
        let rendered = format!("{:?}", client);
        assert!(!rendered.contains("secret"));
        assert!(rendered.contains("local-model"));
    }
}
