//! Mock LLM client for tests: scripted replies, no network.

use crate::{LLMClient, LLMError, Message};
use std::sync::Mutex;

type Responder = Box<dyn Fn(&str) -> Result<String, LLMError> + Send + Sync>;

/// Mock client that answers every prompt through a closure and records the prompts it saw.
///
/// Multi-message requests are flattened into one prompt (contents joined by blank lines).
pub struct MockLLMClient {
    responder: Responder,
    prompts: Mutex<Vec<String>>,
}

impl MockLLMClient {
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&str) -> Result<String, LLMError> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Always reply with `text`.
    pub fn replying(text: impl Into<String>) -> Self {
        let text = text.into();
        Self::new(move |_| Ok(text.clone()))
    }

    /// Always fail with `LLMError::Api(message)`.
    pub fn failing(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::new(move |_| Err(LLMError::Api(message.clone())))
    }

    /// Prompts received so far, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .map(|p| p.clone())
            .unwrap_or_else(|e| e.into_inner().clone())
    }

    pub fn call_count(&self) -> usize {
        self.prompts().len()
    }
}

#[async_trait::async_trait]
impl LLMClient for MockLLMClient {
    async fn complete_with_messages(&self, messages: &[Message]) -> Result<String, LLMError> {
        let prompt = messages
            .iter()
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        match self.prompts.lock() {
            Ok(mut p) => p.push(prompt.clone()),
            Err(e) => e.into_inner().push(prompt.clone()),
        }
        (self.responder)(&prompt)
    }
}
