//! Scripted chat provider for testing.
//!
//! Records every conversation it receives so tests can assert on the exact
//! prompt the agent assembled.

use super::{ChatProvider, FinishReason, GenerationParams, ProviderError, ProviderResponse};
use crate::models::{Message, Role};
use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;

/// What the mock does when called.
#[derive(Debug, Clone)]
pub enum MockBehavior {
    /// Reply with `Mock response for: <last user message>`.
    Echo,
    /// Always reply with the given text.
    Reply(String),
    /// Succeed without any text.
    Empty,
    /// Fail with an API error carrying the given message.
    Fail(String),
    /// Sleep, then echo.
    Slow(Duration),
}

/// Mock chat provider for testing.
pub struct MockChatProvider {
    behavior: MockBehavior,
    calls: Mutex<Vec<Vec<Message>>>,
}

impl MockChatProvider {
    pub fn new(behavior: MockBehavior) -> Self {
        Self {
            behavior,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn echo() -> Self {
        Self::new(MockBehavior::Echo)
    }

    pub fn failing(message: impl Into<String>) -> Self {
        Self::new(MockBehavior::Fail(message.into()))
    }

    /// Conversations received so far, oldest first.
    pub fn calls(&self) -> Vec<Vec<Message>> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or_default()
    }

    fn echo_reply(messages: &[Message]) -> String {
        let last_user = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .unwrap_or_default();
        format!("Mock response for: {}", last_user)
    }

    fn respond(text: Option<String>, messages: &[Message]) -> ProviderResponse {
        let input_chars: usize = messages.iter().map(|m| m.content.len()).sum();
        ProviderResponse {
            output_tokens: text.as_ref().map(|t| t.len() as i32 / 4).unwrap_or(0),
            text,
            input_tokens: input_chars as i32 / 4,
            finish_reason: FinishReason::Complete,
        }
    }
}

#[async_trait]
impl ChatProvider for MockChatProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn model(&self) -> &str {
        "mock-model"
    }

    async fn complete(
        &self,
        messages: &[Message],
        _params: &GenerationParams,
    ) -> Result<ProviderResponse, ProviderError> {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(messages.to_vec());
        }

        match &self.behavior {
            MockBehavior::Echo => Ok(Self::respond(Some(Self::echo_reply(messages)), messages)),
            MockBehavior::Reply(text) => Ok(Self::respond(Some(text.clone()), messages)),
            MockBehavior::Empty => Ok(Self::respond(None, messages)),
            MockBehavior::Fail(message) => Err(ProviderError::ApiError(message.clone())),
            MockBehavior::Slow(delay) => {
                tokio::time::sleep(*delay).await;
                Ok(Self::respond(Some(Self::echo_reply(messages)), messages))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn echo_replies_to_last_user_message_and_records_call() {
        let provider = MockChatProvider::echo();
        let messages = vec![Message::system("s"), Message::user("Hello")];

        let response = provider
            .complete(&messages, &GenerationParams::default())
            .await
            .unwrap();

        assert_eq!(response.text.as_deref(), Some("Mock response for: Hello"));
        assert_eq!(provider.calls(), vec![messages]);
    }

    #[tokio::test]
    async fn failing_mock_returns_api_error() {
        let provider = MockChatProvider::failing("down");
        let err = provider
            .complete(&[Message::user("x")], &GenerationParams::default())
            .await
            .unwrap_err();

        assert!(matches!(err, ProviderError::ApiError(ref m) if m == "down"));
        assert_eq!(provider.call_count(), 1);
    }
}
