//! The conversation step: one user message in, one assistant reply out.
//!
//! Model failures never reach the caller. A failed or timed-out call is
//! replaced by [`FALLBACK_ERROR_REPLY`] and an empty answer by
//! [`EMPTY_RESPONSE_REPLY`]; both are logged. Only session store failures
//! are returned as errors.

use crate::config::ConversationConfig;
use crate::models::{normalize, Message, MessageInput};
use crate::services::metrics;
use crate::services::providers::{ChatProvider, GenerationParams, ProviderError};
use crate::services::session_store::{SessionStore, StoreError};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio::sync::Mutex;

/// Reply used when the model call fails or times out.
pub const FALLBACK_ERROR_REPLY: &str =
    "Sorry, something went wrong while processing your request. Please try again later.";

/// Reply used when the model answers with no text.
pub const EMPTY_RESPONSE_REPLY: &str = "Sorry, I am unable to answer your question right now.";

#[derive(Debug, Error)]
pub enum AgentError {
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug)]
enum ModelFailure {
    Provider(ProviderError),
    Timeout,
}

impl ModelFailure {
    fn error_type(&self) -> &'static str {
        match self {
            ModelFailure::Provider(e) => e.error_type(),
            ModelFailure::Timeout => "timeout",
        }
    }
}

impl std::fmt::Display for ModelFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelFailure::Provider(e) => write!(f, "{}", e),
            ModelFailure::Timeout => f.write_str("model call timed out"),
        }
    }
}

/// Single-node conversational agent shared by all requests.
pub struct ChatAgent {
    provider: Arc<dyn ChatProvider>,
    store: Arc<dyn SessionStore>,
    config: ConversationConfig,
    params: GenerationParams,
    /// Held for the whole turn so turns on one session never interleave.
    turn_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl ChatAgent {
    pub fn new(
        provider: Arc<dyn ChatProvider>,
        store: Arc<dyn SessionStore>,
        config: ConversationConfig,
        params: GenerationParams,
    ) -> Self {
        Self {
            provider,
            store,
            config,
            params,
            turn_locks: DashMap::new(),
        }
    }

    fn turn_lock(&self, session_id: &str) -> Arc<Mutex<()>> {
        self.turn_locks
            .entry(session_id.to_string())
            .or_default()
            .clone()
    }

    /// Prompt sent to the model: system prompt, prior history, new message.
    pub fn assemble_prompt(&self, history: &[Message], user: &Message) -> Vec<Message> {
        let window = match self.config.history_max_messages {
            // Keep whole user/assistant pairs.
            Some(max) => {
                let max = max - max % 2;
                &history[history.len().saturating_sub(max)..]
            }
            None => history,
        };

        let mut prompt = Vec::with_capacity(window.len() + 2);
        prompt.push(Message::system(self.config.system_prompt.clone()));
        prompt.extend_from_slice(window);
        prompt.push(user.clone());
        prompt
    }

    /// Run one chat turn for `session_id` and return the assistant reply.
    #[tracing::instrument(skip(self, user_text), fields(message_len = user_text.chars().count()))]
    pub async fn step(&self, session_id: &str, user_text: &str) -> Result<String, AgentError> {
        let lock = self.turn_lock(session_id);
        let _turn = lock.lock().await;

        let history = self.store.get_history(session_id).await?;
        let user = normalize(MessageInput::Text(user_text.to_string()));
        let prompt = self.assemble_prompt(&history, &user);

        let (reply, outcome) = match self.call_model(&prompt).await {
            Ok(Some(text)) => (text, "reply"),
            Ok(None) => {
                tracing::warn!(session_id = %session_id, "Model returned empty content");
                (EMPTY_RESPONSE_REPLY.to_string(), "empty")
            }
            Err(failure) => {
                tracing::error!(
                    session_id = %session_id,
                    provider = self.provider.name(),
                    error = %failure,
                    "Model call failed, replying with fallback"
                );
                metrics::record_provider_error(self.provider.name(), failure.error_type());
                (FALLBACK_ERROR_REPLY.to_string(), "fallback")
            }
        };

        self.store
            .append(session_id, vec![user, Message::assistant(reply.clone())])
            .await?;

        metrics::record_chat_turn(outcome);
        metrics::set_sessions_active(self.store.session_count());
        tracing::info!(
            session_id = %session_id,
            history_len = history.len() + 2,
            outcome,
            "Chat turn completed"
        );

        Ok(reply)
    }

    /// Returns the reply text, or `None` when the model produced nothing usable.
    async fn call_model(&self, prompt: &[Message]) -> Result<Option<String>, ModelFailure> {
        let started = Instant::now();
        let result = tokio::time::timeout(
            self.config.request_timeout,
            self.provider.complete(prompt, &self.params),
        )
        .await;

        metrics::record_provider_latency(
            self.provider.name(),
            self.provider.model(),
            started.elapsed().as_secs_f64(),
        );

        let response = match result {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return Err(ModelFailure::Provider(e)),
            Err(_) => return Err(ModelFailure::Timeout),
        };

        metrics::record_tokens(
            self.provider.model(),
            response.input_tokens,
            response.output_tokens,
        );
        tracing::debug!(
            finish_reason = response.finish_reason.as_str(),
            input_tokens = response.input_tokens,
            output_tokens = response.output_tokens,
            "Model call succeeded"
        );

        Ok(response.text.filter(|t| !t.trim().is_empty()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use crate::services::providers::mock::{MockBehavior, MockChatProvider};
    use crate::services::session_store::InMemorySessionStore;
    use async_trait::async_trait;
    use std::time::Duration;

    fn conversation_config() -> ConversationConfig {
        ConversationConfig {
            system_prompt: "You are a test assistant.".to_string(),
            request_timeout: Duration::from_secs(5),
            history_max_messages: None,
        }
    }

    fn agent_with(
        provider: Arc<MockChatProvider>,
        config: ConversationConfig,
    ) -> (ChatAgent, Arc<InMemorySessionStore>) {
        let store = Arc::new(InMemorySessionStore::new());
        let agent = ChatAgent::new(
            provider,
            store.clone(),
            config,
            GenerationParams::default(),
        );
        (agent, store)
    }

    #[tokio::test]
    async fn new_session_gets_one_pair() {
        let provider = Arc::new(MockChatProvider::echo());
        let (agent, store) = agent_with(provider.clone(), conversation_config());

        let reply = agent.step("fresh", "Hello").await.unwrap();

        assert_eq!(reply, "Mock response for: Hello");
        let history = store.get_history("fresh").await.unwrap();
        assert_eq!(
            history,
            vec![Message::user("Hello"), Message::assistant("Mock response for: Hello")]
        );
    }

    #[tokio::test]
    async fn n_turns_yield_2n_messages_in_order() {
        let provider = Arc::new(MockChatProvider::echo());
        let (agent, store) = agent_with(provider, conversation_config());

        for i in 0..5 {
            agent.step("s", &format!("msg {}", i)).await.unwrap();
        }

        let history = store.get_history("s").await.unwrap();
        assert_eq!(history.len(), 10);
        for (i, pair) in history.chunks(2).enumerate() {
            assert_eq!(pair[0], Message::user(format!("msg {}", i)));
            assert_eq!(pair[1].role, Role::Assistant);
        }
    }

    #[tokio::test]
    async fn second_turn_prompt_contains_first_exchange() {
        let provider = Arc::new(MockChatProvider::echo());
        let (agent, _store) = agent_with(provider.clone(), conversation_config());

        let first_reply = agent.step("s1", "Hello").await.unwrap();
        agent.step("s1", "Second").await.unwrap();

        let calls = provider.calls();
        assert_eq!(calls.len(), 2);
        assert_eq!(
            calls[1],
            vec![
                Message::system("You are a test assistant."),
                Message::user("Hello"),
                Message::assistant(first_reply),
                Message::user("Second"),
            ]
        );
    }

    #[tokio::test]
    async fn provider_failure_becomes_fallback_reply() {
        let provider = Arc::new(MockChatProvider::failing("API Error"));
        let (agent, store) = agent_with(provider, conversation_config());

        let reply = agent.step("s", "Hello").await.unwrap();

        assert_eq!(reply, FALLBACK_ERROR_REPLY);
        let history = store.get_history("s").await.unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[1], Message::assistant(FALLBACK_ERROR_REPLY));
    }

    #[tokio::test]
    async fn empty_content_becomes_cannot_answer_reply() {
        let provider = Arc::new(MockChatProvider::new(MockBehavior::Empty));
        let (agent, _store) = agent_with(provider, conversation_config());

        assert_eq!(agent.step("s", "Hello").await.unwrap(), EMPTY_RESPONSE_REPLY);
    }

    #[tokio::test]
    async fn whitespace_only_content_counts_as_empty() {
        let provider = Arc::new(MockChatProvider::new(MockBehavior::Reply("  \n".to_string())));
        let (agent, _store) = agent_with(provider, conversation_config());

        assert_eq!(agent.step("s", "Hello").await.unwrap(), EMPTY_RESPONSE_REPLY);
    }

    #[tokio::test]
    async fn timeout_becomes_fallback_reply() {
        let provider = Arc::new(MockChatProvider::new(MockBehavior::Slow(Duration::from_secs(
            10,
        ))));
        let config = ConversationConfig {
            request_timeout: Duration::from_millis(50),
            ..conversation_config()
        };
        let (agent, store) = agent_with(provider, config);

        assert_eq!(agent.step("s", "Hello").await.unwrap(), FALLBACK_ERROR_REPLY);
        assert_eq!(store.get_history("s").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn concurrent_turns_on_one_session_serialize() {
        let provider = Arc::new(MockChatProvider::new(MockBehavior::Slow(
            Duration::from_millis(20),
        )));
        let (agent, store) = agent_with(provider, conversation_config());
        let agent = Arc::new(agent);

        let handles: Vec<_> = (0..8)
            .map(|i| {
                let agent = agent.clone();
                tokio::spawn(async move { agent.step("shared", &format!("m{}", i)).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let history = store.get_history("shared").await.unwrap();
        assert_eq!(history.len(), 16);
        for pair in history.chunks(2) {
            assert_eq!(pair[0].role, Role::User);
            assert_eq!(
                pair[1].content,
                format!("Mock response for: {}", pair[0].content)
            );
        }
    }

    #[tokio::test]
    async fn history_window_keeps_latest_pairs() {
        let provider = Arc::new(MockChatProvider::echo());
        let config = ConversationConfig {
            history_max_messages: Some(3),
            ..conversation_config()
        };
        let (agent, store) = agent_with(provider.clone(), config);

        for text in ["one", "two", "three"] {
            agent.step("s", text).await.unwrap();
        }

        // Storage keeps everything; the prompt only carries the last pair.
        assert_eq!(store.get_history("s").await.unwrap().len(), 6);
        let last_prompt = provider.calls().pop().unwrap();
        assert_eq!(last_prompt.len(), 4);
        assert_eq!(last_prompt[1], Message::user("two"));
        assert_eq!(last_prompt[3], Message::user("three"));
    }

    struct BrokenStore;

    #[async_trait]
    impl SessionStore for BrokenStore {
        async fn get_history(&self, _session_id: &str) -> Result<Vec<Message>, StoreError> {
            Err(StoreError::Unavailable("checkpoint backend offline".to_string()))
        }

        async fn append(&self, _: &str, _: Vec<Message>) -> Result<(), StoreError> {
            Err(StoreError::Unavailable("checkpoint backend offline".to_string()))
        }

        fn session_count(&self) -> usize {
            0
        }
    }

    #[tokio::test]
    async fn store_failure_propagates() {
        let provider = Arc::new(MockChatProvider::echo());
        let agent = ChatAgent::new(
            provider.clone(),
            Arc::new(BrokenStore),
            conversation_config(),
            GenerationParams::default(),
        );

        let err = agent.step("s", "Hello").await.unwrap_err();

        assert!(matches!(err, AgentError::Store(StoreError::Unavailable(_))));
        assert_eq!(provider.call_count(), 0);
    }
}
