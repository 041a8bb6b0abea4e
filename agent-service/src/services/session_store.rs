//! Session-keyed conversation history.
//!
//! [`SessionStore`] is the persistence boundary the agent talks to. The
//! in-memory implementation keeps sessions for the lifetime of the process.

use crate::models::{Message, Session};
use async_trait::async_trait;
use dashmap::DashMap;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Session store unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    /// History of `session_id` in chronological order. Unseen ids get a new,
    /// empty session.
    async fn get_history(&self, session_id: &str) -> Result<Vec<Message>, StoreError>;

    /// Append `messages`, in order, to the end of the session's history.
    async fn append(&self, session_id: &str, messages: Vec<Message>) -> Result<(), StoreError>;

    /// Number of sessions currently held.
    fn session_count(&self) -> usize;
}

/// Process-lifetime store backed by a concurrent map.
#[derive(Default)]
pub struct InMemorySessionStore {
    sessions: DashMap<String, Session>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn get_history(&self, session_id: &str) -> Result<Vec<Message>, StoreError> {
        let session = self
            .sessions
            .entry(session_id.to_string())
            .or_insert_with(|| {
                tracing::debug!(session_id = %session_id, "Creating session");
                Session::new(session_id)
            });
        Ok(session.history.clone())
    }

    async fn append(&self, session_id: &str, messages: Vec<Message>) -> Result<(), StoreError> {
        self.sessions
            .entry(session_id.to_string())
            .or_insert_with(|| Session::new(session_id))
            .extend(messages);
        Ok(())
    }

    fn session_count(&self) -> usize {
        self.sessions.len()
    }
}
