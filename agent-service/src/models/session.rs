//! Session model for conversation context.

use super::Message;

/// A conversation thread keyed by a client-supplied id.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    /// Opaque session identifier.
    pub session_id: String,

    /// Messages in chronological order.
    pub history: Vec<Message>,
}

impl Session {
    /// Create an empty session.
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            history: Vec::new(),
        }
    }

    /// Append messages to the end of the history.
    pub fn extend(&mut self, messages: impl IntoIterator<Item = Message>) {
        self.history.extend(messages);
    }
}
