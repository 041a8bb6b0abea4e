//! Chat messages and the normalizer that turns loose input into them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Author of a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    /// Map a role string onto a known role. Anything unrecognized is treated
    /// as the user speaking.
    pub fn parse(value: &str) -> Self {
        match value {
            "system" => Role::System,
            "assistant" => Role::Assistant,
            _ => Role::User,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single role-tagged message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Every shape a message may arrive in before normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum MessageInput {
    /// Already canonical.
    Message(Message),
    /// A `{role, content}` record whose role is not yet checked.
    Record { role: String, content: String },
    /// Bare text from the user.
    Text(String),
    /// Anything else. Kept as JSON and rendered to text.
    Unparsed(serde_json::Value),
}

impl From<Message> for MessageInput {
    fn from(message: Message) -> Self {
        MessageInput::Message(message)
    }
}

impl From<String> for MessageInput {
    fn from(text: String) -> Self {
        MessageInput::Text(text)
    }
}

impl From<&str> for MessageInput {
    fn from(text: &str) -> Self {
        MessageInput::Text(text.to_string())
    }
}

impl From<serde_json::Value> for MessageInput {
    fn from(value: serde_json::Value) -> Self {
        if let serde_json::Value::String(text) = value {
            return MessageInput::Text(text);
        }

        let record = value.as_object().and_then(|map| {
            let content = map.get("content")?.as_str()?;
            let role = map.get("role").and_then(|r| r.as_str()).unwrap_or("user");
            Some((role.to_string(), content.to_string()))
        });

        match record {
            Some((role, content)) => MessageInput::Record { role, content },
            None => MessageInput::Unparsed(value),
        }
    }
}

/// Convert any accepted input into a canonical [`Message`].
///
/// Never fails. Unknown roles become `user`, and inputs of an unexpected
/// shape are rendered as text and attributed to the user, which may not be
/// what the sender meant.
pub fn normalize(input: impl Into<MessageInput>) -> Message {
    match input.into() {
        MessageInput::Message(message) => message,
        MessageInput::Record { role, content } => Message::new(Role::parse(&role), content),
        MessageInput::Text(text) => Message::user(text),
        MessageInput::Unparsed(value) => Message::user(value.to_string()),
    }
}
