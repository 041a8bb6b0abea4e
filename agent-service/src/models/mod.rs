//! Domain models for the agent service.

pub mod message;
pub mod session;

pub use message::{normalize, Message, MessageInput, Role};
pub use session::Session;
