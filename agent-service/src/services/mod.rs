pub mod agent;
pub mod metrics;
pub mod providers;
pub mod session_store;

pub use agent::{AgentError, ChatAgent, EMPTY_RESPONSE_REPLY, FALLBACK_ERROR_REPLY};
pub use session_store::{InMemorySessionStore, SessionStore, StoreError};
