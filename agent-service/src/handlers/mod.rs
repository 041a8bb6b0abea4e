//! HTTP handlers for the agent service.

pub mod chat;
pub mod fallback;
pub mod health;
pub mod metrics;

pub use chat::{chat, ChatRequest, ChatResponse};
pub use fallback::not_found;
pub use health::{health_check, readiness_check, root, HealthResponse, StatusResponse};
pub use metrics::metrics;
