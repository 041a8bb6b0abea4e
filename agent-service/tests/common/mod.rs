#![allow(dead_code)]

use agent_service::config::AgentConfig;
use agent_service::services::providers::mock::MockChatProvider;
use agent_service::services::providers::GenerationParams;
use agent_service::services::{ChatAgent, InMemorySessionStore, SessionStore};
use agent_service::startup::{build_router, AppState, Application};
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    Router,
};
use service_core::config::Config as CoreConfig;
use std::collections::HashMap;
use std::sync::Arc;
use tower::util::ServiceExt;

pub const SYSTEM_PROMPT: &str = "You are a test assistant.";

/// Configuration for tests: local bind on a random port, no real API key.
pub fn test_config(overrides: &[(&str, &str)]) -> AgentConfig {
    let mut vars: HashMap<String, String> = HashMap::from([
        ("GEMINI_API_KEY".to_string(), "test-api-key".to_string()),
        ("SYSTEM_PROMPT".to_string(), SYSTEM_PROMPT.to_string()),
    ]);
    for (key, value) in overrides {
        vars.insert(key.to_string(), value.to_string());
    }

    let common = CoreConfig {
        host: "127.0.0.1".to_string(),
        port: 0,
    };
    AgentConfig::from_lookup(common, |key| vars.get(key).cloned())
        .expect("Failed to build test configuration")
}

pub fn agent_with(provider: Arc<MockChatProvider>, store: Arc<dyn SessionStore>) -> ChatAgent {
    let config = test_config(&[]);
    ChatAgent::new(
        provider,
        store,
        config.conversation.clone(),
        GenerationParams::default(),
    )
}

/// Router whose agent slot is still empty.
pub fn uninitialized_app() -> (Router, AppState) {
    let state = AppState::new(test_config(&[]));
    (build_router(state.clone()), state)
}

/// Router with an agent backed by `provider` and an in-memory store.
pub fn app_with(provider: Arc<MockChatProvider>) -> (Router, Arc<InMemorySessionStore>) {
    let store = Arc::new(InMemorySessionStore::new());
    let state = AppState::new(test_config(&[]));
    state.install_agent(Arc::new(agent_with(provider, store.clone())));
    (build_router(state), store)
}

pub fn app_with_store(provider: Arc<MockChatProvider>, store: Arc<dyn SessionStore>) -> Router {
    let state = AppState::new(test_config(&[]));
    state.install_agent(Arc::new(agent_with(provider, store)));
    build_router(state)
}

pub fn chat_request(body: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/chat")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub fn get_request(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

/// Send one request and return status plus JSON body (`Null` when not JSON).
pub async fn send(app: &Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(serde_json::Value::Null);
    (status, body)
}

pub struct TestApp {
    pub address: String,
    pub port: u16,
}

impl TestApp {
    /// Full application on a random port, talking to the Gemini API at `api_base`.
    pub async fn spawn(api_base: &str) -> Self {
        let config = test_config(&[("GEMINI_API_BASE", api_base)]);
        let app = Application::build(config)
            .await
            .expect("Failed to build test application");

        let port = app.port();
        let address = format!("http://127.0.0.1:{}", port);

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        Self { address, port }
    }
}
