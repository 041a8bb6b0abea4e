//! Application startup and lifecycle management.

use crate::config::{AgentConfig, DocsConfig};
use crate::handlers;
use crate::services::metrics::init_metrics;
use crate::services::providers::gemini::{GeminiChatProvider, GeminiConfig};
use crate::services::providers::{ChatProvider, GenerationParams};
use crate::services::{ChatAgent, InMemorySessionStore, SessionStore};
use axum::{
    body::Body,
    http::Request,
    middleware,
    routing::{get, post},
    Json, Router,
};
use service_core::error::AppError;
use service_core::middleware::{
    request_id_middleware, security_headers_middleware, DOCS_PATH, OPENAPI_JSON_PATH,
    REQUEST_ID_HEADER,
};
use std::future::IntoFuture;
use std::sync::{Arc, OnceLock};
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health::root,
        handlers::health::health_check,
        handlers::chat::chat,
    ),
    components(schemas(
        handlers::ChatRequest,
        handlers::ChatResponse,
        handlers::HealthResponse,
        handlers::StatusResponse,
    )),
    tags(
        (name = "Chat", description = "Session-scoped conversation with the agent"),
        (name = "Observability", description = "Status and health probes")
    )
)]
pub struct ApiDoc;

/// OpenAPI document carrying the configured title, description and version.
pub fn api_doc(docs: &DocsConfig) -> utoipa::openapi::OpenApi {
    let mut doc = ApiDoc::openapi();
    doc.info.title = docs.title.clone();
    doc.info.description = Some(docs.description.clone());
    doc.info.version = docs.version.clone();
    doc
}

/// Filled exactly once, when the agent has been built.
pub type AgentSlot = Arc<OnceLock<Arc<ChatAgent>>>;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AgentConfig>,
    agent: AgentSlot,
}

impl AppState {
    /// State with an empty agent slot.
    pub fn new(config: AgentConfig) -> Self {
        Self {
            config: Arc::new(config),
            agent: Arc::new(OnceLock::new()),
        }
    }

    /// Returns false if an agent was already installed.
    pub fn install_agent(&self, agent: Arc<ChatAgent>) -> bool {
        self.agent.set(agent).is_ok()
    }

    pub fn agent(&self) -> Option<Arc<ChatAgent>> {
        self.agent.get().cloned()
    }
}

/// Build the agent from configuration: Gemini provider plus in-memory sessions.
pub fn build_agent(config: &AgentConfig) -> Result<ChatAgent, AppError> {
    let provider = GeminiChatProvider::new(GeminiConfig {
        api_key: config.gemini.api_key.clone(),
        model: config.gemini.model.clone(),
        api_base: config.gemini.api_base.clone(),
        timeout: config.gemini.http_timeout,
    })
    .map_err(|e| {
        tracing::error!("Failed to initialize Gemini provider: {}", e);
        AppError::InternalError(anyhow::Error::new(e))
    })?;
    let provider: Arc<dyn ChatProvider> = Arc::new(provider);

    tracing::info!(
        model = %config.gemini.model,
        temperature = config.gemini.temperature,
        max_output_tokens = config.gemini.max_output_tokens,
        "Initialized Gemini chat provider"
    );

    let store: Arc<dyn SessionStore> = Arc::new(InMemorySessionStore::new());
    let params = GenerationParams {
        temperature: Some(config.gemini.temperature),
        max_tokens: Some(config.gemini.max_output_tokens),
        ..Default::default()
    };

    Ok(ChatAgent::new(
        provider,
        store,
        config.conversation.clone(),
        params,
    ))
}

pub fn build_router(state: AppState) -> Router {
    let mut app: Router<AppState> = Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics))
        .route("/chat", post(handlers::chat));

    let openapi = api_doc(&state.config.docs);
    if state.config.docs.swagger_enabled {
        app = app.merge(SwaggerUi::new(DOCS_PATH).url(OPENAPI_JSON_PATH, openapi));
    } else {
        // Without Swagger UI the OpenAPI JSON stays available for tooling.
        app = app.route(
            OPENAPI_JSON_PATH,
            get(move || {
                let openapi = openapi.clone();
                async move { Json(openapi) }
            }),
        );
    }

    app.fallback(handlers::not_found)
        .layer(middleware::from_fn(security_headers_middleware))
        .layer(
            TraceLayer::new_for_http().make_span_with(|req: &Request<Body>| {
                let request_id = req
                    .headers()
                    .get(REQUEST_ID_HEADER)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default();
                tracing::info_span!(
                    "http_request",
                    method = %req.method(),
                    uri = %req.uri(),
                    request_id = %request_id,
                )
            }),
        )
        .layer(middleware::from_fn(request_id_middleware))
        .with_state(state)
}

pub struct Application {
    port: u16,
    server: Box<dyn std::future::Future<Output = std::io::Result<()>> + Send + Unpin>,
    state: AppState,
}

impl Application {
    pub async fn build(config: AgentConfig) -> Result<Self, AppError> {
        init_metrics();

        let agent = build_agent(&config)?;
        Self::build_with_agent(config, agent).await
    }

    /// Bind and wire the server around an already constructed agent.
    pub async fn build_with_agent(
        config: AgentConfig,
        agent: ChatAgent,
    ) -> Result<Self, AppError> {
        let addr = config.common.bind_address();
        let state = AppState::new(config);

        let listener = TcpListener::bind(&addr).await.map_err(|e| {
            tracing::error!("Failed to bind TCP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        state.install_agent(Arc::new(agent));
        tracing::info!(port, "Agent service listening");

        let server = axum::serve(listener, build_router(state.clone()))
            .with_graceful_shutdown(shutdown_signal());

        Ok(Self {
            port,
            server: Box::new(server.into_future()),
            state,
        })
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        self.server.await
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
