use crate::startup::AppState;
use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct StatusResponse {
    #[schema(example = "Agent service is running")]
    pub message: String,
    #[schema(example = "healthy")]
    pub status: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    #[schema(example = "healthy")]
    pub status: String,
    /// Whether `/chat` can be served.
    pub agent_ready: bool,
    pub version: String,
}

/// Service banner.
#[utoipa::path(
    get,
    path = "/",
    responses((status = 200, description = "Service is running", body = StatusResponse)),
    tag = "Observability"
)]
pub async fn root() -> Json<StatusResponse> {
    Json(StatusResponse {
        message: "Agent service is running".to_string(),
        status: "healthy".to_string(),
    })
}

/// Liveness probe. Always 200; `agent_ready` tells whether chat is usable.
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service is alive", body = HealthResponse)),
    tag = "Observability"
)]
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        agent_ready: state.agent().is_some(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Readiness probe for K8s.
pub async fn readiness_check(State(state): State<AppState>) -> impl IntoResponse {
    if state.agent().is_some() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    }
}
