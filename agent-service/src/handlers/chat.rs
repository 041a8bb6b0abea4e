use crate::services::AgentError;
use crate::startup::AppState;
use crate::utils::ValidatedJson;
use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use utoipa::ToSchema;
use validator::Validate;

pub const DEFAULT_SESSION_ID: &str = "default";

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ChatRequest {
    /// The user's message.
    #[validate(length(min = 1, max = 4000))]
    #[schema(min_length = 1, max_length = 4000, example = "Hello")]
    pub message: String,
    /// Conversation to continue. Defaults to `default`.
    #[serde(default = "default_session_id")]
    #[validate(length(min = 1, max = 100))]
    #[schema(min_length = 1, max_length = 100, example = "default")]
    pub session_id: String,
}

fn default_session_id() -> String {
    DEFAULT_SESSION_ID.to_string()
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ChatResponse {
    pub response: String,
    pub session_id: String,
}

/// Run one conversation turn.
#[utoipa::path(
    post,
    path = "/chat",
    request_body = ChatRequest,
    responses(
        (status = 200, description = "Assistant reply", body = ChatResponse),
        (status = 422, description = "Body failed to parse or validate"),
        (status = 500, description = "Session store failure"),
        (status = 503, description = "Agent not initialized yet")
    ),
    tag = "Chat"
)]
pub async fn chat(
    State(state): State<AppState>,
    ValidatedJson(req): ValidatedJson<ChatRequest>,
) -> Result<Json<ChatResponse>, AppError> {
    let agent = state.agent().ok_or_else(|| {
        tracing::warn!(
            session_id = %req.session_id,
            "Chat request received before the agent was initialized"
        );
        AppError::ServiceUnavailable
    })?;

    let response = agent
        .step(&req.session_id, &req.message)
        .await
        .map_err(|e: AgentError| {
            tracing::error!(session_id = %req.session_id, error = %e, "Chat turn failed");
            AppError::InternalError(anyhow::Error::new(e))
        })?;

    Ok(Json(ChatResponse {
        response,
        session_id: req.session_id,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_id_defaults_when_missing() {
        let req: ChatRequest = serde_json::from_str(r#"{"message":"hi"}"#).unwrap();
        assert_eq!(req.session_id, "default");
        assert!(req.validate().is_ok());
    }

    #[test]
    fn lengths_are_counted_in_characters() {
        let req = ChatRequest {
            message: "é".repeat(4000),
            session_id: "会".repeat(100),
        };
        assert!(req.validate().is_ok());

        let req = ChatRequest {
            message: "a".repeat(4001),
            session_id: "s".to_string(),
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn empty_fields_are_rejected() {
        let req = ChatRequest {
            message: String::new(),
            session_id: "s".to_string(),
        };
        assert!(req.validate().is_err());

        let req = ChatRequest {
            message: "hi".to_string(),
            session_id: String::new(),
        };
        assert!(req.validate().is_err());
    }
}
