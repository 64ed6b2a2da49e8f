//! Wire shapes and error mapping for the chat endpoints.

use axum::http::StatusCode;
use axum::Json;
use serde::{Deserialize, Serialize};

use verdant::workflows::TurnResponse;
use verdant::CoreError;

/// Body of `POST /chat/message` and `POST /chat/stream`.
#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub content: String,
    /// Accepted for compatibility; the authenticated principal wins.
    #[serde(default)]
    pub user_id: Option<String>,
    pub conversation_id: String,
    #[serde(default)]
    pub message_type: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// Response of `POST /chat/message`.
#[derive(Debug, Serialize)]
pub struct ChatResponse {
    #[serde(flatten)]
    pub response: TurnResponse,
    pub conversation_complete: bool,
    /// Steering context when the turn suspended awaiting input.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interrupt: Option<serde_json::Value>,
}

/// Uniform error body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

/// Maps a core error onto a status and plain-language body.
pub fn error_response(e: &CoreError) -> (StatusCode, Json<ErrorBody>) {
    let status = match e {
        CoreError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        CoreError::Unauthenticated => StatusCode::UNAUTHORIZED,
        CoreError::Forbidden(_) => StatusCode::FORBIDDEN,
        CoreError::NotFound(_) => StatusCode::NOT_FOUND,
        CoreError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
        CoreError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (
        status,
        Json(ErrorBody {
            error: e.to_string(),
        }),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    /// **Scenario**: taxonomy maps onto the expected status codes.
    #[test]
    fn error_statuses() {
        assert_eq!(
            error_response(&CoreError::InvalidInput("x".into())).0,
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            error_response(&CoreError::Unauthenticated).0,
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            error_response(&CoreError::Timeout("llm".into())).0,
            StatusCode::GATEWAY_TIMEOUT
        );
        assert_eq!(
            error_response(&CoreError::Unavailable("db".into())).0,
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
