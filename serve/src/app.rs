//! Axum app: state, router, and the chat handlers.

use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use futures::stream::Stream;
use tokio_stream::StreamExt;

use verdant::auth::{AuthVerifier, Principal};
use verdant::{ConversationService, ConversationState, CoreError, StreamEvent};

use super::response::{error_response, ChatRequest, ChatResponse};

/// Shared state for all routes.
pub struct AppState {
    pub service: Arc<ConversationService>,
    pub verifier: Arc<dyn AuthVerifier>,
    /// Deadline for non-streaming turns; streaming turns are unbounded.
    pub turn_budget: Duration,
    pub llm_configured: bool,
}

/// Builds the chat router.
pub fn build_app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/chat/message", post(chat_message))
        .route("/chat/stream", post(chat_stream))
        .route("/chat/history/:conversation_id", get(chat_history))
        .route("/chat/summary/:conversation_id", get(chat_summary))
        .route("/chat/conversation/:conversation_id", delete(chat_delete))
        .route("/chat/conversations", get(chat_conversations))
        .route("/chat/stats", get(chat_stats))
        .route("/chat/health", get(chat_health))
        .route("/health", get(health))
        .with_state(state)
}

/// Resolves the bearer principal or produces the 401 response.
async fn authenticate(
    headers: &HeaderMap,
    state: &AppState,
) -> Result<Principal, axum::response::Response> {
    let token = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    let Some(token) = token else {
        return Err(error_response(&CoreError::Unauthenticated).into_response());
    };
    state
        .verifier
        .verify_token(token)
        .await
        .map_err(|e| error_response(&e).into_response())
}

async fn chat_message(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<ChatRequest>,
) -> axum::response::Response {
    let principal = match authenticate(&headers, &state).await {
        Ok(p) => p,
        Err(resp) => return resp,
    };

    match state
        .service
        .handle_message(
            &principal.user_id,
            &request.conversation_id,
            &request.content,
            Some(state.turn_budget),
        )
        .await
    {
        Ok(outcome) => Json(ChatResponse {
            conversation_complete: outcome.state.conversation_complete,
            response: outcome.response,
            interrupt: outcome.interrupted,
        })
        .into_response(),
        Err(e) => error_response(&e).into_response(),
    }
}

/// One SSE frame per workflow event, terminated by `[DONE]`.
fn sse_frames(
    events: tokio_stream::wrappers::ReceiverStream<StreamEvent<ConversationState>>,
) -> impl Stream<Item = Result<Event, Infallible>> {
    events
        .map(|event| {
            let frame = match event {
                StreamEvent::Updates { node_id, state } => Event::default()
                    .event("update")
                    .data(
                        serde_json::json!({
                            "node": node_id,
                            "workflow_state": state.workflow_state,
                            "findings": state.incremental_findings.len(),
                            "last_message": state.messages.last().map(|m| m.content.clone()),
                        })
                        .to_string(),
                    ),
                StreamEvent::Message { node_id, chunk } => Event::default()
                    .event("message")
                    .data(serde_json::json!({"node": node_id, "content": chunk.content}).to_string()),
                StreamEvent::Interrupted { node_id, value } => Event::default()
                    .event("interrupt")
                    .data(serde_json::json!({"node": node_id, "context": value}).to_string()),
                _ => Event::default().comment("ignored"),
            };
            Ok(frame)
        })
        .chain(tokio_stream::once(Ok(Event::default().data("[DONE]"))))
}

async fn chat_stream(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<ChatRequest>,
) -> axum::response::Response {
    let principal = match authenticate(&headers, &state).await {
        Ok(p) => p,
        Err(resp) => return resp,
    };

    match state
        .service
        .stream_message(&principal.user_id, &request.conversation_id, &request.content)
        .await
    {
        Ok(events) => Sse::new(sse_frames(events))
            .keep_alive(KeepAlive::default())
            .into_response(),
        Err(e) => error_response(&e).into_response(),
    }
}

async fn chat_history(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(conversation_id): Path<String>,
) -> axum::response::Response {
    let principal = match authenticate(&headers, &state).await {
        Ok(p) => p,
        Err(resp) => return resp,
    };
    let history = state.service.history(&principal.user_id, &conversation_id);
    Json(serde_json::json!({
        "conversation_id": conversation_id,
        "messages": history,
    }))
    .into_response()
}

async fn chat_summary(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(conversation_id): Path<String>,
) -> axum::response::Response {
    let principal = match authenticate(&headers, &state).await {
        Ok(p) => p,
        Err(resp) => return resp,
    };
    match state.service.summary(&principal.user_id, &conversation_id) {
        Some(summary) => Json(serde_json::json!({
            "conversation_id": conversation_id,
            "summary": summary,
        }))
        .into_response(),
        None => error_response(&CoreError::NotFound(conversation_id)).into_response(),
    }
}

async fn chat_delete(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Path(conversation_id): Path<String>,
) -> axum::response::Response {
    let principal = match authenticate(&headers, &state).await {
        Ok(p) => p,
        Err(resp) => return resp,
    };
    if state
        .service
        .delete_conversation(&principal.user_id, &conversation_id)
    {
        StatusCode::NO_CONTENT.into_response()
    } else {
        error_response(&CoreError::NotFound(conversation_id)).into_response()
    }
}

async fn chat_conversations(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> axum::response::Response {
    let principal = match authenticate(&headers, &state).await {
        Ok(p) => p,
        Err(resp) => return resp,
    };
    Json(serde_json::json!({
        "conversations": state.service.conversations(&principal.user_id),
    }))
    .into_response()
}

async fn chat_stats(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> axum::response::Response {
    let principal = match authenticate(&headers, &state).await {
        Ok(p) => p,
        Err(resp) => return resp,
    };
    Json(state.service.stats(&principal.user_id)).into_response()
}

async fn chat_health(State(state): State<Arc<AppState>>) -> axum::response::Response {
    Json(state.service.health().await).into_response()
}

/// Component reachability flags; unauthenticated by design.
async fn health(State(state): State<Arc<AppState>>) -> axum::response::Response {
    let components = state.service.health().await;
    Json(serde_json::json!({
        "status": "ok",
        "llm_configured": state.llm_configured,
        "components": components,
    }))
    .into_response()
}
