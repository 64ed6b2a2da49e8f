//! Router-level tests for the chat API (tower oneshot, no sockets).

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{header, Request, StatusCode};
use http_body_util::BodyExt;
use tower::util::ServiceExt;

use verdant::auth::StaticTokenVerifier;
use verdant::session::InMemorySessionStore;
use verdant::workflows::StaticPartnerDirectory;
use verdant::{AgentRegistry, ConversationService, MockLlm, PromptRegistry};

fn test_state() -> Arc<serve::AppState> {
    let prompts = Arc::new(PromptRegistry::from_embedded().unwrap());
    let registry =
        Arc::new(AgentRegistry::build(Arc::new(MockLlm::new()), prompts).unwrap());
    let service = Arc::new(
        ConversationService::new(
            registry,
            Arc::new(StaticPartnerDirectory::sample()),
            Arc::new(InMemorySessionStore::new()),
            false,
        )
        .unwrap(),
    );
    serve::app_state(
        service,
        Arc::new(StaticTokenVerifier::single("tok", "u1")),
        Duration::from_secs(5),
        false,
    )
}

fn chat_body(content: &str, conversation_id: &str) -> Body {
    Body::from(
        serde_json::json!({
            "content": content,
            "conversation_id": conversation_id,
        })
        .to_string(),
    )
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

/// **Scenario**: /health answers without auth and reports component flags.
#[tokio::test]
async fn health_is_public() {
    let app = serve::build_app(test_state());
    let response = app
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["llm_configured"], false);
}

/// **Scenario**: chat without a bearer token is 401; a bad token is 401.
#[tokio::test]
async fn chat_requires_auth() {
    let app = serve::build_app(test_state());
    let response = app
        .clone()
        .oneshot(
            Request::post("/chat/message")
                .header(header::CONTENT_TYPE, "application/json")
                .body(chat_body("hello", "c1"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .oneshot(
            Request::post("/chat/message")
                .header(header::CONTENT_TYPE, "application/json")
                .header(header::AUTHORIZATION, "Bearer wrong")
                .body(chat_body("hello", "c1"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

/// **Scenario**: an authenticated greeting turn returns the response with
/// routing info and completion flag.
#[tokio::test]
async fn chat_message_greeting_roundtrip() {
    let app = serve::build_app(test_state());
    let response = app
        .oneshot(
            Request::post("/chat/message")
                .header(header::CONTENT_TYPE, "application/json")
                .header(header::AUTHORIZATION, "Bearer tok")
                .body(chat_body("hello", "c1"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert!(json["content"]
        .as_str()
        .unwrap()
        .to_lowercase()
        .contains("climate career"));
    assert_eq!(json["conversation_complete"], true);
    assert!(json["routing_info"].is_object());
}

/// **Scenario**: history echoes tracked messages; unknown conversations have
/// an empty window; deleting an unknown conversation is 404.
#[tokio::test]
async fn history_and_delete() {
    let state = test_state();
    let app = serve::build_app(state.clone());

    // One greeting turn populates the tracker.
    app.clone()
        .oneshot(
            Request::post("/chat/message")
                .header(header::CONTENT_TYPE, "application/json")
                .header(header::AUTHORIZATION, "Bearer tok")
                .body(chat_body("hello", "c1"))
                .unwrap(),
        )
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(
            Request::get("/chat/history/c1")
                .header(header::AUTHORIZATION, "Bearer tok")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert!(!json["messages"].as_array().unwrap().is_empty());

    let response = app
        .clone()
        .oneshot(
            Request::delete("/chat/conversation/c1")
                .header(header::AUTHORIZATION, "Bearer tok")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .oneshot(
            Request::delete("/chat/conversation/never-existed")
                .header(header::AUTHORIZATION, "Bearer tok")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

/// **Scenario**: empty content is a 400 with a plain-language error body.
#[tokio::test]
async fn empty_content_is_bad_request() {
    let app = serve::build_app(test_state());
    let response = app
        .oneshot(
            Request::post("/chat/message")
                .header(header::CONTENT_TYPE, "application/json")
                .header(header::AUTHORIZATION, "Bearer tok")
                .body(chat_body("   ", "c1"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert!(json["error"].as_str().unwrap().contains("empty"));
}

/// **Scenario**: the SSE stream responds with the event-stream content type.
#[tokio::test]
async fn chat_stream_content_type() {
    let app = serve::build_app(test_state());
    let response = app
        .oneshot(
            Request::post("/chat/stream")
                .header(header::CONTENT_TYPE, "application/json")
                .header(header::AUTHORIZATION, "Bearer tok")
                .body(chat_body("hello", "c-stream"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(content_type.starts_with("text/event-stream"), "{content_type}");
}
