//! HTTP/SSE chat server for Verdant (axum).
//!
//! Thin transport adapter: requests become workflow input through
//! [`verdant::ConversationService`]; streaming turns are forwarded as
//! server-sent events. Auth is resolved per request via the configured
//! [`verdant::AuthVerifier`]; auth failures never reach the core.
//!
//! **Public API**: [`build_app`], [`AppState`], [`run_serve`],
//! [`run_serve_on_listener`].

mod app;
mod response;

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tracing::info;

use verdant::auth::AuthVerifier;
use verdant::ConversationService;

pub use app::{build_app, AppState};

/// Assembles the shared state for the router.
pub fn app_state(
    service: Arc<ConversationService>,
    verifier: Arc<dyn AuthVerifier>,
    turn_budget: Duration,
    llm_configured: bool,
) -> Arc<AppState> {
    Arc::new(AppState {
        service,
        verifier,
        turn_budget,
        llm_configured,
    })
}

/// Serves on an existing listener (tests bind 127.0.0.1:0 and pass it in).
pub async fn run_serve_on_listener(
    listener: TcpListener,
    state: Arc<AppState>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let addr = listener.local_addr()?;
    info!("verdant chat server listening on http://{addr}");
    axum::serve(listener, build_app(state)).await?;
    Ok(())
}

/// Binds `addr` and serves until the process exits.
pub async fn run_serve(
    addr: &str,
    state: Arc<AppState>,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let listener = TcpListener::bind(addr).await?;
    run_serve_on_listener(listener, state).await
}
