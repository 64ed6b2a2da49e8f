//! Verdant chat server entry point.
//!
//! Loads `.env`/XDG config, assembles the agent roster and conversation
//! service, and serves the chat API. `VERDANT_DEV_TOKEN` configures the dev
//! bearer token; production deployments supply a real `AuthVerifier`.

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use verdant::auth::StaticTokenVerifier;
use verdant::session::{InMemorySessionStore, SessionStore, SqliteSessionStore};
use verdant::workflows::StaticPartnerDirectory;
use verdant::{AgentRegistry, ConversationService, LlmClient, OpenAiGateway, PromptRegistry};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    if let Err(e) = config::load_and_apply("verdant", None) {
        tracing::warn!(error = %e, "config load failed, continuing with process env");
    }
    let settings = config::Settings::from_env();

    let gateway = OpenAiGateway::new(
        settings.openai_api_key.clone(),
        settings.model.clone(),
        settings.embedding_model.clone(),
    );
    let llm_configured = gateway.is_configured();
    if !llm_configured {
        tracing::warn!("OPENAI_API_KEY not set; agents will use fallback paths");
    }
    let llm: Arc<dyn LlmClient> = Arc::new(gateway);

    let prompts = Arc::new(PromptRegistry::from_embedded()?);
    let registry = Arc::new(AgentRegistry::build(llm, prompts)?);

    let sessions: Arc<dyn SessionStore> = match &settings.session_db_path {
        Some(path) => Arc::new(SqliteSessionStore::open(path)?),
        None => Arc::new(InMemorySessionStore::new()),
    };

    let service = Arc::new(ConversationService::new(
        registry,
        Arc::new(StaticPartnerDirectory::sample()),
        sessions,
        llm_configured,
    )?);

    let token = std::env::var("VERDANT_DEV_TOKEN").unwrap_or_else(|_| "dev-token".to_string());
    let verifier = Arc::new(StaticTokenVerifier::single(token, "dev-user"));

    let state = serve::app_state(service, verifier, settings.turn_budget, llm_configured);
    serve::run_serve(&settings.bind_addr, state).await
}
