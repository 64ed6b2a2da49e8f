//! Typed settings resolved from the environment after [`load_and_apply`](crate::load_and_apply).

use std::time::Duration;

/// Runtime settings for the Verdant server and core constructors.
///
/// All values come from the environment (after `.env`/XDG merge). Absent keys
/// fall back to the defaults below; the OpenAI key stays `None` so the core can
/// degrade to its documented fallback paths instead of failing at startup.
#[derive(Clone, Debug)]
pub struct Settings {
    /// OpenAI API key; `None` means the LLM gateway reports `Unavailable`.
    pub openai_api_key: Option<String>,
    /// Chat model id, e.g. `gpt-4o-mini`.
    pub model: String,
    /// Embedding model id for memory retrieval.
    pub embedding_model: String,
    /// Bind address for the HTTP server.
    pub bind_addr: String,
    /// Per-turn budget for non-streaming requests, propagated as a deadline.
    pub turn_budget: Duration,
    /// Optional sqlite path for session persistence; `None` keeps sessions in memory.
    pub session_db_path: Option<String>,
}

impl Settings {
    /// Resolves settings from the current process environment.
    pub fn from_env() -> Self {
        let turn_budget_secs = std::env::var("VERDANT_TURN_BUDGET_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(8);
        Self {
            openai_api_key: std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty()),
            model: std::env::var("VERDANT_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string()),
            embedding_model: std::env::var("VERDANT_EMBEDDING_MODEL")
                .unwrap_or_else(|_| "text-embedding-3-small".to_string()),
            bind_addr: std::env::var("VERDANT_BIND_ADDR")
                .unwrap_or_else(|_| "127.0.0.1:8000".to_string()),
            turn_budget: Duration::from_secs(turn_budget_secs),
            session_db_path: std::env::var("VERDANT_SESSION_DB").ok().filter(|p| !p.is_empty()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// **Scenario**: defaults apply with no verdant keys; the turn budget
    /// follows VERDANT_TURN_BUDGET_SECS when set. One test because the
    /// process environment is global.
    #[test]
    fn settings_defaults_and_turn_budget_override() {
        std::env::remove_var("VERDANT_MODEL");
        std::env::remove_var("VERDANT_BIND_ADDR");
        std::env::remove_var("VERDANT_TURN_BUDGET_SECS");
        let s = Settings::from_env();
        assert_eq!(s.model, "gpt-4o-mini");
        assert_eq!(s.bind_addr, "127.0.0.1:8000");
        assert_eq!(s.turn_budget, Duration::from_secs(8));

        std::env::set_var("VERDANT_TURN_BUDGET_SECS", "30");
        let s = Settings::from_env();
        std::env::remove_var("VERDANT_TURN_BUDGET_SECS");
        assert_eq!(s.turn_budget, Duration::from_secs(30));
    }
}
