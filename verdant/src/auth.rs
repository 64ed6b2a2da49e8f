//! Auth collaborator interface: token verification producing a principal.
//!
//! The core never validates tokens itself; the transport resolves a
//! [`Principal`] through an [`AuthVerifier`] and auth failures stop at that
//! boundary. The principal is immutable for the duration of a turn.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Account category carried on the principal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UserType {
    JobSeeker,
    Partner,
    Admin,
    Public,
}

/// Authenticated caller for one turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Principal {
    pub user_id: String,
    pub email: Option<String>,
    pub user_type: UserType,
    #[serde(default)]
    pub permissions: HashSet<String>,
}

impl Principal {
    pub fn has_permission(&self, permission: &str) -> bool {
        self.user_type == UserType::Admin || self.permissions.contains(permission)
    }
}

/// Token validator collaborator.
#[async_trait]
pub trait AuthVerifier: Send + Sync {
    /// Resolves a bearer token to a principal, or fails with
    /// `CoreError::Unauthenticated`.
    async fn verify_token(&self, token: &str) -> Result<Principal, CoreError>;
}

/// Fixed token → principal map for dev and tests.
pub struct StaticTokenVerifier {
    tokens: HashMap<String, Principal>,
}

impl StaticTokenVerifier {
    pub fn new(tokens: HashMap<String, Principal>) -> Self {
        Self { tokens }
    }

    /// One job-seeker token, for quick setups.
    pub fn single(token: impl Into<String>, user_id: impl Into<String>) -> Self {
        let mut tokens = HashMap::new();
        tokens.insert(
            token.into(),
            Principal {
                user_id: user_id.into(),
                email: None,
                user_type: UserType::JobSeeker,
                permissions: HashSet::new(),
            },
        );
        Self { tokens }
    }
}

#[async_trait]
impl AuthVerifier for StaticTokenVerifier {
    async fn verify_token(&self, token: &str) -> Result<Principal, CoreError> {
        self.tokens
            .get(token)
            .cloned()
            .ok_or(CoreError::Unauthenticated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// **Scenario**: known token resolves; unknown token is Unauthenticated.
    #[tokio::test]
    async fn static_verifier_resolves_known_tokens() {
        let verifier = StaticTokenVerifier::single("tok-1", "u1");
        let principal = verifier.verify_token("tok-1").await.unwrap();
        assert_eq!(principal.user_id, "u1");
        assert!(matches!(
            verifier.verify_token("nope").await,
            Err(CoreError::Unauthenticated)
        ));
    }

    /// **Scenario**: admins implicitly hold every permission.
    #[test]
    fn admin_has_all_permissions() {
        let admin = Principal {
            user_id: "a".into(),
            email: None,
            user_type: UserType::Admin,
            permissions: HashSet::new(),
        };
        assert!(admin.has_permission("anything"));

        let seeker = Principal {
            user_id: "s".into(),
            email: None,
            user_type: UserType::JobSeeker,
            permissions: HashSet::from_iter(["chat".to_string()]),
        };
        assert!(seeker.has_permission("chat"));
        assert!(!seeker.has_permission("admin"));
    }
}
