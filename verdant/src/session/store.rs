//! Workflow-session persistence: `workflow_sessions` records with a fixed
//! 24-hour lifetime.
//!
//! A record created more than [`SESSION_TTL`] ago is reported `Expired` on the
//! next validation; `touch` slides `updated_at` only. The sqlite backend is
//! the production shape; the in-memory backend serves tests and dev.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;

/// Fixed session lifetime from creation.
pub const SESSION_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Session lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Active,
    Expired,
    Inactive,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionState::Active => "active",
            SessionState::Expired => "expired",
            SessionState::Inactive => "inactive",
        }
    }
}

/// One `workflow_sessions` row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    pub session_id: String,
    pub user_id: String,
    pub workflow_type: String,
    pub state: SessionState,
    pub data: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fresh active record for a supervisor conversation.
pub fn new_session_record(session_id: &str, user_id: &str) -> SessionRecord {
    let now = Utc::now();
    SessionRecord {
        session_id: session_id.to_string(),
        user_id: user_id.to_string(),
        workflow_type: "supervisor".to_string(),
        state: SessionState::Active,
        data: serde_json::json!({}),
        created_at: now,
        updated_at: now,
    }
}

/// Lifecycle check: expired when `created_at` is older than the TTL,
/// otherwise the stored state.
pub fn validate_record(record: &SessionRecord) -> SessionState {
    let age = Utc::now().signed_duration_since(record.created_at);
    if age.to_std().map(|a| a >= SESSION_TTL).unwrap_or(false) {
        SessionState::Expired
    } else {
        record.state
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session storage: {0}")]
    Storage(String),
    #[error("session not found: {0}")]
    NotFound(String),
}

/// Persistence for workflow sessions.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Inserts or replaces a record.
    async fn create(&self, record: &SessionRecord) -> Result<(), SessionError>;

    /// Fetches a record; expiration is applied by the caller via
    /// [`validate_record`].
    async fn get(&self, session_id: &str) -> Result<Option<SessionRecord>, SessionError>;

    /// Slides `updated_at`; errors with `NotFound` for unknown ids.
    async fn touch(&self, session_id: &str) -> Result<(), SessionError>;

    /// Marks expired records and returns how many were flipped.
    async fn sweep_expired(&self) -> Result<u64, SessionError>;
}

/// In-memory store for tests and dev.
pub struct InMemorySessionStore {
    records: Arc<Mutex<HashMap<String, SessionRecord>>>,
}

impl Default for InMemorySessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self {
            records: Arc::new(Mutex::new(HashMap::new())),
        }
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn create(&self, record: &SessionRecord) -> Result<(), SessionError> {
        self.records
            .lock()
            .await
            .insert(record.session_id.clone(), record.clone());
        Ok(())
    }

    async fn get(&self, session_id: &str) -> Result<Option<SessionRecord>, SessionError> {
        Ok(self.records.lock().await.get(session_id).cloned())
    }

    async fn touch(&self, session_id: &str) -> Result<(), SessionError> {
        let mut records = self.records.lock().await;
        match records.get_mut(session_id) {
            Some(record) => {
                record.updated_at = Utc::now();
                Ok(())
            }
            None => Err(SessionError::NotFound(session_id.to_string())),
        }
    }

    async fn sweep_expired(&self) -> Result<u64, SessionError> {
        let mut records = self.records.lock().await;
        let mut flipped = 0;
        for record in records.values_mut() {
            if record.state == SessionState::Active
                && validate_record(record) == SessionState::Expired
            {
                record.state = SessionState::Expired;
                flipped += 1;
            }
        }
        Ok(flipped)
    }
}

/// Sqlite-backed store: one `workflow_sessions` table, connection serialized
/// behind a mutex (rusqlite connections are not Sync).
pub struct SqliteSessionStore {
    conn: Arc<Mutex<rusqlite::Connection>>,
}

impl SqliteSessionStore {
    /// Opens (or creates) the database and ensures the table exists.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, SessionError> {
        let conn = rusqlite::Connection::open(path)
            .map_err(|e| SessionError::Storage(e.to_string()))?;
        Self::init(conn)
    }

    /// In-memory sqlite database (tests).
    pub fn open_in_memory() -> Result<Self, SessionError> {
        let conn = rusqlite::Connection::open_in_memory()
            .map_err(|e| SessionError::Storage(e.to_string()))?;
        Self::init(conn)
    }

    fn init(conn: rusqlite::Connection) -> Result<Self, SessionError> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS workflow_sessions (
                session_id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                workflow_type TEXT NOT NULL,
                status TEXT NOT NULL,
                data TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )",
            [],
        )
        .map_err(|e| SessionError::Storage(e.to_string()))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<SessionRecord> {
        let status: String = row.get(3)?;
        let data: String = row.get(4)?;
        let created_at: String = row.get(5)?;
        let updated_at: String = row.get(6)?;
        Ok(SessionRecord {
            session_id: row.get(0)?,
            user_id: row.get(1)?,
            workflow_type: row.get(2)?,
            state: match status.as_str() {
                "expired" => SessionState::Expired,
                "inactive" => SessionState::Inactive,
                _ => SessionState::Active,
            },
            data: serde_json::from_str(&data).unwrap_or(serde_json::Value::Null),
            created_at: created_at
                .parse::<DateTime<Utc>>()
                .unwrap_or_else(|_| Utc::now()),
            updated_at: updated_at
                .parse::<DateTime<Utc>>()
                .unwrap_or_else(|_| Utc::now()),
        })
    }
}

#[async_trait]
impl SessionStore for SqliteSessionStore {
    async fn create(&self, record: &SessionRecord) -> Result<(), SessionError> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT OR REPLACE INTO workflow_sessions
             (session_id, user_id, workflow_type, status, data, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            rusqlite::params![
                record.session_id,
                record.user_id,
                record.workflow_type,
                record.state.as_str(),
                record.data.to_string(),
                record.created_at.to_rfc3339(),
                record.updated_at.to_rfc3339(),
            ],
        )
        .map_err(|e| SessionError::Storage(e.to_string()))?;
        Ok(())
    }

    async fn get(&self, session_id: &str) -> Result<Option<SessionRecord>, SessionError> {
        let conn = self.conn.lock().await;
        let mut stmt = conn
            .prepare(
                "SELECT session_id, user_id, workflow_type, status, data, created_at, updated_at
                 FROM workflow_sessions WHERE session_id = ?1",
            )
            .map_err(|e| SessionError::Storage(e.to_string()))?;
        let mut rows = stmt
            .query_map([session_id], Self::row_to_record)
            .map_err(|e| SessionError::Storage(e.to_string()))?;
        match rows.next() {
            Some(Ok(record)) => Ok(Some(record)),
            Some(Err(e)) => Err(SessionError::Storage(e.to_string())),
            None => Ok(None),
        }
    }

    async fn touch(&self, session_id: &str) -> Result<(), SessionError> {
        let conn = self.conn.lock().await;
        let changed = conn
            .execute(
                "UPDATE workflow_sessions SET updated_at = ?1 WHERE session_id = ?2",
                rusqlite::params![Utc::now().to_rfc3339(), session_id],
            )
            .map_err(|e| SessionError::Storage(e.to_string()))?;
        if changed == 0 {
            return Err(SessionError::NotFound(session_id.to_string()));
        }
        Ok(())
    }

    async fn sweep_expired(&self) -> Result<u64, SessionError> {
        let cutoff = Utc::now()
            - chrono::Duration::from_std(SESSION_TTL)
                .unwrap_or_else(|_| chrono::Duration::zero());
        let conn = self.conn.lock().await;
        let changed = conn
            .execute(
                "UPDATE workflow_sessions SET status = 'expired'
                 WHERE status = 'active' AND created_at < ?1",
                rusqlite::params![cutoff.to_rfc3339()],
            )
            .map_err(|e| SessionError::Storage(e.to_string()))?;
        Ok(changed as u64)
    }
}
