//! Session layer: the in-process conversation tracker and the persistent
//! workflow-session store.

mod store;
mod tracker;

pub use store::{
    new_session_record, validate_record, InMemorySessionStore, SessionError, SessionRecord,
    SessionState, SessionStore, SqliteSessionStore, SESSION_TTL,
};
pub use tracker::{SessionTracker, HISTORY_WINDOW};
