//! Storage layer for fact-find session persistence.
//!
//! A session row holds the latest [`SessionSnapshot`]; every user turn is
//! appended to a turn log together with the directive it produced. Saving a
//! turn writes both in one transaction, so a reader sees either the previous
//! session state or the new one.

mod sqlite;

pub use sqlite::SqliteStorage;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StorageResult;
use crate::orchestrator::{Directive, Phase, SessionSnapshot};

/// A persisted session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Unique session identifier.
    pub id: String,
    /// Phase at the time of the last save.
    pub phase: Phase,
    /// Full session image.
    pub snapshot: SessionSnapshot,
    /// When the session was created.
    pub created_at: DateTime<Utc>,
    /// When the session was last saved.
    pub updated_at: DateTime<Utc>,
}

impl SessionRecord {
    /// New record with a generated id.
    pub fn new(snapshot: SessionSnapshot) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            phase: snapshot.state.phase,
            snapshot,
            created_at: now,
            updated_at: now,
        }
    }

    /// Replace the snapshot and bump `updated_at`.
    pub fn update(&mut self, snapshot: SessionSnapshot) {
        self.phase = snapshot.state.phase;
        self.snapshot = snapshot;
        self.updated_at = Utc::now();
    }

    pub fn turn_count(&self) -> u64 {
        self.snapshot.state.turn_count
    }
}

/// One logged user turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TurnRecord {
    pub session_id: String,
    /// 1-based turn number within the session.
    pub turn_index: u64,
    pub user_text: String,
    /// Phase the directive left the session in.
    pub phase: Phase,
    pub directive: Directive,
    pub created_at: DateTime<Utc>,
}

impl TurnRecord {
    pub fn new(
        session_id: impl Into<String>,
        turn_index: u64,
        user_text: impl Into<String>,
        directive: Directive,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            turn_index,
            user_text: user_text.into(),
            phase: directive.phase,
            directive,
            created_at: Utc::now(),
        }
    }
}

/// Listing entry for a stored session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: String,
    pub phase: Phase,
    pub turn_count: u64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Session persistence backend.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Insert or replace a session.
    async fn save_session(&self, session: &SessionRecord) -> StorageResult<()>;
    /// Save the session and append a turn atomically.
    async fn save_turn(&self, session: &SessionRecord, turn: &TurnRecord) -> StorageResult<()>;
    /// Load a session by id.
    async fn load_session(&self, id: &str) -> StorageResult<Option<SessionRecord>>;
    /// Turn log of a session, oldest first.
    async fn session_turns(&self, session_id: &str) -> StorageResult<Vec<TurnRecord>>;
    /// All sessions, most recently updated first.
    async fn list_sessions(&self) -> StorageResult<Vec<SessionSummary>>;
    /// Delete a session and its turn log.
    async fn delete_session(&self, id: &str) -> StorageResult<()>;
}
